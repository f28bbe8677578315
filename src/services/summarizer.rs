//! Session summarization capability.

use tracing::warn;

use crate::models::SessionMessage;

use super::llm::LlmService;

/// Messages beyond this tail are not fed to the summarizer.
const MAX_SUMMARY_MESSAGES: usize = 50;

#[derive(Clone)]
pub struct Summarizer {
    llm: LlmService,
}

impl Summarizer {
    pub fn new(llm: LlmService) -> Self {
        Self { llm }
    }

    /// Summarize a session's messages. Returns None when the session is
    /// empty or the provider fails.
    pub async fn summarize(&self, messages: &[SessionMessage]) -> Option<String> {
        if messages.is_empty() || !self.llm.is_available() {
            return None;
        }

        let tail = if messages.len() > MAX_SUMMARY_MESSAGES {
            &messages[messages.len() - MAX_SUMMARY_MESSAGES..]
        } else {
            messages
        };

        let transcript: String = tail
            .iter()
            .map(|m| format!("[{}] {}\n", m.role, m.content))
            .collect();

        let prompt = format!(
            "Summarize this agent session in one short paragraph. Cover what was \
             worked on, what was decided, and anything left open.\n\n{}\n\nSummary:",
            transcript
        );

        match self.llm.complete(&prompt, 400).await {
            Ok(summary) => {
                let summary = summary.trim().to_string();
                (!summary.is_empty()).then_some(summary)
            }
            Err(e) => {
                warn!(error = %e, "Session summarization failed");
                None
            }
        }
    }
}
