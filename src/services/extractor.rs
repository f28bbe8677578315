//! LLM-backed extraction of structured memory items from messages.
//!
//! Given the current message and up to four prior messages of context,
//! returns four arrays of drafts. Any provider or parse failure yields
//! an empty extraction; ingestion proceeds regardless.

use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{DecisionDraft, EventDraft, FactDraft, SessionMessage, TaskDraft};

use super::llm::{extract_json, LlmService};

/// The deterministic return shape of an extraction pass.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub facts: Vec<FactDraft>,
    pub decisions: Vec<DecisionDraft>,
    pub tasks: Vec<TaskDraft>,
    pub events: Vec<EventDraft>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
            && self.decisions.is_empty()
            && self.tasks.is_empty()
            && self.events.is_empty()
    }
}

#[derive(Clone)]
pub struct Extractor {
    llm: LlmService,
    enabled: bool,
}

impl Extractor {
    pub fn new(llm: LlmService, enabled: bool) -> Self {
        Self { llm, enabled }
    }

    pub fn is_available(&self) -> bool {
        self.enabled && self.llm.is_available()
    }

    /// Extract facts, decisions, tasks and events from a message.
    pub async fn extract(&self, message: &str, context: &[SessionMessage]) -> Extraction {
        if !self.is_available() {
            debug!("Extractor not available, returning empty extraction");
            return Extraction::default();
        }

        let context_text: String = context
            .iter()
            .map(|m| format!("[{}] {}\n", m.role, m.content))
            .collect();

        let prompt = format!(
            r#"You are a memory extraction agent. Analyse the message below and pull out durable memory items.

Recent conversation context:
{}

Current message:
{}

Extract:
1. **Facts**: standalone statements worth remembering (content, optional subject, confidence 0-1, tags)
2. **Decisions**: choices that were made (title, decision, optional rationale, alternatives considered, tags)
3. **Tasks**: work to be done (title, optional description, priority 1-100 where 50 is normal, tags)
4. **Events**: things that happened (title, event_type such as incident/milestone/release/discovery/blocker/resolution, optional description, severity info/warning/critical, tags)

Return only items actually present in the message. Empty arrays are fine.

Return JSON:
{{
    "facts": [{{"content": "...", "subject": "...", "confidence": 0.9, "tags": []}}],
    "decisions": [{{"title": "...", "decision": "...", "rationale": "...", "alternatives": [], "tags": []}}],
    "tasks": [{{"title": "...", "description": "...", "priority": 50, "tags": []}}],
    "events": [{{"title": "...", "event_type": "...", "description": "...", "severity": "info", "tags": []}}]
}}"#,
            context_text, message
        );

        match self.llm.complete(&prompt, 1500).await {
            Ok(response) => match extract_json(&response) {
                Some(json) => parse_extraction(&json),
                None => {
                    warn!("Failed to parse extraction response as JSON");
                    Extraction::default()
                }
            },
            Err(e) => {
                warn!(error = %e, "Extraction failed");
                Extraction::default()
            }
        }
    }
}

/// Parse the extraction JSON into drafts, dropping malformed entries
/// and clamping out-of-range values.
pub fn parse_extraction(json: &Value) -> Extraction {
    let mut extraction = Extraction::default();

    if let Some(facts) = json["facts"].as_array() {
        for item in facts {
            let Some(content) = item["content"].as_str().filter(|c| !c.trim().is_empty()) else {
                continue;
            };
            extraction.facts.push(FactDraft {
                content: content.to_string(),
                subject: item["subject"].as_str().map(String::from),
                confidence: item["confidence"].as_f64().unwrap_or(1.0).clamp(0.0, 1.0),
                source: None,
                tags: string_array(&item["tags"]),
                valid_until: None,
            });
        }
    }

    if let Some(decisions) = json["decisions"].as_array() {
        for item in decisions {
            let (Some(title), Some(decision)) =
                (item["title"].as_str(), item["decision"].as_str())
            else {
                continue;
            };
            extraction.decisions.push(DecisionDraft {
                title: title.to_string(),
                decision: decision.to_string(),
                rationale: item["rationale"].as_str().map(String::from),
                alternatives: string_array(&item["alternatives"]),
                context: None,
                tags: string_array(&item["tags"]),
            });
        }
    }

    if let Some(tasks) = json["tasks"].as_array() {
        for item in tasks {
            let Some(title) = item["title"].as_str().filter(|t| !t.trim().is_empty()) else {
                continue;
            };
            extraction.tasks.push(TaskDraft {
                title: title.to_string(),
                description: item["description"].as_str().map(String::from),
                status: None,
                priority: item["priority"].as_i64().unwrap_or(50).clamp(1, 100) as i32,
                assignee: None,
                due_date: None,
                project_id: None,
                blocked_by: None,
                tags: string_array(&item["tags"]),
            });
        }
    }

    if let Some(events) = json["events"].as_array() {
        for item in events {
            let (Some(title), Some(event_type)) =
                (item["title"].as_str(), item["event_type"].as_str())
            else {
                continue;
            };
            extraction.events.push(EventDraft {
                title: title.to_string(),
                event_type: event_type.to_string(),
                description: item["description"].as_str().map(String::from),
                outcome: None,
                severity: item["severity"]
                    .as_str()
                    .filter(|s| matches!(*s, "info" | "warning" | "critical"))
                    .map(String::from),
                occurred_at: None,
                project_id: None,
                caused_by: None,
                tags: string_array(&item["tags"]),
            });
        }
    }

    extraction
}

fn string_array(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_extraction() {
        let json = json!({
            "facts": [{"content": "PostgreSQL supports vector extensions", "confidence": 0.95, "tags": ["db"]}],
            "decisions": [{"title": "Database", "decision": "Use PostgreSQL", "rationale": "vector support", "alternatives": ["MySQL"], "tags": []}],
            "tasks": [{"title": "Implement search", "priority": 80, "tags": ["search"]}],
            "events": [{"title": "Deploy failed", "event_type": "incident", "severity": "critical", "tags": []}],
        });

        let extraction = parse_extraction(&json);
        assert_eq!(extraction.facts.len(), 1);
        assert_eq!(extraction.decisions.len(), 1);
        assert_eq!(extraction.tasks.len(), 1);
        assert_eq!(extraction.events.len(), 1);
        assert_eq!(extraction.decisions[0].alternatives, vec!["MySQL"]);
        assert_eq!(extraction.tasks[0].priority, 80);
    }

    #[test]
    fn test_parse_drops_malformed_entries() {
        let json = json!({
            "facts": [{"subject": "missing content"}, {"content": "kept"}],
            "decisions": [{"title": "no decision field"}],
            "tasks": [{"description": "no title"}],
            "events": [{"title": "no type"}],
        });

        let extraction = parse_extraction(&json);
        assert_eq!(extraction.facts.len(), 1);
        assert_eq!(extraction.facts[0].content, "kept");
        assert!(extraction.decisions.is_empty());
        assert!(extraction.tasks.is_empty());
        assert!(extraction.events.is_empty());
    }

    #[test]
    fn test_parse_clamps_ranges() {
        let json = json!({
            "facts": [{"content": "x", "confidence": 3.0}],
            "tasks": [{"title": "t", "priority": 900}],
        });

        let extraction = parse_extraction(&json);
        assert_eq!(extraction.facts[0].confidence, 1.0);
        assert_eq!(extraction.tasks[0].priority, 100);
    }

    #[test]
    fn test_parse_invalid_severity_dropped() {
        let json = json!({
            "events": [{"title": "x", "event_type": "incident", "severity": "catastrophic"}],
        });

        let extraction = parse_extraction(&json);
        assert_eq!(extraction.events[0].severity, None);
    }

    #[test]
    fn test_empty_json_is_empty_extraction() {
        assert!(parse_extraction(&json!({})).is_empty());
    }
}
