//! LLM completion capability used by the extractor and summarizer.
//!
//! Supports Anthropic and OpenAI-compatible chat APIs behind a single
//! `complete` call. Callers treat failures as non-fatal.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    Anthropic,
    OpenAi,
}

/// Service for LLM text completion.
#[derive(Clone)]
pub struct LlmService {
    provider: Option<Provider>,
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl LlmService {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let provider = match config.provider.as_deref() {
            Some("anthropic") => Some(Provider::Anthropic),
            Some("openai") => Some(Provider::OpenAi),
            _ => None,
        };

        let base_url = config.base_url.clone().unwrap_or_else(|| match provider {
            Some(Provider::Anthropic) => "https://api.anthropic.com/v1".to_string(),
            _ => "https://api.openai.com/v1".to_string(),
        });

        Ok(Self {
            provider,
            base_url,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some() && self.api_key.is_some()
    }

    /// Complete a prompt, returning the response text.
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Internal("No LLM credentials".into()))?;

        match self.provider {
            Some(Provider::Anthropic) => self.call_anthropic(api_key, prompt, max_tokens).await,
            Some(Provider::OpenAi) => self.call_openai(api_key, prompt, max_tokens).await,
            None => Err(Error::Internal("No LLM provider configured".into())),
        }
    }

    async fn call_anthropic(&self, api_key: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        let url = format!("{}/messages", self.base_url);
        let body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("Anthropic request failed: {}", e)))?;

        let resp: Value = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Failed to parse Anthropic response: {}", e)))?;

        if let Some(error) = resp.get("error") {
            return Err(Error::Internal(format!("Anthropic error: {}", error)));
        }

        resp["content"][0]["text"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| Error::Internal("No text in Anthropic response".into()))
    }

    async fn call_openai(&self, api_key: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("OpenAI request failed: {}", e)))?;

        let resp: Value = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Failed to parse OpenAI response: {}", e)))?;

        if let Some(error) = resp.get("error") {
            return Err(Error::Internal(format!("OpenAI error: {}", error)));
        }

        resp["choices"][0]["message"]["content"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| Error::Internal("No text in OpenAI response".into()))
    }
}

/// Extract a JSON object from LLM response text.
///
/// Handles ```json fences, generic fences, and bare objects surrounded
/// by prose.
pub fn extract_json(text: &str) -> Option<Value> {
    // Try to find JSON in code blocks
    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            if let Ok(json) = serde_json::from_str(&text[start..start + end]) {
                return Some(json);
            }
        }
    }

    // Try to find JSON in generic code blocks
    if let Some(start) = text.find("```") {
        let start = start + 3;
        let start = text[start..].find('\n').map(|i| start + i + 1).unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            if let Ok(json) = serde_json::from_str(&text[start..start + end]) {
                return Some(json);
            }
        }
    }

    // Try to find a raw JSON object
    if let Some(start) = text.find('{') {
        let mut depth = 0;
        let mut end = start;
        for (i, c) in text[start..].char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = start + i + 1;
                        break;
                    }
                }
                _ => {}
            }
        }
        if end > start {
            if let Ok(json) = serde_json::from_str(&text[start..end]) {
                return Some(json);
            }
        }
    }

    debug!("No JSON object found in LLM response");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_json_fenced() {
        let text = "Here you go:\n```json\n{\"facts\": []}\n```\nDone.";
        assert_eq!(extract_json(text), Some(json!({"facts": []})));
    }

    #[test]
    fn test_extract_json_generic_fence() {
        let text = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json(text), Some(json!({"a": 1})));
    }

    #[test]
    fn test_extract_json_bare_object_with_prose() {
        let text = "Sure! {\"nested\": {\"x\": 2}} hope that helps";
        assert_eq!(extract_json(text), Some(json!({"nested": {"x": 2}})));
    }

    #[test]
    fn test_extract_json_none() {
        assert_eq!(extract_json("no json here"), None);
    }
}
