//! Embedding capability.
//!
//! Three adapters (OpenAI, Gemini, Ollama) behind one contract. The
//! configured provider supplies dense vectors of the system-wide
//! dimension; when none is configured the service reports unavailable
//! and callers degrade (null embeddings on writes, lexical-only recall,
//! 503 on direct search).

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Maximum retries before reporting the provider unavailable
const MAX_RETRIES: u32 = 2;

/// Delay between retries (doubles each time)
const RETRY_DELAY_MS: u64 = 500;

/// Maximum texts per batch request
const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    OpenAi,
    Gemini,
    Ollama,
}

/// Service for generating text embeddings.
#[derive(Clone)]
pub struct Embedder {
    provider: Option<Provider>,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
    client: Client,
}

/// OpenAI embedding response
#[derive(Debug, Deserialize)]
struct OpenAiEmbedResponse {
    data: Option<Vec<OpenAiEmbedding>>,
    error: Option<OpenAiError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}

/// Gemini embedding responses
#[derive(Debug, Deserialize)]
struct GeminiEmbedResponse {
    embedding: Option<GeminiEmbedding>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiBatchResponse {
    embeddings: Option<Vec<GeminiEmbedding>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

/// Ollama embedding response
#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embedding: Option<Vec<f32>>,
    error: Option<String>,
}

impl Embedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let provider = match config.provider.as_deref() {
            Some("openai") => Some(Provider::OpenAi),
            Some("gemini") => Some(Provider::Gemini),
            Some("ollama") => Some(Provider::Ollama),
            Some(other) => {
                warn!(provider = %other, "Unknown embedding provider, running without embeddings");
                None
            }
            None => None,
        };

        let base_url = config.base_url.clone().unwrap_or_else(|| {
            match provider {
                Some(Provider::OpenAi) => "https://api.openai.com/v1".to_string(),
                Some(Provider::Gemini) => {
                    "https://generativelanguage.googleapis.com/v1beta".to_string()
                }
                Some(Provider::Ollama) => "http://localhost:11434".to_string(),
                None => String::new(),
            }
        });

        if provider.is_none() {
            warn!("No embedding provider configured - semantic paths disabled");
        }

        Ok(Self {
            provider,
            base_url,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            dimension: config.dimension,
            client,
        })
    }

    /// Whether a provider is configured at all.
    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    /// Declared adapter name, e.g. for /health.
    pub fn name(&self) -> &str {
        match self.provider {
            Some(Provider::OpenAi) => "openai",
            Some(Provider::Gemini) => "gemini",
            Some(Provider::Ollama) => "ollama",
            None => "none",
        }
    }

    /// System-wide embedding dimension.
    pub fn dimensions(&self) -> usize {
        self.dimension
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.provider.is_none() {
            return Err(Error::EmbeddingUnavailable);
        }

        let mut delay = Duration::from_millis(RETRY_DELAY_MS);
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match self.call_single(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(e) => {
                    debug!(attempt, error = %e, "Embedding request failed");
                    last_error = Some(e);
                    if attempt < MAX_RETRIES - 1 {
                        sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        warn!(
            provider = %self.name(),
            error = %last_error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
            "Embedding provider exhausted retries"
        );
        Err(Error::EmbeddingUnavailable)
    }

    /// Embed multiple texts, preserving input order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if self.provider.is_none() {
            return Err(Error::EmbeddingUnavailable);
        }

        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH_SIZE) {
            let embeddings = self.call_batch(chunk).await.map_err(|e| {
                warn!(provider = %self.name(), error = %e, "Batch embedding failed");
                Error::EmbeddingUnavailable
            })?;
            all.extend(embeddings);
        }

        Ok(all)
    }

    async fn call_single(&self, text: &str) -> Result<Vec<f32>> {
        match self.provider {
            Some(Provider::OpenAi) => {
                let mut result = self.call_openai(&[text.to_string()]).await?;
                result
                    .pop()
                    .ok_or_else(|| Error::Internal("No embedding in OpenAI response".into()))
            }
            Some(Provider::Gemini) => self.call_gemini_single(text).await,
            Some(Provider::Ollama) => self.call_ollama(text).await,
            None => Err(Error::EmbeddingUnavailable),
        }
    }

    async fn call_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self.provider {
            Some(Provider::OpenAi) => self.call_openai(texts).await,
            Some(Provider::Gemini) => self.call_gemini_batch(texts).await,
            Some(Provider::Ollama) => {
                // Ollama has no batch endpoint; serialize.
                let mut out = Vec::with_capacity(texts.len());
                for text in texts {
                    out.push(self.call_ollama(text).await?);
                }
                Ok(out)
            }
            None => Err(Error::EmbeddingUnavailable),
        }
    }

    async fn call_openai(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Internal("No OpenAI credentials".into()))?;

        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": texts,
            "dimensions": self.dimension,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("OpenAI request failed: {}", e)))?;

        let resp: OpenAiEmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Failed to parse OpenAI response: {}", e)))?;

        if let Some(error) = resp.error {
            return Err(Error::Internal(format!("OpenAI error: {}", error.message)));
        }

        let mut data = resp
            .data
            .ok_or_else(|| Error::Internal("No embeddings in OpenAI response".into()))?;

        // Sort by index to ensure input order
        data.sort_by_key(|e| e.index);

        Ok(data.into_iter().map(|e| e.embedding).collect())
    }

    async fn call_gemini_single(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Internal("No Gemini credentials".into()))?;

        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url, self.model, api_key
        );
        let body = json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
            "outputDimensionality": self.dimension,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("Gemini request failed: {}", e)))?;

        let resp: GeminiEmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Failed to parse Gemini response: {}", e)))?;

        if let Some(error) = resp.error {
            return Err(Error::Internal(format!("Gemini error: {}", error.message)));
        }

        resp.embedding
            .map(|e| e.values)
            .ok_or_else(|| Error::Internal("No embedding in Gemini response".into()))
    }

    async fn call_gemini_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Internal("No Gemini credentials".into()))?;

        let url = format!(
            "{}/models/{}:batchEmbedContents?key={}",
            self.base_url, self.model, api_key
        );

        let requests: Vec<_> = texts
            .iter()
            .map(|text| {
                json!({
                    "model": format!("models/{}", self.model),
                    "content": { "parts": [{ "text": text }] },
                    "outputDimensionality": self.dimension,
                })
            })
            .collect();

        let response = self
            .client
            .post(&url)
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| Error::Internal(format!("Gemini batch request failed: {}", e)))?;

        let resp: GeminiBatchResponse = response.json().await.map_err(|e| {
            Error::Internal(format!("Failed to parse Gemini batch response: {}", e))
        })?;

        if let Some(error) = resp.error {
            return Err(Error::Internal(format!("Gemini error: {}", error.message)));
        }

        resp.embeddings
            .map(|embs| embs.into_iter().map(|e| e.values).collect())
            .ok_or_else(|| Error::Internal("No embeddings in Gemini batch response".into()))
    }

    async fn call_ollama(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = json!({ "model": self.model, "prompt": text });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("Ollama request failed: {}", e)))?;

        let resp: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Failed to parse Ollama response: {}", e)))?;

        if let Some(error) = resp.error {
            return Err(Error::Internal(format!("Ollama error: {}", error)));
        }

        resp.embedding
            .ok_or_else(|| Error::Internal("No embedding in Ollama response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(provider: Option<&str>) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: provider.map(String::from),
            base_url: None,
            model: "text-embedding-3-small".into(),
            api_key: Some("test-key".into()),
            dimension: 768,
        }
    }

    #[test]
    fn test_unconfigured_is_unavailable() {
        let embedder = Embedder::new(&config_with(None)).unwrap();
        assert!(!embedder.is_available());
        assert_eq!(embedder.name(), "none");
    }

    #[test]
    fn test_provider_name_and_dimensions() {
        let embedder = Embedder::new(&config_with(Some("openai"))).unwrap();
        assert!(embedder.is_available());
        assert_eq!(embedder.name(), "openai");
        assert_eq!(embedder.dimensions(), 768);
    }

    #[tokio::test]
    async fn test_embed_without_provider_fails() {
        let embedder = Embedder::new(&config_with(None)).unwrap();
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable));
    }

    #[tokio::test]
    async fn test_embed_batch_empty_is_ok_without_provider() {
        let embedder = Embedder::new(&config_with(None)).unwrap();
        let result = embedder.embed_batch(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
