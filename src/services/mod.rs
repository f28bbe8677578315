//! Service layer for HexMem.
//!
//! Contains business logic and external capability integrations:
//! - Embeddings (OpenAI / Gemini / Ollama behind one contract)
//! - LLM (completion capability for extraction and summarization)
//! - Extractor (messages to structured memory item drafts)
//! - Summarizer (session transcripts to short summaries)
//! - Dedup (two-stage near-duplicate detection)
//! - Ingest (the message ingestion pipeline and direct writes)
//! - Recall (hybrid retrieval and direct vector search)
//! - Decay (two-phase lifecycle sweeps)
//! - Analytics (best-effort query log)

pub mod analytics;
pub mod decay;
pub mod dedup;
pub mod embeddings;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod recall;
pub mod summarizer;

pub use analytics::AnalyticsService;
pub use decay::DecayEngine;
pub use dedup::DedupService;
pub use embeddings::Embedder;
pub use extractor::{Extraction, Extractor};
pub use ingest::{ExtractionCounts, IngestService};
pub use llm::LlmService;
pub use recall::{RecallService, RecallWeights};
pub use summarizer::Summarizer;
