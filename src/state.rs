//! Application state for HexMem.
//!
//! Contains the shared state that is passed to all handlers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::services::{
    AnalyticsService, DecayEngine, DedupService, Embedder, Extractor, IngestService, LlmService,
    RecallService, Summarizer,
};
use crate::{config, Result};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: DbPool,
    /// Embedding capability.
    pub embedder: Embedder,
    /// Ingestion pipeline.
    pub ingest: IngestService,
    /// Hybrid recall planner.
    pub recall: RecallService,
    /// Decay engine.
    pub decay: DecayEngine,
    /// Session summarizer.
    pub summarizer: Summarizer,
    /// Query analytics log.
    pub analytics: AnalyticsService,
    /// Opportunistic slug-to-id cache, populated on successful lookups
    /// and never invalidated (slug renames are not supported).
    pub slug_cache: Arc<RwLock<HashMap<String, Uuid>>>,
}

impl AppState {
    /// Create a new application state, initializing all services.
    pub async fn new() -> Result<Self> {
        let config = config::config();

        let db = db::init_pool(&config.database.url, config.database.max_connections).await?;
        db::migrate(&db).await?;

        let embedder = Embedder::new(&config.embedding)?;
        let llm = LlmService::new(&config.llm)?;
        let extractor = Extractor::new(llm.clone(), config.extraction_enabled);
        let summarizer = Summarizer::new(llm);
        let dedup = DedupService::new(db.clone(), embedder.clone());
        let ingest = IngestService::new(db.clone(), embedder.clone(), extractor, dedup);
        let recall = RecallService::new(db.clone(), embedder.clone());
        let decay = DecayEngine::new(db.clone());
        let analytics = AnalyticsService::new(db.clone());

        Ok(Self {
            db,
            embedder,
            ingest,
            recall,
            decay,
            summarizer,
            analytics,
            slug_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Resolve an agent id from a UUID-or-slug string, consulting the
    /// slug cache first.
    pub async fn resolve_agent_id(&self, id_or_slug: &str) -> Result<Uuid> {
        if let Ok(id) = Uuid::parse_str(id_or_slug) {
            return Ok(id);
        }

        if let Some(id) = self.slug_cache.read().await.get(id_or_slug) {
            return Ok(*id);
        }

        let agent = db::get_agent_by_id_or_slug(&self.db, id_or_slug).await?;
        self.slug_cache
            .write()
            .await
            .insert(id_or_slug.to_string(), agent.id);

        Ok(agent.id)
    }
}
