//! Ingestion pipeline.
//!
//! `add_message` is the hot path: persist the message, assemble the
//! context tail, run extraction, and store each extracted item with a
//! derivation edge back to the session. Embedding, extraction and edge
//! creation are independent best-effort stages; only the message insert
//! itself is load-bearing.

use pgvector::Vector;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::error::{Error, Result};
use crate::models::{
    EdgeRelation, ItemDraft, MemoryKind, MessageRole, ProjectDraft, SessionMessage, slugify,
};

use super::dedup::DedupService;
use super::embeddings::Embedder;
use super::extractor::Extractor;

/// Prior messages assembled as extraction context.
const CONTEXT_TAIL: i64 = 4;

/// Per-type counts of items produced by extraction.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExtractionCounts {
    pub facts: usize,
    pub decisions: usize,
    pub tasks: usize,
    pub events: usize,
}

#[derive(Clone)]
pub struct IngestService {
    db: DbPool,
    embedder: Embedder,
    extractor: Extractor,
    dedup: DedupService,
}

impl IngestService {
    pub fn new(db: DbPool, embedder: Embedder, extractor: Extractor, dedup: DedupService) -> Self {
        Self {
            db,
            embedder,
            extractor,
            dedup,
        }
    }

    /// Best-effort embed: a provider failure leaves the column null.
    async fn try_embed(&self, text: &str) -> Option<Vector> {
        if !self.embedder.is_available() {
            return None;
        }
        match self.embedder.embed(text).await {
            Ok(v) => Some(Vector::from(v)),
            Err(e) => {
                debug!(error = %e, "Embedding skipped, storing without vector");
                None
            }
        }
    }

    /// Persist a message and run extraction over it.
    pub async fn add_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
        metadata: Value,
    ) -> Result<(SessionMessage, ExtractionCounts)> {
        if content.trim().is_empty() {
            return Err(Error::InvalidArgument("Message content cannot be empty".into()));
        }

        let session = db::get_session(&self.db, session_id).await?;
        if session.has_ended() {
            return Err(Error::InvalidArgument(format!(
                "Session {} already ended",
                session_id
            )));
        }

        let embedding = self.try_embed(content).await;

        let message = db::insert_message(
            &self.db,
            session_id,
            session.agent_id,
            role.as_str(),
            content,
            metadata,
            embedding,
        )
        .await?;

        // Context tail: the most recent prior messages, oldest first.
        let context = db::recent_messages(&self.db, session_id, message.created_at, CONTEXT_TAIL)
            .await
            .unwrap_or_default();

        let extraction = self.extractor.extract(content, &context).await;

        let mut counts = ExtractionCounts::default();

        // Extraction is authoritative: duplicates are allowed here, and
        // every stored item gets a derivation edge to the session.
        let drafts = extraction
            .facts
            .into_iter()
            .map(ItemDraft::Fact)
            .chain(extraction.decisions.into_iter().map(ItemDraft::Decision))
            .chain(extraction.tasks.into_iter().map(ItemDraft::Task))
            .chain(extraction.events.into_iter().map(ItemDraft::Event));

        for draft in drafts {
            let kind = draft.kind();
            match self
                .store_item(session.agent_id, draft, Some(session_id))
                .await
            {
                Ok(_) => match kind {
                    MemoryKind::Fact => counts.facts += 1,
                    MemoryKind::Decision => counts.decisions += 1,
                    MemoryKind::Task => counts.tasks += 1,
                    MemoryKind::Event => counts.events += 1,
                    _ => {}
                },
                Err(e) => warn!(error = %e, kind = %kind, "Failed to store extracted item"),
            }
        }

        info!(
            session_id = %session_id,
            facts = counts.facts,
            decisions = counts.decisions,
            tasks = counts.tasks,
            events = counts.events,
            "Message ingested"
        );

        Ok((message, counts))
    }

    /// Store one item and link it to its originating session.
    pub async fn store_item(
        &self,
        agent_id: Uuid,
        draft: ItemDraft,
        session_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let kind = draft.kind();
        let embedding = self.try_embed(&draft.canonical_text()).await;

        let id = match &draft {
            ItemDraft::Fact(f) => db::insert_fact(&self.db, agent_id, f, embedding).await?.id,
            ItemDraft::Decision(d) => {
                db::insert_decision(&self.db, agent_id, d, session_id, embedding)
                    .await?
                    .id
            }
            ItemDraft::Task(t) => db::insert_task(&self.db, agent_id, t, embedding).await?.id,
            ItemDraft::Event(e) => db::insert_event(&self.db, agent_id, e, embedding).await?.id,
        };

        if let Some(session_id) = session_id {
            let relation = match kind {
                MemoryKind::Decision => EdgeRelation::DecidedIn,
                _ => EdgeRelation::DerivedFrom,
            };
            // Edge creation is idempotent on the 5-tuple and best-effort.
            if let Err(e) = db::upsert_edge(
                &self.db,
                agent_id,
                kind.as_str(),
                id,
                "session",
                session_id,
                relation.as_str(),
                1.0,
                json!({}),
            )
            .await
            {
                warn!(error = %e, item = %id, "Failed to create derivation edge");
            }
        }

        Ok(id)
    }

    /// Direct write: dedup first, conflict on a match.
    pub async fn direct_store(&self, agent_id: Uuid, draft: ItemDraft) -> Result<Uuid> {
        self.direct_store_linked(agent_id, draft, None).await
    }

    /// Direct write with an optional originating session (decisions
    /// carry a session_id on their direct POST).
    pub async fn direct_store_linked(
        &self,
        agent_id: Uuid,
        draft: ItemDraft,
        session_id: Option<Uuid>,
    ) -> Result<Uuid> {
        if let Some(found) = self
            .dedup
            .check(draft.kind(), agent_id, &draft.canonical_text())
            .await?
        {
            return Err(Error::Duplicate {
                existing_id: found.existing_id,
                similarity: found.similarity,
            });
        }

        self.store_item(agent_id, draft, session_id).await
    }

    /// Direct project creation. Projects skip dedup; the slug is
    /// derived from the name and collisions are a 409.
    pub async fn store_project(
        &self,
        agent_id: Uuid,
        draft: ProjectDraft,
    ) -> Result<crate::models::Project> {
        let slug = slugify(&draft.name);
        if slug.is_empty() {
            return Err(Error::InvalidArgument(
                "Project name must contain at least one alphanumeric character".into(),
            ));
        }

        let embedding = self.try_embed(&draft.name).await;
        db::insert_project(&self.db, agent_id, &slug, &draft, embedding).await
    }
}
