//! Two-stage near-duplicate detection.
//!
//! Stage 1 matches trigram similarity on the kind's canonical content
//! column; stage 2 falls back to cosine similarity over stored
//! embeddings. Both stages scan only active rows of the same agent.
//! The thresholds are part of the service contract.

use pgvector::Vector;
use sqlx::Row;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::Result;
use crate::models::MemoryKind;

use super::embeddings::Embedder;

/// Trigram similarity threshold for a syntactic match.
pub const SYNTACTIC_THRESHOLD: f64 = 0.6;

/// Cosine similarity threshold for a semantic match.
pub const SEMANTIC_THRESHOLD: f64 = 0.92;

/// Which stage produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupStage {
    Syntactic,
    Semantic,
}

#[derive(Debug, Clone)]
pub struct DedupMatch {
    pub existing_id: Uuid,
    pub similarity: f64,
    pub stage: DedupStage,
}

#[derive(Clone)]
pub struct DedupService {
    db: DbPool,
    embedder: Embedder,
}

impl DedupService {
    pub fn new(db: DbPool, embedder: Embedder) -> Self {
        Self { db, embedder }
    }

    /// Check a candidate text against existing rows of the same kind
    /// and agent. Stage failures fall through; a total failure reports
    /// no match.
    pub async fn check(
        &self,
        kind: MemoryKind,
        agent_id: Uuid,
        candidate: &str,
    ) -> Result<Option<DedupMatch>> {
        match self.syntactic_match(kind, agent_id, candidate).await {
            Ok(Some(m)) => return Ok(Some(m)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, kind = %kind, "Syntactic dedup failed, trying semantic");
            }
        }

        match self.semantic_match(kind, agent_id, candidate).await {
            Ok(found) => Ok(found),
            Err(e) => {
                tracing::warn!(error = %e, kind = %kind, "Semantic dedup failed");
                Ok(None)
            }
        }
    }

    async fn syntactic_match(
        &self,
        kind: MemoryKind,
        agent_id: Uuid,
        candidate: &str,
    ) -> Result<Option<DedupMatch>> {
        let sql = format!(
            r#"
            SELECT id, similarity({expr}, $2)::float8 AS sim
            FROM {table}
            WHERE agent_id = $1
              AND decay_status = 'active'
              AND similarity({expr}, $2) >= {threshold}
            ORDER BY sim DESC
            LIMIT 1
            "#,
            expr = kind.content_expr(),
            table = kind.table(),
            threshold = SYNTACTIC_THRESHOLD,
        );

        let row = sqlx::query(&sql)
            .bind(agent_id)
            .bind(candidate)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|row| DedupMatch {
            existing_id: row.get("id"),
            similarity: row.get("sim"),
            stage: DedupStage::Syntactic,
        }))
    }

    async fn semantic_match(
        &self,
        kind: MemoryKind,
        agent_id: Uuid,
        candidate: &str,
    ) -> Result<Option<DedupMatch>> {
        if !self.embedder.is_available() {
            return Ok(None);
        }

        let embedding = match self.embedder.embed(candidate).await {
            Ok(v) => Vector::from(v),
            Err(_) => return Ok(None),
        };

        let sql = format!(
            r#"
            SELECT id, (1 - (embedding <=> $2))::float8 AS sim
            FROM {table}
            WHERE agent_id = $1
              AND decay_status = 'active'
              AND embedding IS NOT NULL
            ORDER BY embedding <=> $2
            LIMIT 1
            "#,
            table = kind.table(),
        );

        let row = sqlx::query(&sql)
            .bind(agent_id)
            .bind(embedding)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.and_then(|row| {
            let sim: f64 = row.get("sim");
            (sim >= SEMANTIC_THRESHOLD).then(|| DedupMatch {
                existing_id: row.get("id"),
                similarity: sim,
                stage: DedupStage::Semantic,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_are_contract() {
        assert_eq!(SYNTACTIC_THRESHOLD, 0.6);
        assert_eq!(SEMANTIC_THRESHOLD, 0.92);
    }
}
