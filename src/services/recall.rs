//! Hybrid recall planner and direct vector search.
//!
//! Recall fans out a semantic arm (cosine over stored embeddings) and a
//! lexical arm (trigram similarity over canonical content) per item
//! kind, merges candidates by id, folds in a recency signal, reranks by
//! the weighted blend, cuts to top-K, and optionally expands one hop
//! through the edge graph. Direct search is the vector-only path and
//! requires an embedder.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::error::{Error, Result};
use crate::models::{MemoryKind, RECALL_KINDS};

use super::embeddings::Embedder;

/// Default top-K cut.
pub const DEFAULT_LIMIT: usize = 20;

/// Default signal weights.
pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.7;
pub const DEFAULT_KEYWORD_WEIGHT: f64 = 0.2;
pub const DEFAULT_RECENCY_WEIGHT: f64 = 0.1;

/// Fixed weight applied to the graph boost signal.
pub const GRAPH_WEIGHT: f64 = 0.1;

/// Trigram similarity floor for the lexical arm.
pub const LEXICAL_FLOOR: f64 = 0.1;

/// Age at which the recency signal reaches zero.
pub const RECENCY_MAX_AGE_DAYS: f64 = 90.0;

/// Only this many top results are graph-expanded.
pub const EXPANSION_HEADS: usize = 5;

/// Direct search defaults.
pub const SEARCH_MAX_LIMIT: usize = 100;
pub const DEFAULT_SEARCH_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecallWeights {
    pub semantic: f64,
    pub keyword: f64,
    pub recency: f64,
}

impl Default for RecallWeights {
    fn default() -> Self {
        Self {
            semantic: DEFAULT_SEMANTIC_WEIGHT,
            keyword: DEFAULT_KEYWORD_WEIGHT,
            recency: DEFAULT_RECENCY_WEIGHT,
        }
    }
}

/// Per-result signal breakdown. Absent arms stay None.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecallSignals {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_boost: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecallResult {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub item_type: String,
    pub content: String,
    pub score: f64,
    pub signals: RecallSignals,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<RecallResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecallResponse {
    pub results: Vec<RecallResult>,
    pub total: usize,
    pub query: String,
    pub weights: RecallWeights,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub item_type: String,
    pub content: String,
    pub similarity: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct CandidateRow {
    id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
    sim: f64,
}

/// Recency decays linearly to zero over the max age window.
pub fn recency_signal(item_time: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = (now - item_time).num_seconds() as f64 / 86400.0;
    (1.0 - age_days / RECENCY_MAX_AGE_DAYS).max(0.0)
}

/// The weighted blend. Absent signals contribute zero.
pub fn compose_score(weights: &RecallWeights, signals: &RecallSignals) -> f64 {
    weights.semantic * signals.semantic.unwrap_or(0.0)
        + weights.keyword * signals.keyword.unwrap_or(0.0)
        + weights.recency * signals.recency.unwrap_or(0.0)
        + GRAPH_WEIGHT * signals.graph_boost.unwrap_or(0.0)
}

#[derive(Clone)]
pub struct RecallService {
    db: DbPool,
    embedder: Embedder,
}

impl RecallService {
    pub fn new(db: DbPool, embedder: Embedder) -> Self {
        Self { db, embedder }
    }

    fn candidate_kinds(types: Option<&[String]>) -> Vec<MemoryKind> {
        match types {
            Some(filter) if !filter.is_empty() => RECALL_KINDS
                .iter()
                .copied()
                .filter(|k| filter.iter().any(|t| t == k.as_str()))
                .collect(),
            _ => RECALL_KINDS.to_vec(),
        }
    }

    /// Hybrid recall.
    #[allow(clippy::too_many_arguments)]
    pub async fn recall(
        &self,
        query: &str,
        agent_id: Uuid,
        types: Option<&[String]>,
        limit: usize,
        weights: RecallWeights,
        include_related: bool,
    ) -> Result<RecallResponse> {
        if query.trim().is_empty() {
            return Err(Error::InvalidArgument("Query cannot be empty".into()));
        }

        let kinds = Self::candidate_kinds(types);
        let now = Utc::now();

        // Lexical-only fallback: a failed query embedding just skips
        // the semantic arm.
        let query_embedding = if self.embedder.is_available() {
            match self.embedder.embed(query).await {
                Ok(v) => Some(Vector::from(v)),
                Err(e) => {
                    debug!(error = %e, "Query embedding failed, lexical-only recall");
                    None
                }
            }
        } else {
            None
        };

        let mut merged: HashMap<(MemoryKind, Uuid), RecallResult> = HashMap::new();

        for kind in &kinds {
            if let Some(embedding) = &query_embedding {
                match self.semantic_arm(*kind, agent_id, embedding, limit).await {
                    Ok(rows) => {
                        for row in rows {
                            let entry = merged
                                .entry((*kind, row.id))
                                .or_insert_with(|| base_result(*kind, &row));
                            entry.signals.semantic = Some(row.sim);
                        }
                    }
                    Err(e) => warn!(error = %e, kind = %kind, "Semantic arm failed"),
                }
            }

            match self.lexical_arm(*kind, agent_id, query, limit).await {
                Ok(rows) => {
                    for row in rows {
                        let entry = merged
                            .entry((*kind, row.id))
                            .or_insert_with(|| base_result(*kind, &row));
                        entry.signals.keyword = Some(row.sim);
                    }
                }
                Err(e) => warn!(error = %e, kind = %kind, "Lexical arm failed"),
            }
        }

        let mut results: Vec<RecallResult> = merged
            .into_values()
            .map(|mut result| {
                result.signals.recency = Some(recency_signal(result.created_at, now));
                result.score = compose_score(&weights, &result.signals);
                result
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        if include_related {
            self.expand_related(agent_id, &mut results).await;
        }

        // Access accounting is best-effort.
        for result in &results {
            if let Some(kind) = MemoryKind::from_str(&result.item_type) {
                if let Err(e) = db::touch_item(&self.db, kind, result.id).await {
                    debug!(error = %e, id = %result.id, "Access bump failed");
                }
            }
        }

        Ok(RecallResponse {
            total: results.len(),
            results,
            query: query.to_string(),
            weights,
        })
    }

    async fn semantic_arm(
        &self,
        kind: MemoryKind,
        agent_id: Uuid,
        embedding: &Vector,
        limit: usize,
    ) -> Result<Vec<CandidateRow>> {
        let sql = format!(
            r#"
            SELECT id, {expr} AS content, {time_col} AS created_at,
                   (1 - (embedding <=> $2))::float8 AS sim
            FROM {table}
            WHERE agent_id = $1 AND decay_status = 'active' AND embedding IS NOT NULL
            ORDER BY embedding <=> $2
            LIMIT $3
            "#,
            expr = kind.content_expr(),
            time_col = kind.time_column(),
            table = kind.table(),
        );

        let rows = sqlx::query_as::<_, CandidateRow>(&sql)
            .bind(agent_id)
            .bind(embedding)
            .bind(limit as i64)
            .fetch_all(&self.db)
            .await?;

        Ok(rows)
    }

    async fn lexical_arm(
        &self,
        kind: MemoryKind,
        agent_id: Uuid,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CandidateRow>> {
        let sql = format!(
            r#"
            SELECT id, {expr} AS content, {time_col} AS created_at,
                   similarity({expr}, $2)::float8 AS sim
            FROM {table}
            WHERE agent_id = $1 AND decay_status = 'active'
              AND similarity({expr}, $2) > {floor}
            ORDER BY sim DESC
            LIMIT $3
            "#,
            expr = kind.content_expr(),
            time_col = kind.time_column(),
            table = kind.table(),
            floor = LEXICAL_FLOOR,
        );

        let rows = sqlx::query_as::<_, CandidateRow>(&sql)
            .bind(agent_id)
            .bind(query)
            .bind(limit as i64)
            .fetch_all(&self.db)
            .await?;

        Ok(rows)
    }

    /// One-hop expansion over the first few top-K results. Dangling
    /// edge targets are skipped; all failures are swallowed.
    async fn expand_related(&self, agent_id: Uuid, results: &mut [RecallResult]) {
        for result in results.iter_mut().take(EXPANSION_HEADS) {
            let edges = match db::incident_edges(&self.db, agent_id, &result.item_type, result.id)
                .await
            {
                Ok(edges) => edges,
                Err(e) => {
                    debug!(error = %e, id = %result.id, "Edge fetch failed during expansion");
                    continue;
                }
            };

            for edge in edges {
                let (neighbor_type, neighbor_id, direction) =
                    if edge.source_type == result.item_type && edge.source_id == result.id {
                        (edge.target_type.clone(), edge.target_id, "outgoing")
                    } else {
                        (edge.source_type.clone(), edge.source_id, "incoming")
                    };

                let node = match db::get_node_json(&self.db, &neighbor_type, agent_id, neighbor_id)
                    .await
                {
                    Ok(Some(node)) => node,
                    // Dangling reference or unknown type: skip.
                    _ => continue,
                };

                result.related.push(RecallResult {
                    id: neighbor_id,
                    item_type: neighbor_type.clone(),
                    content: node_content(&neighbor_type, &node),
                    score: edge.weight,
                    signals: RecallSignals {
                        graph_boost: Some(edge.weight),
                        ..Default::default()
                    },
                    metadata: json!({
                        "relation": edge.relation,
                        "direction": direction,
                    }),
                    created_at: node_time(&node),
                    related: Vec::new(),
                });
            }
        }
    }

    /// Direct vector search. Requires an embedder.
    pub async fn search(
        &self,
        query: &str,
        agent_id: Uuid,
        types: Option<&[String]>,
        limit: usize,
        threshold: f64,
    ) -> Result<Vec<SearchResult>> {
        if !self.embedder.is_available() {
            return Err(Error::EmbeddingUnavailable);
        }
        if query.trim().is_empty() {
            return Err(Error::InvalidArgument("Query cannot be empty".into()));
        }

        let limit = limit.min(SEARCH_MAX_LIMIT);
        let embedding = Vector::from(self.embedder.embed(query).await?);
        let kinds = Self::candidate_kinds(types);

        let mut results = Vec::new();
        for kind in kinds {
            let sql = format!(
                r#"
                SELECT id, {expr} AS content, {time_col} AS created_at,
                       (1 - (embedding <=> $2))::float8 AS sim
                FROM {table}
                WHERE agent_id = $1 AND decay_status = 'active'
                  AND embedding IS NOT NULL
                  AND (1 - (embedding <=> $2)) > $3
                ORDER BY embedding <=> $2
                LIMIT $4
                "#,
                expr = kind.content_expr(),
                time_col = kind.time_column(),
                table = kind.table(),
            );

            let rows = sqlx::query_as::<_, CandidateRow>(&sql)
                .bind(agent_id)
                .bind(&embedding)
                .bind(threshold)
                .bind(limit as i64)
                .fetch_all(&self.db)
                .await?;

            results.extend(rows.into_iter().map(|row| SearchResult {
                id: row.id,
                item_type: kind.as_str().to_string(),
                content: row.content,
                similarity: row.sim,
                created_at: row.created_at,
            }));
        }

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        Ok(results)
    }
}

fn base_result(kind: MemoryKind, row: &CandidateRow) -> RecallResult {
    RecallResult {
        id: row.id,
        item_type: kind.as_str().to_string(),
        content: row.content.clone(),
        score: 0.0,
        signals: RecallSignals::default(),
        metadata: json!({}),
        created_at: row.created_at,
        related: Vec::new(),
    }
}

/// Canonical display content for a graph neighbor node.
fn node_content(type_str: &str, node: &Value) -> String {
    let get = |key: &str| node[key].as_str().unwrap_or_default().to_string();
    match type_str {
        "fact" | "session_message" => get("content"),
        "decision" => format!("{}: {}", get("title"), get("decision")),
        "task" | "event" => get("title"),
        "project" => get("name"),
        "session" => node["summary"]
            .as_str()
            .or(node["external_id"].as_str())
            .unwrap_or("session")
            .to_string(),
        _ => String::new(),
    }
}

fn node_time(node: &Value) -> DateTime<Utc> {
    for key in ["created_at", "started_at", "occurred_at"] {
        if let Some(raw) = node[key].as_str() {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
                return parsed.with_timezone(&Utc);
            }
        }
    }
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_recency_fresh_is_one() {
        let now = Utc::now();
        let signal = recency_signal(now, now);
        assert!((signal - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_recency_halfway() {
        let now = Utc::now();
        let signal = recency_signal(now - Duration::days(45), now);
        assert!((signal - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_recency_clamped_at_zero() {
        let now = Utc::now();
        let signal = recency_signal(now - Duration::days(400), now);
        assert_eq!(signal, 0.0);
    }

    #[test]
    fn test_compose_score_blend() {
        let weights = RecallWeights {
            semantic: 0.7,
            keyword: 0.2,
            recency: 0.1,
        };
        let signals = RecallSignals {
            semantic: Some(0.8),
            keyword: Some(0.5),
            recency: Some(1.0),
            graph_boost: None,
        };
        let score = compose_score(&weights, &signals);
        assert!((score - (0.7 * 0.8 + 0.2 * 0.5 + 0.1)).abs() < 1e-9);
    }

    #[test]
    fn test_compose_score_missing_signals_are_zero() {
        let weights = RecallWeights::default();
        let signals = RecallSignals {
            keyword: Some(0.4),
            ..Default::default()
        };
        let score = compose_score(&weights, &signals);
        assert!((score - 0.2 * 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_compose_score_graph_boost_fixed_weight() {
        let weights = RecallWeights::default();
        let signals = RecallSignals {
            graph_boost: Some(0.9),
            ..Default::default()
        };
        assert!((compose_score(&weights, &signals) - 0.09).abs() < 1e-9);
    }

    #[test]
    fn test_candidate_kinds_filter() {
        let filter = vec!["fact".to_string(), "task".to_string()];
        let kinds = RecallService::candidate_kinds(Some(&filter));
        assert_eq!(kinds, vec![MemoryKind::Fact, MemoryKind::Task]);

        let all = RecallService::candidate_kinds(None);
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn test_node_content_shapes() {
        let decision = serde_json::json!({"title": "Storage", "decision": "Use PostgreSQL"});
        assert_eq!(node_content("decision", &decision), "Storage: Use PostgreSQL");

        let fact = serde_json::json!({"content": "x"});
        assert_eq!(node_content("fact", &fact), "x");

        let session = serde_json::json!({"summary": null, "external_id": "run-1"});
        assert_eq!(node_content("session", &session), "run-1");
    }
}
