//! Query log persistence.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::Result;

use super::DbPool;

#[derive(Debug, Clone, serde::Serialize, FromRow)]
pub struct QueryLogRow {
    pub id: Uuid,
    pub agent_id: Option<Uuid>,
    pub endpoint: String,
    pub query_text: Option<String>,
    pub latency_ms: i32,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

pub async fn insert_query_log(
    pool: &DbPool,
    agent_id: Option<Uuid>,
    endpoint: &str,
    query_text: Option<&str>,
    latency_ms: i32,
    metadata: Value,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO query_log (agent_id, endpoint, query_text, latency_ms, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(agent_id)
    .bind(endpoint)
    .bind(query_text)
    .bind(latency_ms)
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn recent_query_logs(pool: &DbPool, limit: i64) -> Result<Vec<QueryLogRow>> {
    let rows = sqlx::query_as::<_, QueryLogRow>(
        "SELECT * FROM query_log ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Aggregate counts and latency per endpoint.
#[derive(Debug, Clone, serde::Serialize, FromRow)]
pub struct QueryLogSummary {
    pub endpoint: String,
    pub count: i64,
    pub avg_latency_ms: Option<f64>,
}

pub async fn summarize_query_logs(pool: &DbPool) -> Result<Vec<QueryLogSummary>> {
    let rows = sqlx::query_as::<_, QueryLogSummary>(
        r#"
        SELECT endpoint, COUNT(*) AS count, AVG(latency_ms)::float8 AS avg_latency_ms
        FROM query_log
        GROUP BY endpoint
        ORDER BY count DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Drop log rows older than the retention window.
pub async fn prune_query_logs(pool: &DbPool, older_than_days: i64) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM query_log WHERE created_at < NOW() - ($1 * INTERVAL '1 day')",
    )
    .bind(older_than_days as f64)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
