//! Edge queries: upsert on the 5-tuple, filtered listing, deletion.

use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{new_id, MemoryEdge};

use super::DbPool;

/// Create or update an edge. A duplicate
/// (source_type, source_id, target_type, target_id, relation) tuple
/// updates weight and metadata in place and keeps the original id.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_edge(
    pool: &DbPool,
    agent_id: Uuid,
    source_type: &str,
    source_id: Uuid,
    target_type: &str,
    target_id: Uuid,
    relation: &str,
    weight: f64,
    metadata: Value,
) -> Result<MemoryEdge> {
    let edge = sqlx::query_as::<_, MemoryEdge>(
        r#"
        INSERT INTO memory_edges (id, agent_id, source_type, source_id, target_type, target_id, relation, weight, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (source_type, source_id, target_type, target_id, relation)
        DO UPDATE SET weight = EXCLUDED.weight,
                      metadata = EXCLUDED.metadata,
                      updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(agent_id)
    .bind(source_type)
    .bind(source_id)
    .bind(target_type)
    .bind(target_id)
    .bind(relation)
    .bind(weight)
    .bind(metadata)
    .fetch_one(pool)
    .await?;

    Ok(edge)
}

/// List edges filtered by any subset of the tuple fields.
pub async fn list_edges(
    pool: &DbPool,
    agent_id: Uuid,
    source_type: Option<&str>,
    source_id: Option<Uuid>,
    target_type: Option<&str>,
    target_id: Option<Uuid>,
    relation: Option<&str>,
    limit: i64,
) -> Result<Vec<MemoryEdge>> {
    let edges = sqlx::query_as::<_, MemoryEdge>(
        r#"
        SELECT * FROM memory_edges
        WHERE agent_id = $1
          AND ($2::text IS NULL OR source_type = $2)
          AND ($3::uuid IS NULL OR source_id = $3)
          AND ($4::text IS NULL OR target_type = $4)
          AND ($5::uuid IS NULL OR target_id = $5)
          AND ($6::text IS NULL OR relation = $6)
        ORDER BY created_at DESC
        LIMIT $7
        "#,
    )
    .bind(agent_id)
    .bind(source_type)
    .bind(source_id)
    .bind(target_type)
    .bind(target_id)
    .bind(relation)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(edges)
}

/// All edges where the node appears as source.
pub async fn outgoing_edges(
    pool: &DbPool,
    agent_id: Uuid,
    node_type: &str,
    node_id: Uuid,
) -> Result<Vec<MemoryEdge>> {
    let edges = sqlx::query_as::<_, MemoryEdge>(
        r#"
        SELECT * FROM memory_edges
        WHERE agent_id = $1 AND source_type = $2 AND source_id = $3
        ORDER BY weight DESC, created_at DESC
        "#,
    )
    .bind(agent_id)
    .bind(node_type)
    .bind(node_id)
    .fetch_all(pool)
    .await?;
    Ok(edges)
}

/// All edges where the node appears as target.
pub async fn incoming_edges(
    pool: &DbPool,
    agent_id: Uuid,
    node_type: &str,
    node_id: Uuid,
) -> Result<Vec<MemoryEdge>> {
    let edges = sqlx::query_as::<_, MemoryEdge>(
        r#"
        SELECT * FROM memory_edges
        WHERE agent_id = $1 AND target_type = $2 AND target_id = $3
        ORDER BY weight DESC, created_at DESC
        "#,
    )
    .bind(agent_id)
    .bind(node_type)
    .bind(node_id)
    .fetch_all(pool)
    .await?;
    Ok(edges)
}

/// Edges incident to a node in either direction, for recall expansion.
pub async fn incident_edges(
    pool: &DbPool,
    agent_id: Uuid,
    node_type: &str,
    node_id: Uuid,
) -> Result<Vec<MemoryEdge>> {
    let edges = sqlx::query_as::<_, MemoryEdge>(
        r#"
        SELECT * FROM memory_edges
        WHERE agent_id = $1
          AND ((source_type = $2 AND source_id = $3) OR (target_type = $2 AND target_id = $3))
        ORDER BY weight DESC, created_at DESC
        "#,
    )
    .bind(agent_id)
    .bind(node_type)
    .bind(node_id)
    .fetch_all(pool)
    .await?;
    Ok(edges)
}

pub async fn delete_edge(pool: &DbPool, agent_id: Uuid, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM memory_edges WHERE id = $1 AND agent_id = $2")
        .bind(id)
        .bind(agent_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Edge {}", id)));
    }

    Ok(())
}
