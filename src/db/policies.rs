//! Decay policy queries.

use uuid::Uuid;

use crate::error::Result;
use crate::models::{DecayPolicy, MemoryKind};

use super::DbPool;

/// Resolve the applicable policy for (agent, kind): the agent-scoped row
/// wins over the global default.
pub async fn resolve_policy(
    pool: &DbPool,
    agent_id: Uuid,
    kind: MemoryKind,
) -> Result<Option<DecayPolicy>> {
    let policy = sqlx::query_as::<_, DecayPolicy>(
        r#"
        SELECT * FROM decay_policies
        WHERE memory_type = $2 AND (agent_id = $1 OR agent_id IS NULL)
        ORDER BY agent_id NULLS LAST
        LIMIT 1
        "#,
    )
    .bind(agent_id)
    .bind(kind.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(policy)
}

/// All policies visible to an agent (its own plus the global defaults).
pub async fn list_policies(pool: &DbPool, agent_id: Option<Uuid>) -> Result<Vec<DecayPolicy>> {
    let policies = sqlx::query_as::<_, DecayPolicy>(
        r#"
        SELECT * FROM decay_policies
        WHERE agent_id IS NULL OR ($1::uuid IS NOT NULL AND agent_id = $1)
        ORDER BY memory_type, agent_id NULLS LAST
        "#,
    )
    .bind(agent_id)
    .fetch_all(pool)
    .await?;

    Ok(policies)
}
