//! Agent queries: CRUD, slug/UUID resolution, core-memory merge-patch.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{new_id, Agent};

use super::DbPool;

pub async fn create_agent(
    pool: &DbPool,
    slug: &str,
    display_name: &str,
    description: Option<&str>,
    core_memory: Value,
    config: Value,
) -> Result<Agent> {
    let agent = sqlx::query_as::<_, Agent>(
        r#"
        INSERT INTO agents (id, slug, display_name, description, core_memory, config)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(slug)
    .bind(display_name)
    .bind(description)
    .bind(core_memory)
    .bind(config)
    .fetch_one(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::Conflict(format!("Agent slug '{}' already exists", slug))
        }
        _ => e.into(),
    })?;

    Ok(agent)
}

pub async fn list_agents(pool: &DbPool) -> Result<Vec<Agent>> {
    let agents = sqlx::query_as::<_, Agent>("SELECT * FROM agents ORDER BY created_at")
        .fetch_all(pool)
        .await?;
    Ok(agents)
}

pub async fn get_agent(pool: &DbPool, id: Uuid) -> Result<Agent> {
    sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Agent {}", id)))
}

/// Resolve an agent by UUID or slug.
pub async fn get_agent_by_id_or_slug(pool: &DbPool, id_or_slug: &str) -> Result<Agent> {
    if let Ok(id) = Uuid::parse_str(id_or_slug) {
        return get_agent(pool, id).await;
    }

    sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE slug = $1")
        .bind(id_or_slug)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Agent '{}'", id_or_slug)))
}

pub async fn update_agent(
    pool: &DbPool,
    id: Uuid,
    display_name: Option<&str>,
    description: Option<&str>,
    config: Option<Value>,
) -> Result<Agent> {
    let agent = sqlx::query_as::<_, Agent>(
        r#"
        UPDATE agents
        SET display_name = COALESCE($2, display_name),
            description = COALESCE($3, description),
            config = COALESCE($4, config),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(display_name)
    .bind(description)
    .bind(config)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Agent {}", id)))?;

    Ok(agent)
}

/// Apply a JSON merge-patch with null-stripping to the agent's core
/// memory. The whole update is a single UPDATE, so it is atomic at the
/// row level.
pub async fn patch_core_memory(pool: &DbPool, id: Uuid, patch: &Value) -> Result<Agent> {
    let agent = get_agent(pool, id).await?;
    let merged = merge_patch(agent.core_memory, patch);

    let agent = sqlx::query_as::<_, Agent>(
        "UPDATE agents SET core_memory = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(merged)
    .fetch_one(pool)
    .await?;

    Ok(agent)
}

/// RFC 7396-style merge-patch: null values delete keys, nested objects
/// merge recursively, anything else replaces.
pub fn merge_patch(target: Value, patch: &Value) -> Value {
    let Value::Object(patch_map) = patch else {
        return patch.clone();
    };

    let mut merged = match target {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    for (key, value) in patch_map {
        if value.is_null() {
            merged.remove(key);
        } else {
            let existing = merged.remove(key).unwrap_or(Value::Null);
            merged.insert(key.clone(), merge_patch(existing, value));
        }
    }

    Value::Object(merged)
}

/// Per-table item counts for an agent.
pub async fn agent_counts(pool: &DbPool, agent_id: Uuid) -> Result<Value> {
    let mut counts = Map::new();
    for table in [
        "sessions",
        "session_messages",
        "facts",
        "decisions",
        "tasks",
        "events",
        "projects",
    ] {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE agent_id = $1", table);
        let count: i64 = sqlx::query_scalar(&sql).bind(agent_id).fetch_one(pool).await?;
        counts.insert(table.to_string(), Value::from(count));
    }
    Ok(Value::Object(counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_patch_adds_and_replaces() {
        let target = json!({"a": 1, "b": "old"});
        let patch = json!({"b": "new", "c": true});
        assert_eq!(
            merge_patch(target, &patch),
            json!({"a": 1, "b": "new", "c": true})
        );
    }

    #[test]
    fn test_merge_patch_null_deletes_key() {
        let target = json!({"keep": 1, "drop": 2});
        let patch = json!({"drop": null});
        assert_eq!(merge_patch(target, &patch), json!({"keep": 1}));
    }

    #[test]
    fn test_merge_patch_nested() {
        let target = json!({"profile": {"name": "x", "stale": true}});
        let patch = json!({"profile": {"stale": null, "role": "dev"}});
        assert_eq!(
            merge_patch(target, &patch),
            json!({"profile": {"name": "x", "role": "dev"}})
        );
    }

    #[test]
    fn test_merge_patch_scalar_patch_replaces() {
        let target = json!({"a": 1});
        assert_eq!(merge_patch(target, &json!("plain")), json!("plain"));
    }

    #[test]
    fn test_merge_patch_into_non_object() {
        let target = json!(42);
        let patch = json!({"a": 1});
        assert_eq!(merge_patch(target, &patch), json!({"a": 1}));
    }
}
