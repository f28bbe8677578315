//! API key queries.

use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{new_id, ApiKey};

use super::DbPool;

pub async fn insert_api_key(
    pool: &DbPool,
    key_hash: &str,
    key_prefix: &str,
    name: &str,
    agent_id: Option<Uuid>,
    permissions: Value,
    rate_limit: i32,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<ApiKey> {
    let key = sqlx::query_as::<_, ApiKey>(
        r#"
        INSERT INTO api_keys (id, key_hash, key_prefix, name, agent_id, permissions, rate_limit, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(key_hash)
    .bind(key_prefix)
    .bind(name)
    .bind(agent_id)
    .bind(permissions)
    .bind(rate_limit)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(key)
}

pub async fn list_api_keys(pool: &DbPool) -> Result<Vec<ApiKey>> {
    let keys = sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;
    Ok(keys)
}

pub async fn find_api_key_by_hash(pool: &DbPool, key_hash: &str) -> Result<Option<ApiKey>> {
    let key = sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE key_hash = $1")
        .bind(key_hash)
        .fetch_optional(pool)
        .await?;
    Ok(key)
}

/// Soft-revoke a key. 404 if the key is unknown.
pub async fn revoke_api_key(pool: &DbPool, id: Uuid) -> Result<()> {
    let result = sqlx::query(
        "UPDATE api_keys SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("API key {}", id)));
    }

    Ok(())
}

/// Fire-and-forget last-used stamp.
pub async fn touch_api_key(pool: &DbPool, id: Uuid) {
    let _ = sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await;
}
