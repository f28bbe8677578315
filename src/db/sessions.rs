//! Session and session message queries.

use pgvector::Vector;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{new_id, Session, SessionMessage};

use super::DbPool;

pub async fn create_session(
    pool: &DbPool,
    agent_id: Uuid,
    external_id: Option<&str>,
    metadata: Value,
) -> Result<Session> {
    let session = sqlx::query_as::<_, Session>(
        r#"
        INSERT INTO sessions (id, agent_id, external_id, metadata)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(agent_id)
    .bind(external_id)
    .bind(metadata)
    .fetch_one(pool)
    .await?;

    Ok(session)
}

pub async fn get_session(pool: &DbPool, id: Uuid) -> Result<Session> {
    sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Session {}", id)))
}

pub async fn list_sessions(pool: &DbPool, agent_id: Uuid) -> Result<Vec<Session>> {
    let sessions = sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE agent_id = $1 ORDER BY started_at DESC",
    )
    .bind(agent_id)
    .fetch_all(pool)
    .await?;
    Ok(sessions)
}

pub async fn session_message_count(pool: &DbPool, session_id: Uuid) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM session_messages WHERE session_id = $1")
            .bind(session_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

pub async fn insert_message(
    pool: &DbPool,
    session_id: Uuid,
    agent_id: Uuid,
    role: &str,
    content: &str,
    metadata: Value,
    embedding: Option<Vector>,
) -> Result<SessionMessage> {
    let message = sqlx::query_as::<_, SessionMessage>(
        r#"
        INSERT INTO session_messages (id, session_id, agent_id, role, content, metadata, embedding)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(session_id)
    .bind(agent_id)
    .bind(role)
    .bind(content)
    .bind(metadata)
    .bind(embedding)
    .fetch_one(pool)
    .await?;

    Ok(message)
}

pub async fn list_messages(pool: &DbPool, session_id: Uuid) -> Result<Vec<SessionMessage>> {
    let messages = sqlx::query_as::<_, SessionMessage>(
        "SELECT * FROM session_messages WHERE session_id = $1 ORDER BY created_at",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(messages)
}

/// The `limit` most recent messages before `before`, returned
/// oldest-first. Used to assemble extraction context.
pub async fn recent_messages(
    pool: &DbPool,
    session_id: Uuid,
    before: chrono::DateTime<chrono::Utc>,
    limit: i64,
) -> Result<Vec<SessionMessage>> {
    let mut messages = sqlx::query_as::<_, SessionMessage>(
        r#"
        SELECT * FROM session_messages
        WHERE session_id = $1 AND created_at < $2
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(session_id)
    .bind(before)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    messages.reverse();
    Ok(messages)
}

/// Mark a session ended with an optional summary. Rejects a second end.
pub async fn end_session(
    pool: &DbPool,
    id: Uuid,
    summary: Option<&str>,
) -> Result<Session> {
    let session = get_session(pool, id).await?;
    if session.has_ended() {
        return Err(Error::InvalidArgument(format!(
            "Session {} already ended",
            id
        )));
    }

    let session = sqlx::query_as::<_, Session>(
        "UPDATE sessions SET ended_at = NOW(), summary = $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(summary)
    .fetch_one(pool)
    .await?;

    Ok(session)
}
