//! Session routes, including the ingestion hot path.
//!
//! Routes:
//! - POST /sessions - start
//! - GET /sessions?agent_id= - list
//! - GET /sessions/:id - detail incl. message_count
//! - POST /sessions/:id/messages - persist + extract (hot path)
//! - GET /sessions/:id/messages - list
//! - POST /sessions/:id/end - summarize and mark ended

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::middleware::AuthContext;
use crate::models::{MessageRole, Session, SessionMessage};
use crate::{db, AppState, Error, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/messages", post(add_message).get(list_messages))
        .route("/sessions/:id/end", post(end_session))
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    agent_id: String,
    external_id: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ListSessionsQuery {
    agent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddMessageRequest {
    role: String,
    content: String,
    #[serde(default)]
    metadata: Option<Value>,
}

async fn create_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Session>)> {
    auth.require("write")?;

    let agent_id = state.resolve_agent_id(&request.agent_id).await?;
    auth.check_agent(agent_id)?;

    let session = db::create_session(
        &state.db,
        agent_id,
        request.external_id.as_deref(),
        request.metadata.unwrap_or_else(|| json!({})),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<Session>>> {
    let agent_id = query
        .agent_id
        .ok_or_else(|| Error::InvalidArgument("agent_id is required".into()))?;
    let agent_id = state.resolve_agent_id(&agent_id).await?;

    let sessions = db::list_sessions(&state.db, agent_id).await?;
    Ok(Json(sessions))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let session = db::get_session(&state.db, id).await?;
    let message_count = db::session_message_count(&state.db, id).await?;

    let mut body = serde_json::to_value(&session)?;
    body["message_count"] = json!(message_count);

    Ok(Json(body))
}

/// The ingestion hot path: persist, assemble context, extract, store
/// items, link them to the session.
async fn add_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddMessageRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    auth.require("write")?;

    let role = MessageRole::from_str(&request.role).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "Invalid role '{}': expected user|assistant|system|tool",
            request.role
        ))
    })?;

    let session = db::get_session(&state.db, id).await?;
    auth.check_agent(session.agent_id)?;

    let (message, counts) = state
        .ingest
        .add_message(
            id,
            role,
            &request.content,
            request.metadata.unwrap_or_else(|| json!({})),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": message,
            "extracted": counts,
        })),
    ))
}

async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SessionMessage>>> {
    // 404 for unknown sessions rather than an empty list
    db::get_session(&state.db, id).await?;
    let messages = db::list_messages(&state.db, id).await?;
    Ok(Json(messages))
}

async fn end_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>> {
    auth.require("write")?;

    let session = db::get_session(&state.db, id).await?;
    auth.check_agent(session.agent_id)?;

    if session.has_ended() {
        return Err(Error::InvalidArgument(format!("Session {} already ended", id)));
    }

    // Summarization is best-effort; a provider failure ends the session
    // with a null summary.
    let messages = db::list_messages(&state.db, id).await.unwrap_or_default();
    let summary = state.summarizer.summarize(&messages).await;

    let session = db::end_session(&state.db, id, summary.as_deref()).await?;

    Ok(Json(session))
}
