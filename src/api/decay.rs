//! Decay routes.
//!
//! Routes:
//! - GET /decay/status?agent_id= - per-table counts + policies
//! - POST /decay/sweep - manual trigger, optional agent scope
//! - POST /decay/revive - move a cooling/archived item back to active

use axum::{
    extract::{Extension, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::AuthContext;
use crate::models::{DecayStats, MemoryKind};
use crate::{db, AppState, Error, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/decay/status", get(status))
        .route("/decay/sweep", post(sweep))
        .route("/decay/revive", post(revive))
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    agent_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct SweepRequest {
    agent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReviveRequest {
    agent_id: String,
    #[serde(rename = "type")]
    item_type: String,
    id: Uuid,
}

async fn status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>> {
    let agent_id = query
        .agent_id
        .as_deref()
        .ok_or_else(|| Error::InvalidArgument("agent_id is required".into()))?;
    let agent_id = state.resolve_agent_id(agent_id).await?;
    auth.check_agent(agent_id)?;

    let status = state.decay.status(agent_id).await?;
    Ok(Json(status))
}

async fn sweep(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    body: Option<Json<SweepRequest>>,
) -> Result<Json<DecayStats>> {
    auth.require("write")?;

    let request = body.map(|Json(r)| r).unwrap_or_default();
    let agent_scope = match request.agent_id.as_deref() {
        Some(id_or_slug) => {
            let agent_id = state.resolve_agent_id(id_or_slug).await?;
            auth.check_agent(agent_id)?;
            Some(agent_id)
        }
        None => None,
    };

    let stats = state.decay.sweep(agent_scope).await?;
    Ok(Json(stats))
}

async fn revive(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<ReviveRequest>,
) -> Result<Json<Value>> {
    auth.require("write")?;

    let kind = MemoryKind::from_str(&request.item_type).ok_or_else(|| {
        Error::InvalidArgument(format!("Unknown memory type '{}'", request.item_type))
    })?;

    let agent_id = state.resolve_agent_id(&request.agent_id).await?;
    auth.check_agent(agent_id)?;

    db::revive_item(&state.db, kind, agent_id, request.id).await?;

    Ok(Json(serde_json::json!({ "revived": request.id })))
}
