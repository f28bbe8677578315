//! Agent routes.
//!
//! Routes:
//! - POST /agents - create
//! - GET /agents - list
//! - GET /agents/:id - resolve by UUID or slug, with per-table counts
//! - PATCH /agents/:id - update display name / description / config
//! - PATCH /agents/:id/core-memory - JSON merge-patch with null-stripping

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::middleware::AuthContext;
use crate::models::{is_valid_slug, Agent};
use crate::{db, AppState, Error, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/agents", post(create_agent).get(list_agents))
        .route("/agents/:id", get(get_agent).patch(update_agent))
        .route("/agents/:id/core-memory", patch(patch_core_memory))
}

#[derive(Debug, Deserialize)]
struct CreateAgentRequest {
    slug: String,
    display_name: String,
    description: Option<String>,
    #[serde(default)]
    core_memory: Option<Value>,
    #[serde(default)]
    config: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct UpdateAgentRequest {
    display_name: Option<String>,
    description: Option<String>,
    config: Option<Value>,
}

async fn create_agent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<Agent>)> {
    auth.require("write")?;

    if !is_valid_slug(&request.slug) {
        return Err(Error::InvalidArgument(format!(
            "Invalid slug '{}': expected ^[a-z0-9][a-z0-9_-]*$",
            request.slug
        )));
    }
    if request.display_name.trim().is_empty() {
        return Err(Error::InvalidArgument("display_name is required".into()));
    }

    let agent = db::create_agent(
        &state.db,
        &request.slug,
        &request.display_name,
        request.description.as_deref(),
        request.core_memory.unwrap_or_else(|| json!({})),
        request.config.unwrap_or_else(|| json!({})),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(agent)))
}

async fn list_agents(State(state): State<AppState>) -> Result<Json<Vec<Agent>>> {
    let agents = db::list_agents(&state.db).await?;
    Ok(Json(agents))
}

async fn get_agent(
    State(state): State<AppState>,
    Path(id_or_slug): Path<String>,
) -> Result<Json<Value>> {
    let agent = db::get_agent_by_id_or_slug(&state.db, &id_or_slug).await?;
    let counts = db::agent_counts(&state.db, agent.id).await?;

    let mut body = serde_json::to_value(&agent)?;
    body["counts"] = counts;

    Ok(Json(body))
}

async fn update_agent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id_or_slug): Path<String>,
    Json(request): Json<UpdateAgentRequest>,
) -> Result<Json<Agent>> {
    auth.require("write")?;

    let agent_id = state.resolve_agent_id(&id_or_slug).await?;
    auth.check_agent(agent_id)?;

    let agent = db::update_agent(
        &state.db,
        agent_id,
        request.display_name.as_deref(),
        request.description.as_deref(),
        request.config,
    )
    .await?;

    Ok(Json(agent))
}

async fn patch_core_memory(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id_or_slug): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Json<Agent>> {
    auth.require("write")?;

    if !patch.is_object() {
        return Err(Error::InvalidArgument(
            "Core memory patch must be a JSON object".into(),
        ));
    }

    let agent_id = state.resolve_agent_id(&id_or_slug).await?;
    auth.check_agent(agent_id)?;

    let agent = db::patch_core_memory(&state.db, agent_id, &patch).await?;

    Ok(Json(agent))
}
