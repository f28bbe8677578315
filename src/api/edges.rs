//! Edge graph routes.
//!
//! Routes:
//! - POST /edges - create/upsert on the 5-tuple
//! - GET /edges - list with filters
//! - GET /edges/graph/:type/:id - bidirectional node view
//! - DELETE /edges/:id

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::node_table;
use crate::middleware::AuthContext;
use crate::models::{EdgeRelation, MemoryEdge};
use crate::{db, AppState, Error, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/edges", post(create_edge).get(list_edges))
        .route("/edges/graph/:type/:id", get(node_graph))
        .route("/edges/:id", delete(delete_edge))
}

#[derive(Debug, Deserialize)]
struct CreateEdgeRequest {
    agent_id: String,
    source_type: String,
    source_id: Uuid,
    target_type: String,
    target_id: Uuid,
    relation: String,
    weight: Option<f64>,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ListEdgesQuery {
    agent_id: Option<String>,
    source_type: Option<String>,
    source_id: Option<Uuid>,
    target_type: Option<String>,
    target_id: Option<Uuid>,
    relation: Option<String>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GraphQuery {
    agent_id: Option<String>,
}

fn validate_node_type(type_str: &str) -> Result<()> {
    if node_table(type_str).is_none() {
        return Err(Error::InvalidArgument(format!(
            "Unknown node type '{}'",
            type_str
        )));
    }
    Ok(())
}

async fn create_edge(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateEdgeRequest>,
) -> Result<(StatusCode, Json<MemoryEdge>)> {
    auth.require("write")?;

    validate_node_type(&request.source_type)?;
    validate_node_type(&request.target_type)?;
    if EdgeRelation::from_str(&request.relation).is_none() {
        return Err(Error::InvalidArgument(format!(
            "Unknown relation '{}'",
            request.relation
        )));
    }
    let weight = request.weight.unwrap_or(1.0);
    if weight < 0.0 {
        return Err(Error::InvalidArgument("weight must be >= 0".into()));
    }

    let agent_id = state.resolve_agent_id(&request.agent_id).await?;
    auth.check_agent(agent_id)?;

    let edge = db::upsert_edge(
        &state.db,
        agent_id,
        &request.source_type,
        request.source_id,
        &request.target_type,
        request.target_id,
        &request.relation,
        weight,
        request.metadata.unwrap_or_else(|| json!({})),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(edge)))
}

async fn list_edges(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListEdgesQuery>,
) -> Result<Json<Vec<MemoryEdge>>> {
    let agent_id = query
        .agent_id
        .as_deref()
        .ok_or_else(|| Error::InvalidArgument("agent_id is required".into()))?;
    let agent_id = state.resolve_agent_id(agent_id).await?;
    auth.check_agent(agent_id)?;

    let edges = db::list_edges(
        &state.db,
        agent_id,
        query.source_type.as_deref(),
        query.source_id,
        query.target_type.as_deref(),
        query.target_id,
        query.relation.as_deref(),
        query.limit.unwrap_or(100).clamp(1, 1000),
    )
    .await?;

    Ok(Json(edges))
}

/// Bidirectional node view: the node plus its outgoing and incoming
/// edges. A rare self-edge appears in both directions.
async fn node_graph(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((node_type, node_id)): Path<(String, Uuid)>,
    Query(query): Query<GraphQuery>,
) -> Result<Json<Value>> {
    validate_node_type(&node_type)?;

    let agent_id = query
        .agent_id
        .as_deref()
        .ok_or_else(|| Error::InvalidArgument("agent_id is required".into()))?;
    let agent_id = state.resolve_agent_id(agent_id).await?;
    auth.check_agent(agent_id)?;

    let node = db::get_node_json(&state.db, &node_type, agent_id, node_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", node_type, node_id)))?;

    let outgoing = db::outgoing_edges(&state.db, agent_id, &node_type, node_id).await?;
    let incoming = db::incoming_edges(&state.db, agent_id, &node_type, node_id).await?;
    let total = outgoing.len() + incoming.len();

    Ok(Json(json!({
        "node": node,
        "outgoing": outgoing,
        "incoming": incoming,
        "total": total,
    })))
}

async fn delete_edge(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<GraphQuery>,
) -> Result<StatusCode> {
    auth.require("write")?;

    let agent_id = query
        .agent_id
        .as_deref()
        .ok_or_else(|| Error::InvalidArgument("agent_id is required".into()))?;
    let agent_id = state.resolve_agent_id(agent_id).await?;
    auth.check_agent(agent_id)?;

    db::delete_edge(&state.db, agent_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
