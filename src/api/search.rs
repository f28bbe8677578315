//! Search and recall routes.
//!
//! Routes:
//! - POST /search - direct vector search (requires an embedder)
//! - POST /recall - hybrid weighted retrieval
//!
//! Both log to the query analytics table after responding.

use axum::{
    extract::{Extension, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::middleware::AuthContext;
use crate::services::recall::{
    RecallWeights, DEFAULT_KEYWORD_WEIGHT, DEFAULT_LIMIT, DEFAULT_RECENCY_WEIGHT,
    DEFAULT_SEARCH_THRESHOLD, DEFAULT_SEMANTIC_WEIGHT,
};
use crate::{AppState, Error, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/search", post(search))
        .route("/recall", post(recall))
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    agent_id: Option<String>,
    types: Option<Vec<String>>,
    limit: Option<usize>,
    threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RecallRequest {
    query: String,
    agent_id: Option<String>,
    types: Option<Vec<String>>,
    limit: Option<usize>,
    semantic_weight: Option<f64>,
    keyword_weight: Option<f64>,
    recency_weight: Option<f64>,
    include_related: Option<bool>,
}

async fn search(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Value>> {
    let start = std::time::Instant::now();

    let agent_id = request
        .agent_id
        .as_deref()
        .ok_or_else(|| Error::InvalidArgument("agent_id is required".into()))?;
    let agent_id = state.resolve_agent_id(agent_id).await?;
    auth.check_agent(agent_id)?;

    let results = state
        .recall
        .search(
            &request.query,
            agent_id,
            request.types.as_deref(),
            request.limit.unwrap_or(DEFAULT_LIMIT),
            request.threshold.unwrap_or(DEFAULT_SEARCH_THRESHOLD),
        )
        .await?;

    let latency_ms = start.elapsed().as_millis() as i32;
    state
        .analytics
        .log_query(Some(agent_id), "/api/v1/search", Some(&request.query), latency_ms, 200)
        .await;

    let total = results.len();
    Ok(Json(json!({
        "results": results,
        "total": total,
        "query": request.query,
    })))
}

async fn recall(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<RecallRequest>,
) -> Result<Json<Value>> {
    let start = std::time::Instant::now();

    let agent_id = request
        .agent_id
        .as_deref()
        .ok_or_else(|| Error::InvalidArgument("agent_id is required".into()))?;
    let agent_id = state.resolve_agent_id(agent_id).await?;
    auth.check_agent(agent_id)?;

    let weights = RecallWeights {
        semantic: request.semantic_weight.unwrap_or(DEFAULT_SEMANTIC_WEIGHT),
        keyword: request.keyword_weight.unwrap_or(DEFAULT_KEYWORD_WEIGHT),
        recency: request.recency_weight.unwrap_or(DEFAULT_RECENCY_WEIGHT),
    };

    let response = state
        .recall
        .recall(
            &request.query,
            agent_id,
            request.types.as_deref(),
            request.limit.unwrap_or(DEFAULT_LIMIT),
            weights,
            request.include_related.unwrap_or(true),
        )
        .await?;

    let latency_ms = start.elapsed().as_millis() as i32;
    state
        .analytics
        .log_query(Some(agent_id), "/api/v1/recall", Some(&request.query), latency_ms, 200)
        .await;

    Ok(Json(serde_json::to_value(response)?))
}
