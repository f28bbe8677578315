//! Health endpoint (unauthenticated).

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::{db, AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let db_ok = db::health_check(&state.db).await.is_ok();

    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "db": db_ok,
        "embedder": state.embedder.name(),
    }))
}
