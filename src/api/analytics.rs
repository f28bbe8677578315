//! Analytics routes.
//!
//! Routes:
//! - GET /analytics/queries - per-endpoint summary + recent entries

use axum::{
    extract::{Extension, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::middleware::AuthContext;
use crate::{db, AppState, Result};

pub fn routes() -> Router<AppState> {
    Router::new().route("/analytics/queries", get(queries))
}

async fn queries(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Value>> {
    auth.require("read")?;

    let summary = db::summarize_query_logs(&state.db).await?;
    let recent = db::recent_query_logs(&state.db, 50).await?;

    Ok(Json(json!({
        "summary": summary,
        "recent": recent,
    })))
}
