//! API key routes.
//!
//! Routes:
//! - POST /keys - create; the raw key is returned exactly once
//! - GET /keys - list metadata
//! - DELETE /keys/:id - revoke

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::middleware::{auth::hash_token, AuthContext};
use crate::models::ApiKey;
use crate::{db, AppState, Error, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/keys", post(create_key).get(list_keys))
        .route("/keys/:id", delete(revoke_key))
}

#[derive(Debug, Deserialize)]
struct CreateKeyRequest {
    name: String,
    agent_id: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
    rate_limit: Option<i32>,
    expires_at: Option<DateTime<Utc>>,
}

async fn create_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateKeyRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    auth.require("write")?;

    if request.name.trim().is_empty() {
        return Err(Error::InvalidArgument("name is required".into()));
    }

    let permissions: Vec<String> = if request.permissions.is_empty() {
        vec!["read".into()]
    } else {
        for perm in &request.permissions {
            if !matches!(perm.as_str(), "read" | "write" | "admin") {
                return Err(Error::InvalidArgument(format!(
                    "Unknown permission '{}'",
                    perm
                )));
            }
        }
        request.permissions
    };

    let agent_id = match &request.agent_id {
        Some(id_or_slug) => Some(state.resolve_agent_id(id_or_slug).await?),
        None => None,
    };

    // Raw key format: hm_{prefix}_{secret}. Only the hash is stored.
    let prefix = nanoid::nanoid!(8, &nanoid::alphabet::SAFE);
    let secret = nanoid::nanoid!(32, &nanoid::alphabet::SAFE);
    let raw_key = format!("hm_{}_{}", prefix, secret);

    let key = db::insert_api_key(
        &state.db,
        &hash_token(&raw_key),
        &format!("hm_{}", prefix),
        &request.name,
        agent_id,
        json!(permissions),
        request.rate_limit.unwrap_or(1000),
        request.expires_at,
    )
    .await?;

    let mut body = serde_json::to_value(&key)?;
    body["key"] = json!(raw_key);

    Ok((StatusCode::CREATED, Json(body)))
}

async fn list_keys(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ApiKey>>> {
    auth.require("read")?;
    let keys = db::list_api_keys(&state.db).await?;
    Ok(Json(keys))
}

async fn revoke_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    auth.require("write")?;
    db::revoke_api_key(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
