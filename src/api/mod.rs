//! API routes for HexMem.
//!
//! Route structure:
//! - /health - liveness (public)
//! - /api/v1/* - everything else, behind bearer-key auth

mod agents;
mod analytics;
mod decay;
mod edges;
mod health;
mod items;
mod keys;
mod search;
mod sessions;

use axum::Router;

use crate::middleware::require_auth;
use crate::AppState;

/// Build the complete API router.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .nest("/api/v1", v1_routes(state))
}

fn v1_routes(state: AppState) -> Router<AppState> {
    Router::<AppState>::new()
        .merge(agents::routes())
        .merge(keys::routes())
        .merge(sessions::routes())
        .merge(items::routes())
        .merge(search::routes())
        .merge(edges::routes())
        .merge(decay::routes())
        .merge(analytics::routes())
        .layer(axum::middleware::from_fn_with_state(state, require_auth))
}
