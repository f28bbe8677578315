//! HexMem - structured semantic memory for autonomous agents.
//!
//! Persists typed memory items (facts, decisions, tasks, events,
//! projects, session messages) with vector embeddings, a typed
//! relationship graph and decay metadata, and exposes hybrid recall
//! blending semantic, lexical and recency signals.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;

pub use config::config;
pub use error::{Error, Result};
pub use state::AppState;
