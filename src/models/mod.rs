//! Data models for HexMem.
//!
//! Defines the core types used throughout the system: agents, sessions,
//! the typed memory items, edges, decay policies and API keys.

mod agent;
mod api_key;
mod decay;
mod draft;
mod edge;
mod item;
mod kind;
mod session;

pub use agent::*;
pub use api_key::*;
pub use decay::*;
pub use draft::*;
pub use edge::*;
pub use item::*;
pub use kind::*;
pub use session::*;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new UUID
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}

/// Current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
