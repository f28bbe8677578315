//! Decay policy model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-(agent, memory type) decay policy. A row with `agent_id = NULL`
/// is the global default; an agent-scoped row wins over it.
/// `ttl_days = NULL` means the type does not decay.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DecayPolicy {
    pub id: Uuid,
    pub agent_id: Option<Uuid>,
    pub memory_type: String,
    pub ttl_days: Option<i32>,
    pub access_boost: i32,
    pub min_accesses: i32,
    pub created_at: DateTime<Utc>,
}

/// Stats returned by a decay sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecayStats {
    pub transitioned_to_cooling: u64,
    pub transitioned_to_archived: u64,
    pub immune_items: u64,
}
