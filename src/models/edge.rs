//! Typed directed edges between memory nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Edge relation vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRelation {
    CausedBy,
    DecidedIn,
    Blocks,
    RelatesTo,
    Supersedes,
    PartOf,
    LedTo,
    References,
    DependsOn,
    DerivedFrom,
}

impl EdgeRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeRelation::CausedBy => "caused_by",
            EdgeRelation::DecidedIn => "decided_in",
            EdgeRelation::Blocks => "blocks",
            EdgeRelation::RelatesTo => "relates_to",
            EdgeRelation::Supersedes => "supersedes",
            EdgeRelation::PartOf => "part_of",
            EdgeRelation::LedTo => "led_to",
            EdgeRelation::References => "references",
            EdgeRelation::DependsOn => "depends_on",
            EdgeRelation::DerivedFrom => "derived_from",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "caused_by" => Some(EdgeRelation::CausedBy),
            "decided_in" => Some(EdgeRelation::DecidedIn),
            "blocks" => Some(EdgeRelation::Blocks),
            "relates_to" => Some(EdgeRelation::RelatesTo),
            "supersedes" => Some(EdgeRelation::Supersedes),
            "part_of" => Some(EdgeRelation::PartOf),
            "led_to" => Some(EdgeRelation::LedTo),
            "references" => Some(EdgeRelation::References),
            "depends_on" => Some(EdgeRelation::DependsOn),
            "derived_from" => Some(EdgeRelation::DerivedFrom),
            _ => None,
        }
    }
}

/// A typed directed edge. Endpoints are (type, id) pairs without
/// referential integrity; resolution must tolerate dangling targets.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MemoryEdge {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub source_type: String,
    pub source_id: Uuid,
    pub target_type: String,
    pub target_id: Uuid,
    pub relation: String,
    pub weight: f64,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_round_trip() {
        for s in [
            "caused_by",
            "decided_in",
            "blocks",
            "relates_to",
            "supersedes",
            "part_of",
            "led_to",
            "references",
            "depends_on",
            "derived_from",
        ] {
            assert_eq!(EdgeRelation::from_str(s).map(|r| r.as_str()), Some(s));
        }
        assert_eq!(EdgeRelation::from_str("knows"), None);
    }
}
