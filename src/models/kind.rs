//! The closed set of memory item kinds.
//!
//! Recall, dedup and decay all iterate this value table instead of
//! dispatching on table-name strings.

use serde::{Deserialize, Serialize};

/// A kind of memory item with its own backing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    SessionMessage,
    Fact,
    Decision,
    Task,
    Event,
    Project,
}

/// The kinds that participate in recall and direct search.
pub const RECALL_KINDS: [MemoryKind; 5] = [
    MemoryKind::SessionMessage,
    MemoryKind::Fact,
    MemoryKind::Decision,
    MemoryKind::Task,
    MemoryKind::Event,
];

/// The kinds that participate in dedup on direct writes.
pub const DEDUP_KINDS: [MemoryKind; 4] = [
    MemoryKind::Fact,
    MemoryKind::Decision,
    MemoryKind::Task,
    MemoryKind::Event,
];

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::SessionMessage => "session_message",
            MemoryKind::Fact => "fact",
            MemoryKind::Decision => "decision",
            MemoryKind::Task => "task",
            MemoryKind::Event => "event",
            MemoryKind::Project => "project",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "session_message" => Some(MemoryKind::SessionMessage),
            "fact" => Some(MemoryKind::Fact),
            "decision" => Some(MemoryKind::Decision),
            "task" => Some(MemoryKind::Task),
            "event" => Some(MemoryKind::Event),
            "project" => Some(MemoryKind::Project),
            _ => None,
        }
    }

    /// Backing table name.
    pub fn table(&self) -> &'static str {
        match self {
            MemoryKind::SessionMessage => "session_messages",
            MemoryKind::Fact => "facts",
            MemoryKind::Decision => "decisions",
            MemoryKind::Task => "tasks",
            MemoryKind::Event => "events",
            MemoryKind::Project => "projects",
        }
    }

    /// SQL expression for the canonical content column used by trigram
    /// matching, dedup and recall result payloads.
    pub fn content_expr(&self) -> &'static str {
        match self {
            MemoryKind::SessionMessage => "content",
            MemoryKind::Fact => "content",
            MemoryKind::Decision => "title || ': ' || decision",
            MemoryKind::Task => "title",
            MemoryKind::Event => "title",
            MemoryKind::Project => "name",
        }
    }

    /// Column driving the recency signal and the decay TTL clock.
    pub fn time_column(&self) -> &'static str {
        match self {
            MemoryKind::Event => "occurred_at",
            _ => "created_at",
        }
    }

    /// Column driving the cooling-to-archived clock. Session messages
    /// are immutable and have no updated_at.
    pub fn updated_column(&self) -> &'static str {
        match self {
            MemoryKind::SessionMessage => "created_at",
            MemoryKind::Event => "occurred_at",
            _ => "updated_at",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for kind in RECALL_KINDS {
            assert_eq!(MemoryKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(MemoryKind::from_str("project"), Some(MemoryKind::Project));
        assert_eq!(MemoryKind::from_str("nonsense"), None);
    }

    #[test]
    fn test_value_table() {
        assert_eq!(MemoryKind::Fact.table(), "facts");
        assert_eq!(MemoryKind::Decision.content_expr(), "title || ': ' || decision");
        assert_eq!(MemoryKind::Event.time_column(), "occurred_at");
        assert_eq!(MemoryKind::Fact.time_column(), "created_at");
    }

    #[test]
    fn test_projects_excluded_from_recall_and_dedup() {
        assert!(!RECALL_KINDS.contains(&MemoryKind::Project));
        assert!(!DEDUP_KINDS.contains(&MemoryKind::Project));
        assert!(!DEDUP_KINDS.contains(&MemoryKind::SessionMessage));
    }
}
