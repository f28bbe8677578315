//! Creation payloads for memory items.
//!
//! Shared between the direct-write API and the ingestion pipeline (the
//! extractor produces drafts too).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::MemoryKind;

fn default_confidence() -> f64 {
    1.0
}

fn default_priority() -> i32 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactDraft {
    pub content: String,
    pub subject: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionDraft {
    pub title: String,
    pub decision: String,
    pub rationale: Option<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
    pub context: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub project_id: Option<Uuid>,
    pub blocked_by: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub event_type: String,
    pub description: Option<String>,
    pub outcome: Option<String>,
    pub severity: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub project_id: Option<Uuid>,
    pub caused_by: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
}

/// A draft of any extractable memory item.
#[derive(Debug, Clone)]
pub enum ItemDraft {
    Fact(FactDraft),
    Decision(DecisionDraft),
    Task(TaskDraft),
    Event(EventDraft),
}

impl ItemDraft {
    pub fn kind(&self) -> MemoryKind {
        match self {
            ItemDraft::Fact(_) => MemoryKind::Fact,
            ItemDraft::Decision(_) => MemoryKind::Decision,
            ItemDraft::Task(_) => MemoryKind::Task,
            ItemDraft::Event(_) => MemoryKind::Event,
        }
    }

    /// Canonical text embedded and matched by dedup; one formula per
    /// kind, mirroring the SQL content expressions.
    pub fn canonical_text(&self) -> String {
        match self {
            ItemDraft::Fact(f) => f.content.clone(),
            ItemDraft::Decision(d) => format!("{}: {}", d.title, d.decision),
            ItemDraft::Task(t) => t.title.clone(),
            ItemDraft::Event(e) => e.title.clone(),
        }
    }
}

pub fn tags_json(tags: &[String]) -> Value {
    Value::Array(tags.iter().map(|t| Value::String(t.clone())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_text_per_kind() {
        let decision = ItemDraft::Decision(DecisionDraft {
            title: "Storage".into(),
            decision: "Use PostgreSQL".into(),
            rationale: None,
            alternatives: vec![],
            context: None,
            tags: vec![],
        });
        assert_eq!(decision.canonical_text(), "Storage: Use PostgreSQL");

        let task = ItemDraft::Task(TaskDraft {
            title: "Ship search".into(),
            description: Some("ignored by canonical text".into()),
            status: None,
            priority: 50,
            assignee: None,
            due_date: None,
            project_id: None,
            blocked_by: None,
            tags: vec![],
        });
        assert_eq!(task.canonical_text(), "Ship search");
    }

    #[test]
    fn test_draft_defaults() {
        let fact: FactDraft = serde_json::from_str(r#"{"content": "x"}"#).unwrap();
        assert_eq!(fact.confidence, 1.0);
        assert!(fact.tags.is_empty());

        let task: TaskDraft = serde_json::from_str(r#"{"title": "t"}"#).unwrap();
        assert_eq!(task.priority, 50);
    }
}
