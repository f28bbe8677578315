//! Typed memory item models: facts, decisions, tasks, events, projects.
//!
//! All items share the decay/access surface (decay_status, access_count,
//! last_accessed_at) and an optional embedding over their canonical text.

use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Decay lifecycle state shared by every memory item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecayStatus {
    #[default]
    Active,
    Cooling,
    Archived,
}

impl DecayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecayStatus::Active => "active",
            DecayStatus::Cooling => "cooling",
            DecayStatus::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(DecayStatus::Active),
            "cooling" => Some(DecayStatus::Cooling),
            "archived" => Some(DecayStatus::Archived),
            _ => None,
        }
    }
}

/// Task lifecycle status. Transitions are free among the variants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Blocked,
    Complete,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Complete => "complete",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(TaskStatus::NotStarted),
            "in_progress" => Some(TaskStatus::InProgress),
            "blocked" => Some(TaskStatus::Blocked),
            "complete" => Some(TaskStatus::Complete),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

/// Event severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Severity::Info),
            "warning" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// Project lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Paused,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Paused => "paused",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ProjectStatus::Active),
            "paused" => Some(ProjectStatus::Paused),
            "completed" => Some(ProjectStatus::Completed),
            "archived" => Some(ProjectStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Fact {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub content: String,
    pub subject: Option<String>,
    pub confidence: f64,
    pub source: Option<String>,
    pub tags: Value,
    #[serde(skip)]
    pub embedding: Option<Vector>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    /// Logically replaced by another fact but still retrievable by id.
    pub superseded_by: Option<Uuid>,
    pub decay_status: String,
    pub access_count: i32,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Decision {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub title: String,
    pub decision: String,
    pub rationale: Option<String>,
    pub alternatives: Value,
    pub context: Option<String>,
    pub session_id: Option<Uuid>,
    pub tags: Value,
    #[serde(skip)]
    pub embedding: Option<Vector>,
    pub decay_status: String,
    pub access_count: i32,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: i32,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub blocked_by: Option<Uuid>,
    pub tags: Value,
    #[serde(skip)]
    pub embedding: Option<Vector>,
    pub decay_status: String,
    pub access_count: i32,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub event_type: String,
    pub description: Option<String>,
    pub outcome: Option<String>,
    pub caused_by: Option<Uuid>,
    pub severity: String,
    pub tags: Value,
    #[serde(skip)]
    pub embedding: Option<Vector>,
    pub occurred_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub decay_status: String,
    pub access_count: i32,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub tags: Value,
    #[serde(skip)]
    pub embedding: Option<Vector>,
    pub metadata: Value,
    pub decay_status: String,
    pub access_count: i32,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_status_round_trip() {
        for s in [DecayStatus::Active, DecayStatus::Cooling, DecayStatus::Archived] {
            assert_eq!(DecayStatus::from_str(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_task_status_enum() {
        assert_eq!(TaskStatus::from_str("in_progress"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::from_str("done"), None);
        assert_eq!(TaskStatus::default().as_str(), "not_started");
    }

    #[test]
    fn test_severity_default() {
        assert_eq!(Severity::default().as_str(), "info");
    }
}
