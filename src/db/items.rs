//! Queries for the typed memory items (facts, decisions, tasks, events,
//! projects) plus the kind-generic operations recall and decay rely on.

use pgvector::Vector;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    new_id, tags_json, Decision, DecisionDraft, Event, EventDraft, Fact, FactDraft, MemoryKind,
    Project, ProjectDraft, Task, TaskDraft,
};

use super::DbPool;

// ============================================================================
// Facts
// ============================================================================

pub async fn insert_fact(
    pool: &DbPool,
    agent_id: Uuid,
    draft: &FactDraft,
    embedding: Option<Vector>,
) -> Result<Fact> {
    let fact = sqlx::query_as::<_, Fact>(
        r#"
        INSERT INTO facts (id, agent_id, content, subject, confidence, source, tags, embedding, valid_until)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(agent_id)
    .bind(&draft.content)
    .bind(&draft.subject)
    .bind(draft.confidence.clamp(0.0, 1.0))
    .bind(&draft.source)
    .bind(tags_json(&draft.tags))
    .bind(embedding)
    .bind(draft.valid_until)
    .fetch_one(pool)
    .await?;

    Ok(fact)
}

pub async fn get_fact(pool: &DbPool, agent_id: Uuid, id: Uuid) -> Result<Fact> {
    sqlx::query_as::<_, Fact>("SELECT * FROM facts WHERE id = $1 AND agent_id = $2")
        .bind(id)
        .bind(agent_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Fact {}", id)))
}

pub async fn list_facts(pool: &DbPool, agent_id: Uuid, limit: i64) -> Result<Vec<Fact>> {
    let facts = sqlx::query_as::<_, Fact>(
        "SELECT * FROM facts WHERE agent_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(agent_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(facts)
}

/// Content changes re-embed; the caller supplies the new embedding when
/// content changed (None keeps the stored one).
pub async fn update_fact(
    pool: &DbPool,
    agent_id: Uuid,
    id: Uuid,
    content: Option<&str>,
    subject: Option<&str>,
    confidence: Option<f64>,
    tags: Option<&[String]>,
    superseded_by: Option<Uuid>,
    embedding: Option<Vector>,
) -> Result<Fact> {
    let fact = sqlx::query_as::<_, Fact>(
        r#"
        UPDATE facts
        SET content = COALESCE($3, content),
            subject = COALESCE($4, subject),
            confidence = COALESCE($5, confidence),
            tags = COALESCE($6, tags),
            superseded_by = COALESCE($7, superseded_by),
            embedding = COALESCE($8, embedding),
            updated_at = NOW()
        WHERE id = $1 AND agent_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(agent_id)
    .bind(content)
    .bind(subject)
    .bind(confidence)
    .bind(tags.map(tags_json))
    .bind(superseded_by)
    .bind(embedding)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Fact {}", id)))?;

    Ok(fact)
}

// ============================================================================
// Decisions
// ============================================================================

pub async fn insert_decision(
    pool: &DbPool,
    agent_id: Uuid,
    draft: &DecisionDraft,
    session_id: Option<Uuid>,
    embedding: Option<Vector>,
) -> Result<Decision> {
    let decision = sqlx::query_as::<_, Decision>(
        r#"
        INSERT INTO decisions (id, agent_id, title, decision, rationale, alternatives, context, session_id, tags, embedding)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(agent_id)
    .bind(&draft.title)
    .bind(&draft.decision)
    .bind(&draft.rationale)
    .bind(tags_json(&draft.alternatives))
    .bind(&draft.context)
    .bind(session_id)
    .bind(tags_json(&draft.tags))
    .bind(embedding)
    .fetch_one(pool)
    .await?;

    Ok(decision)
}

pub async fn get_decision(pool: &DbPool, agent_id: Uuid, id: Uuid) -> Result<Decision> {
    sqlx::query_as::<_, Decision>("SELECT * FROM decisions WHERE id = $1 AND agent_id = $2")
        .bind(id)
        .bind(agent_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Decision {}", id)))
}

pub async fn list_decisions(pool: &DbPool, agent_id: Uuid, limit: i64) -> Result<Vec<Decision>> {
    let decisions = sqlx::query_as::<_, Decision>(
        "SELECT * FROM decisions WHERE agent_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(agent_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(decisions)
}

// ============================================================================
// Tasks
// ============================================================================

pub async fn insert_task(
    pool: &DbPool,
    agent_id: Uuid,
    draft: &TaskDraft,
    embedding: Option<Vector>,
) -> Result<Task> {
    let task = sqlx::query_as::<_, Task>(
        r#"
        INSERT INTO tasks (id, agent_id, project_id, title, description, status, priority, assignee, due_date, blocked_by, tags, embedding)
        VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'not_started'), $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(agent_id)
    .bind(draft.project_id)
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(&draft.status)
    .bind(draft.priority.clamp(1, 100))
    .bind(&draft.assignee)
    .bind(draft.due_date)
    .bind(draft.blocked_by)
    .bind(tags_json(&draft.tags))
    .bind(embedding)
    .fetch_one(pool)
    .await?;

    Ok(task)
}

pub async fn get_task(pool: &DbPool, agent_id: Uuid, id: Uuid) -> Result<Task> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1 AND agent_id = $2")
        .bind(id)
        .bind(agent_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Task {}", id)))
}

pub async fn list_tasks(
    pool: &DbPool,
    agent_id: Uuid,
    status: Option<&str>,
    limit: i64,
) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(
        r#"
        SELECT * FROM tasks
        WHERE agent_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY priority DESC, created_at DESC
        LIMIT $3
        "#,
    )
    .bind(agent_id)
    .bind(status)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(tasks)
}

pub async fn update_task(
    pool: &DbPool,
    agent_id: Uuid,
    id: Uuid,
    title: Option<&str>,
    description: Option<&str>,
    status: Option<&str>,
    priority: Option<i32>,
    assignee: Option<&str>,
    embedding: Option<Vector>,
) -> Result<Task> {
    let task = sqlx::query_as::<_, Task>(
        r#"
        UPDATE tasks
        SET title = COALESCE($3, title),
            description = COALESCE($4, description),
            status = COALESCE($5, status),
            priority = COALESCE($6, priority),
            assignee = COALESCE($7, assignee),
            embedding = COALESCE($8, embedding),
            updated_at = NOW()
        WHERE id = $1 AND agent_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(agent_id)
    .bind(title)
    .bind(description)
    .bind(status)
    .bind(priority.map(|p| p.clamp(1, 100)))
    .bind(assignee)
    .bind(embedding)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Task {}", id)))?;

    Ok(task)
}

// ============================================================================
// Events
// ============================================================================

pub async fn insert_event(
    pool: &DbPool,
    agent_id: Uuid,
    draft: &EventDraft,
    embedding: Option<Vector>,
) -> Result<Event> {
    let event = sqlx::query_as::<_, Event>(
        r#"
        INSERT INTO events (id, agent_id, project_id, title, event_type, description, outcome, caused_by, severity, tags, embedding, occurred_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, 'info'), $10, $11, COALESCE($12, NOW()))
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(agent_id)
    .bind(draft.project_id)
    .bind(&draft.title)
    .bind(&draft.event_type)
    .bind(&draft.description)
    .bind(&draft.outcome)
    .bind(draft.caused_by)
    .bind(&draft.severity)
    .bind(tags_json(&draft.tags))
    .bind(embedding)
    .bind(draft.occurred_at)
    .fetch_one(pool)
    .await?;

    Ok(event)
}

pub async fn get_event(pool: &DbPool, agent_id: Uuid, id: Uuid) -> Result<Event> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 AND agent_id = $2")
        .bind(id)
        .bind(agent_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Event {}", id)))
}

pub async fn list_events(pool: &DbPool, agent_id: Uuid, limit: i64) -> Result<Vec<Event>> {
    let events = sqlx::query_as::<_, Event>(
        "SELECT * FROM events WHERE agent_id = $1 ORDER BY occurred_at DESC LIMIT $2",
    )
    .bind(agent_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(events)
}

// ============================================================================
// Projects
// ============================================================================

pub async fn insert_project(
    pool: &DbPool,
    agent_id: Uuid,
    slug: &str,
    draft: &ProjectDraft,
    embedding: Option<Vector>,
) -> Result<Project> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        INSERT INTO projects (id, agent_id, slug, name, description, status, tags, embedding, metadata)
        VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'active'), $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(agent_id)
    .bind(slug)
    .bind(&draft.name)
    .bind(&draft.description)
    .bind(&draft.status)
    .bind(tags_json(&draft.tags))
    .bind(embedding)
    .bind(if draft.metadata.is_null() {
        serde_json::json!({})
    } else {
        draft.metadata.clone()
    })
    .fetch_one(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::Conflict(format!("Project slug '{}' already exists", slug))
        }
        _ => e.into(),
    })?;

    Ok(project)
}

pub async fn get_project(pool: &DbPool, agent_id: Uuid, id: Uuid) -> Result<Project> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 AND agent_id = $2")
        .bind(id)
        .bind(agent_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Project {}", id)))
}

pub async fn list_projects(pool: &DbPool, agent_id: Uuid) -> Result<Vec<Project>> {
    let projects = sqlx::query_as::<_, Project>(
        "SELECT * FROM projects WHERE agent_id = $1 ORDER BY created_at DESC",
    )
    .bind(agent_id)
    .fetch_all(pool)
    .await?;
    Ok(projects)
}

pub async fn update_project(
    pool: &DbPool,
    agent_id: Uuid,
    id: Uuid,
    name: Option<&str>,
    description: Option<&str>,
    status: Option<&str>,
    metadata: Option<Value>,
) -> Result<Project> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        UPDATE projects
        SET name = COALESCE($3, name),
            description = COALESCE($4, description),
            status = COALESCE($5, status),
            metadata = COALESCE($6, metadata),
            updated_at = NOW()
        WHERE id = $1 AND agent_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(agent_id)
    .bind(name)
    .bind(description)
    .bind(status)
    .bind(metadata)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Project {}", id)))?;

    Ok(project)
}

// ============================================================================
// Kind-generic operations
// ============================================================================

/// Delete a row of any kind. 404 if absent.
pub async fn delete_item(pool: &DbPool, kind: MemoryKind, agent_id: Uuid, id: Uuid) -> Result<()> {
    let sql = format!(
        "DELETE FROM {} WHERE id = $1 AND agent_id = $2",
        kind.table()
    );
    let result = sqlx::query(&sql).bind(id).bind(agent_id).execute(pool).await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("{} {}", kind, id)));
    }

    Ok(())
}

/// Atomic access bump; failures are the caller's to swallow.
pub async fn touch_item(pool: &DbPool, kind: MemoryKind, id: Uuid) -> Result<()> {
    let sql = format!(
        "UPDATE {} SET access_count = access_count + 1, last_accessed_at = NOW() WHERE id = $1",
        kind.table()
    );
    sqlx::query(&sql).bind(id).execute(pool).await?;
    Ok(())
}

/// Move a cooling/archived item back to active, counting the revival as
/// an access.
pub async fn revive_item(pool: &DbPool, kind: MemoryKind, agent_id: Uuid, id: Uuid) -> Result<()> {
    let sql = format!(
        r#"
        UPDATE {} SET decay_status = 'active',
                      access_count = access_count + 1,
                      last_accessed_at = NOW()
        WHERE id = $1 AND agent_id = $2 AND decay_status <> 'active'
        "#,
        kind.table()
    );
    let result = sqlx::query(&sql).bind(id).bind(agent_id).execute(pool).await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("{} {} (not cooling/archived)", kind, id)));
    }

    Ok(())
}

/// Resolve a node table for graph endpoints. Sessions are addressable
/// as edge targets even though they are not a memory item kind.
pub fn node_table(type_str: &str) -> Option<&'static str> {
    match type_str {
        "session" => Some("sessions"),
        other => MemoryKind::from_str(other).map(|k| k.table()),
    }
}

/// Fetch a node as JSON (without its embedding) for graph views and
/// recall expansion. Returns None for dangling references.
pub async fn get_node_json(
    pool: &DbPool,
    type_str: &str,
    agent_id: Uuid,
    id: Uuid,
) -> Result<Option<Value>> {
    let Some(table) = node_table(type_str) else {
        return Err(Error::InvalidArgument(format!(
            "Unknown node type '{}'",
            type_str
        )));
    };

    let sql = format!(
        "SELECT to_jsonb(t) - 'embedding' FROM {} t WHERE id = $1 AND agent_id = $2",
        table
    );
    let node: Option<Value> = sqlx::query_scalar(&sql)
        .bind(id)
        .bind(agent_id)
        .fetch_optional(pool)
        .await?;

    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_table_mapping() {
        assert_eq!(node_table("fact"), Some("facts"));
        assert_eq!(node_table("session"), Some("sessions"));
        assert_eq!(node_table("project"), Some("projects"));
        assert_eq!(node_table("widget"), None);
    }
}
