//! Direct CRUD for the typed memory items.
//!
//! POST runs dedup first and returns 409 with the existing id on a
//! match (projects skip dedup). GET by id bumps access accounting.
//!
//! Routes, per type:
//! - POST /{facts,decisions,tasks,events,projects}
//! - GET /{...}?agent_id=
//! - GET /{...}/:id?agent_id=
//! - PUT /{...}/:id
//! - DELETE /{...}/:id?agent_id=

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::middleware::AuthContext;
use crate::models::{
    Decision, DecisionDraft, Event, EventDraft, Fact, FactDraft, ItemDraft, MemoryKind, Project,
    ProjectDraft, Severity, Task, TaskDraft, TaskStatus,
};
use crate::{db, AppState, Error, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/facts", get(list_facts).post(create_fact))
        .route(
            "/facts/:id",
            get(get_fact).put(update_fact).delete(delete_fact),
        )
        .route("/decisions", get(list_decisions).post(create_decision))
        .route(
            "/decisions/:id",
            get(get_decision).put(update_decision).delete(delete_decision),
        )
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
}

#[derive(Debug, Deserialize)]
struct AgentQuery {
    agent_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    limit: Option<i64>,
}

/// Resolve the acting agent from the query string or the key scope.
async fn resolve_agent(
    state: &AppState,
    auth: &AuthContext,
    agent_id: &Option<String>,
) -> Result<Uuid> {
    let agent_id = match agent_id {
        Some(id_or_slug) => state.resolve_agent_id(id_or_slug).await?,
        None => auth
            .agent_id
            .ok_or_else(|| Error::InvalidArgument("agent_id is required".into()))?,
    };
    auth.check_agent(agent_id)?;
    Ok(agent_id)
}

fn list_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(100).clamp(1, 1000)
}

async fn touch(state: &AppState, kind: MemoryKind, id: Uuid) {
    if let Err(e) = db::touch_item(&state.db, kind, id).await {
        debug!(error = %e, id = %id, "Access bump failed");
    }
}

// ============================================================================
// Facts
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateFactRequest {
    agent_id: String,
    #[serde(flatten)]
    draft: FactDraft,
}

#[derive(Debug, Deserialize)]
struct UpdateFactRequest {
    agent_id: Option<String>,
    content: Option<String>,
    subject: Option<String>,
    confidence: Option<f64>,
    tags: Option<Vec<String>>,
    superseded_by: Option<Uuid>,
}

async fn create_fact(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateFactRequest>,
) -> Result<(StatusCode, Json<Fact>)> {
    auth.require("write")?;

    if request.draft.content.trim().is_empty() {
        return Err(Error::InvalidArgument("content is required".into()));
    }

    let agent_id = state.resolve_agent_id(&request.agent_id).await?;
    auth.check_agent(agent_id)?;

    let id = state
        .ingest
        .direct_store(agent_id, ItemDraft::Fact(request.draft))
        .await?;
    let fact = db::get_fact(&state.db, agent_id, id).await?;

    Ok((StatusCode::CREATED, Json(fact)))
}

async fn list_facts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AgentQuery>,
) -> Result<Json<Vec<Fact>>> {
    let agent_id = resolve_agent(&state, &auth, &query.agent_id).await?;
    let facts = db::list_facts(&state.db, agent_id, list_limit(query.limit)).await?;
    Ok(Json(facts))
}

async fn get_fact(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<AgentQuery>,
) -> Result<Json<Fact>> {
    let agent_id = resolve_agent(&state, &auth, &query.agent_id).await?;
    let fact = db::get_fact(&state.db, agent_id, id).await?;
    touch(&state, MemoryKind::Fact, id).await;
    Ok(Json(fact))
}

async fn update_fact(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateFactRequest>,
) -> Result<Json<Fact>> {
    auth.require("write")?;
    let agent_id = resolve_agent(&state, &auth, &request.agent_id).await?;

    // Mutated content re-embeds.
    let embedding = match &request.content {
        Some(content) if state.embedder.is_available() => state
            .embedder
            .embed(content)
            .await
            .ok()
            .map(Vector::from),
        _ => None,
    };

    let fact = db::update_fact(
        &state.db,
        agent_id,
        id,
        request.content.as_deref(),
        request.subject.as_deref(),
        request.confidence,
        request.tags.as_deref(),
        request.superseded_by,
        embedding,
    )
    .await?;

    Ok(Json(fact))
}

async fn delete_fact(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<AgentQuery>,
) -> Result<StatusCode> {
    auth.require("write")?;
    let agent_id = resolve_agent(&state, &auth, &query.agent_id).await?;
    db::delete_item(&state.db, MemoryKind::Fact, agent_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Decisions
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateDecisionRequest {
    agent_id: String,
    session_id: Option<Uuid>,
    #[serde(flatten)]
    draft: DecisionDraft,
}

/// The decision body is append-only; only annotations may change.
#[derive(Debug, Deserialize)]
struct UpdateDecisionRequest {
    agent_id: Option<String>,
    rationale: Option<String>,
    context: Option<String>,
    tags: Option<Vec<String>>,
}

async fn create_decision(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateDecisionRequest>,
) -> Result<(StatusCode, Json<Decision>)> {
    auth.require("write")?;

    if request.draft.title.trim().is_empty() || request.draft.decision.trim().is_empty() {
        return Err(Error::InvalidArgument("title and decision are required".into()));
    }

    let agent_id = state.resolve_agent_id(&request.agent_id).await?;
    auth.check_agent(agent_id)?;

    let id = state
        .ingest
        .direct_store_linked(agent_id, ItemDraft::Decision(request.draft), request.session_id)
        .await?;
    let decision = db::get_decision(&state.db, agent_id, id).await?;

    Ok((StatusCode::CREATED, Json(decision)))
}

async fn list_decisions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AgentQuery>,
) -> Result<Json<Vec<Decision>>> {
    let agent_id = resolve_agent(&state, &auth, &query.agent_id).await?;
    let decisions = db::list_decisions(&state.db, agent_id, list_limit(query.limit)).await?;
    Ok(Json(decisions))
}

async fn get_decision(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<AgentQuery>,
) -> Result<Json<Decision>> {
    let agent_id = resolve_agent(&state, &auth, &query.agent_id).await?;
    let decision = db::get_decision(&state.db, agent_id, id).await?;
    touch(&state, MemoryKind::Decision, id).await;
    Ok(Json(decision))
}

async fn update_decision(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDecisionRequest>,
) -> Result<Json<Decision>> {
    auth.require("write")?;
    let agent_id = resolve_agent(&state, &auth, &request.agent_id).await?;

    let decision = sqlx::query_as::<_, Decision>(
        r#"
        UPDATE decisions
        SET rationale = COALESCE($3, rationale),
            context = COALESCE($4, context),
            tags = COALESCE($5, tags),
            updated_at = NOW()
        WHERE id = $1 AND agent_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(agent_id)
    .bind(&request.rationale)
    .bind(&request.context)
    .bind(request.tags.as_deref().map(crate::models::tags_json))
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Decision {}", id)))?;

    Ok(Json(decision))
}

async fn delete_decision(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<AgentQuery>,
) -> Result<StatusCode> {
    auth.require("write")?;
    let agent_id = resolve_agent(&state, &auth, &query.agent_id).await?;
    db::delete_item(&state.db, MemoryKind::Decision, agent_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateTaskRequest {
    agent_id: String,
    #[serde(flatten)]
    draft: TaskDraft,
}

#[derive(Debug, Deserialize)]
struct UpdateTaskRequest {
    agent_id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    status: Option<String>,
    priority: Option<i32>,
    assignee: Option<String>,
}

async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>)> {
    auth.require("write")?;

    if request.draft.title.trim().is_empty() {
        return Err(Error::InvalidArgument("title is required".into()));
    }
    if let Some(status) = &request.draft.status {
        if TaskStatus::from_str(status).is_none() {
            return Err(Error::InvalidArgument(format!("Invalid task status '{}'", status)));
        }
    }

    let agent_id = state.resolve_agent_id(&request.agent_id).await?;
    auth.check_agent(agent_id)?;

    let id = state
        .ingest
        .direct_store(agent_id, ItemDraft::Task(request.draft))
        .await?;
    let task = db::get_task(&state.db, agent_id, id).await?;

    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AgentQuery>,
) -> Result<Json<Vec<Task>>> {
    let agent_id = resolve_agent(&state, &auth, &query.agent_id).await?;
    let tasks = db::list_tasks(
        &state.db,
        agent_id,
        query.status.as_deref(),
        list_limit(query.limit),
    )
    .await?;
    Ok(Json(tasks))
}

async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<AgentQuery>,
) -> Result<Json<Task>> {
    let agent_id = resolve_agent(&state, &auth, &query.agent_id).await?;
    let task = db::get_task(&state.db, agent_id, id).await?;
    touch(&state, MemoryKind::Task, id).await;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<Task>> {
    auth.require("write")?;
    let agent_id = resolve_agent(&state, &auth, &request.agent_id).await?;

    if let Some(status) = &request.status {
        if TaskStatus::from_str(status).is_none() {
            return Err(Error::InvalidArgument(format!("Invalid task status '{}'", status)));
        }
    }
    if let Some(priority) = request.priority {
        if !(1..=100).contains(&priority) {
            return Err(Error::InvalidArgument("priority must be in 1..=100".into()));
        }
    }

    let embedding = match &request.title {
        Some(title) if state.embedder.is_available() => {
            state.embedder.embed(title).await.ok().map(Vector::from)
        }
        _ => None,
    };

    let task = db::update_task(
        &state.db,
        agent_id,
        id,
        request.title.as_deref(),
        request.description.as_deref(),
        request.status.as_deref(),
        request.priority,
        request.assignee.as_deref(),
        embedding,
    )
    .await?;

    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<AgentQuery>,
) -> Result<StatusCode> {
    auth.require("write")?;
    let agent_id = resolve_agent(&state, &auth, &query.agent_id).await?;
    db::delete_item(&state.db, MemoryKind::Task, agent_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateEventRequest {
    agent_id: String,
    #[serde(flatten)]
    draft: EventDraft,
}

#[derive(Debug, Deserialize)]
struct UpdateEventRequest {
    agent_id: Option<String>,
    description: Option<String>,
    outcome: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
}

async fn create_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>)> {
    auth.require("write")?;

    if request.draft.title.trim().is_empty() || request.draft.event_type.trim().is_empty() {
        return Err(Error::InvalidArgument("title and event_type are required".into()));
    }
    if let Some(severity) = &request.draft.severity {
        if Severity::from_str(severity).is_none() {
            return Err(Error::InvalidArgument(format!("Invalid severity '{}'", severity)));
        }
    }

    let agent_id = state.resolve_agent_id(&request.agent_id).await?;
    auth.check_agent(agent_id)?;

    let id = state
        .ingest
        .direct_store(agent_id, ItemDraft::Event(request.draft))
        .await?;
    let event = db::get_event(&state.db, agent_id, id).await?;

    Ok((StatusCode::CREATED, Json(event)))
}

async fn list_events(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AgentQuery>,
) -> Result<Json<Vec<Event>>> {
    let agent_id = resolve_agent(&state, &auth, &query.agent_id).await?;
    let events = db::list_events(&state.db, agent_id, list_limit(query.limit)).await?;
    Ok(Json(events))
}

async fn get_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<AgentQuery>,
) -> Result<Json<Event>> {
    let agent_id = resolve_agent(&state, &auth, &query.agent_id).await?;
    let event = db::get_event(&state.db, agent_id, id).await?;
    touch(&state, MemoryKind::Event, id).await;
    Ok(Json(event))
}

async fn update_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateEventRequest>,
) -> Result<Json<Event>> {
    auth.require("write")?;
    let agent_id = resolve_agent(&state, &auth, &request.agent_id).await?;

    let event = sqlx::query_as::<_, Event>(
        r#"
        UPDATE events
        SET description = COALESCE($3, description),
            outcome = COALESCE($4, outcome),
            resolved_at = COALESCE($5, resolved_at),
            updated_at = NOW()
        WHERE id = $1 AND agent_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(agent_id)
    .bind(&request.description)
    .bind(&request.outcome)
    .bind(request.resolved_at)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Event {}", id)))?;

    Ok(Json(event))
}

async fn delete_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<AgentQuery>,
) -> Result<StatusCode> {
    auth.require("write")?;
    let agent_id = resolve_agent(&state, &auth, &query.agent_id).await?;
    db::delete_item(&state.db, MemoryKind::Event, agent_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Projects
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateProjectRequest {
    agent_id: String,
    #[serde(flatten)]
    draft: ProjectDraft,
}

#[derive(Debug, Deserialize)]
struct UpdateProjectRequest {
    agent_id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    status: Option<String>,
    metadata: Option<Value>,
}

async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>)> {
    auth.require("write")?;

    if request.draft.name.trim().is_empty() {
        return Err(Error::InvalidArgument("name is required".into()));
    }
    if let Some(status) = &request.draft.status {
        if crate::models::ProjectStatus::from_str(status).is_none() {
            return Err(Error::InvalidArgument(format!("Invalid project status '{}'", status)));
        }
    }

    let agent_id = state.resolve_agent_id(&request.agent_id).await?;
    auth.check_agent(agent_id)?;

    let project = state.ingest.store_project(agent_id, request.draft).await?;

    Ok((StatusCode::CREATED, Json(project)))
}

async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AgentQuery>,
) -> Result<Json<Vec<Project>>> {
    let agent_id = resolve_agent(&state, &auth, &query.agent_id).await?;
    let projects = db::list_projects(&state.db, agent_id).await?;
    Ok(Json(projects))
}

async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<AgentQuery>,
) -> Result<Json<Project>> {
    let agent_id = resolve_agent(&state, &auth, &query.agent_id).await?;
    let project = db::get_project(&state.db, agent_id, id).await?;
    touch(&state, MemoryKind::Project, id).await;
    Ok(Json(project))
}

async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProjectRequest>,
) -> Result<Json<Project>> {
    auth.require("write")?;
    let agent_id = resolve_agent(&state, &auth, &request.agent_id).await?;

    if let Some(status) = &request.status {
        if crate::models::ProjectStatus::from_str(status).is_none() {
            return Err(Error::InvalidArgument(format!("Invalid project status '{}'", status)));
        }
    }

    let project = db::update_project(
        &state.db,
        agent_id,
        id,
        request.name.as_deref(),
        request.description.as_deref(),
        request.status.as_deref(),
        request.metadata,
    )
    .await?;

    Ok(Json(project))
}

async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<AgentQuery>,
) -> Result<StatusCode> {
    auth.require("write")?;
    let agent_id = resolve_agent(&state, &auth, &query.agent_id).await?;
    db::delete_item(&state.db, MemoryKind::Project, agent_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
