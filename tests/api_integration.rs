//! End-to-end API tests against a real Postgres instance.
//!
//! These tests run only when HEXMEM_TEST_DATABASE_URL points at a
//! database with the vector and pg_trgm extensions available; without
//! it each test exits early. No embedding or LLM provider is
//! configured, so they also exercise the lexical-only degradation
//! paths.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower::util::ServiceExt;
use uuid::Uuid;

use hexmem::config::{EmbeddingConfig, LlmConfig};
use hexmem::services::{
    AnalyticsService, DecayEngine, DedupService, Embedder, Extractor, IngestService, LlmService,
    RecallService, Summarizer,
};
use hexmem::{api, db, AppState};

const DEV_KEY: &str = "hm_test_dev_key";

fn ensure_env() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        std::env::set_var("HEXMEM_DEV_API_KEY", DEV_KEY);
    });
}

async fn test_app() -> Option<(AppState, Router)> {
    ensure_env();

    let url = std::env::var("HEXMEM_TEST_DATABASE_URL").ok()?;
    let pool = db::init_pool(&url, 5).await.expect("connect test database");
    db::migrate(&pool).await.expect("apply migrations");

    let embedding_config = EmbeddingConfig {
        provider: None,
        base_url: None,
        model: "text-embedding-3-small".into(),
        api_key: None,
        dimension: 768,
    };
    let llm_config = LlmConfig {
        provider: None,
        base_url: None,
        model: "gpt-4o-mini".into(),
        api_key: None,
    };

    let embedder = Embedder::new(&embedding_config).unwrap();
    let llm = LlmService::new(&llm_config).unwrap();
    let extractor = Extractor::new(llm.clone(), false);
    let summarizer = Summarizer::new(llm);
    let dedup = DedupService::new(pool.clone(), embedder.clone());
    let ingest = IngestService::new(pool.clone(), embedder.clone(), extractor, dedup);
    let recall = RecallService::new(pool.clone(), embedder.clone());
    let decay = DecayEngine::new(pool.clone());
    let analytics = AnalyticsService::new(pool.clone());

    let state = AppState {
        db: pool,
        embedder,
        ingest,
        recall,
        decay,
        summarizer,
        analytics,
        slug_cache: Arc::new(RwLock::new(HashMap::new())),
    };

    let router = Router::new()
        .merge(api::routes(state.clone()))
        .with_state(state.clone());

    Some((state, router))
}

fn unique_slug(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

async fn request(router: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("Authorization", format!("Bearer {}", DEV_KEY));

    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, value)
}

async fn create_agent(router: &Router, slug: &str) -> Value {
    let (status, body) = request(
        router,
        "POST",
        "/api/v1/agents",
        Some(json!({ "slug": slug, "display_name": "Test Agent" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "agent create failed: {}", body);
    body
}

#[tokio::test]
async fn test_health_is_public() {
    let Some((_, router)) = test_app().await else { return };

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_token_is_401() {
    let Some((_, router)) = test_app().await else { return };

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/agents")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_agent_round_trip_by_slug_and_uuid() {
    let Some((_, router)) = test_app().await else { return };

    let slug = unique_slug("agent-rt");
    let created = create_agent(&router, &slug).await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, by_slug) = request(&router, "GET", &format!("/api/v1/agents/{}", slug), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, by_uuid) = request(&router, "GET", &format!("/api/v1/agents/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(by_slug["id"], by_uuid["id"]);
    assert!(by_slug["counts"]["facts"].is_number());
}

#[tokio::test]
async fn test_invalid_slug_rejected_valid_accepted() {
    let Some((_, router)) = test_app().await else { return };

    let (status, _) = request(
        &router,
        "POST",
        "/api/v1/agents",
        Some(json!({ "slug": "abc!", "display_name": "Bad" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // a-b_c is valid; suffix keeps it unique across runs
    let slug = format!("a-b_c{}", &Uuid::new_v4().simple().to_string()[..8]);
    let (status, _) = request(
        &router,
        "POST",
        "/api/v1/agents",
        Some(json!({ "slug": slug, "display_name": "Good" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_duplicate_slug_is_409() {
    let Some((_, router)) = test_app().await else { return };

    let slug = unique_slug("agent-dup");
    create_agent(&router, &slug).await;

    let (status, body) = request(
        &router,
        "POST",
        "/api/v1/agents",
        Some(json!({ "slug": slug, "display_name": "Again" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_core_memory_merge_patch_null_strips() {
    let Some((_, router)) = test_app().await else { return };

    let slug = unique_slug("agent-core");
    let created = create_agent(&router, &slug).await;
    let id = created["id"].as_str().unwrap();

    let path = format!("/api/v1/agents/{}/core-memory", id);
    let (status, _) = request(
        &router,
        "PATCH",
        &path,
        Some(json!({ "keep": 1, "drop": 2, "nested": { "a": true } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(
        &router,
        "PATCH",
        &path,
        Some(json!({ "drop": null, "nested": { "b": false } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["core_memory"]["keep"], json!(1));
    assert!(body["core_memory"].get("drop").is_none());
    assert_eq!(body["core_memory"]["nested"], json!({ "a": true, "b": false }));
}

#[tokio::test]
async fn test_fact_dedup_on_direct_post() {
    let Some((_, router)) = test_app().await else { return };

    let slug = unique_slug("agent-dedup");
    create_agent(&router, &slug).await;

    let content = format!(
        "TypeScript is the primary language used in project {}",
        &slug
    );

    let (status, first) = request(
        &router,
        "POST",
        "/api/v1/facts",
        Some(json!({ "agent_id": slug, "content": content })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let first_id = first["id"].as_str().unwrap();

    let (status, dup) = request(
        &router,
        "POST",
        "/api/v1/facts",
        Some(json!({ "agent_id": slug, "content": content })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(dup["existing_id"].as_str().unwrap(), first_id);
    assert!(dup["similarity"].as_f64().unwrap() >= 0.6);
}

#[tokio::test]
async fn test_fact_crud_round_trip() {
    let Some((_, router)) = test_app().await else { return };

    let slug = unique_slug("agent-crud");
    create_agent(&router, &slug).await;

    let (status, fact) = request(
        &router,
        "POST",
        "/api/v1/facts",
        Some(json!({ "agent_id": slug, "content": format!("fact for {}", slug) })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = fact["id"].as_str().unwrap().to_string();

    let get_path = format!("/api/v1/facts/{}?agent_id={}", id, slug);
    let (status, _) = request(&router, "GET", &get_path, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, updated) = request(
        &router,
        "PUT",
        &format!("/api/v1/facts/{}", id),
        Some(json!({ "agent_id": slug, "subject": "testing" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["subject"], json!("testing"));

    let (status, _) = request(&router, "DELETE", &get_path, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = request(&router, "GET", &get_path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_ingest_and_end() {
    let Some((_, router)) = test_app().await else { return };

    let slug = unique_slug("agent-sess");
    create_agent(&router, &slug).await;

    let (status, session) = request(
        &router,
        "POST",
        "/api/v1/sessions",
        Some(json!({ "agent_id": slug })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = session["id"].as_str().unwrap().to_string();

    // Ingestion hot path; with the extractor disabled counts are zero
    // but the message persists.
    let msg_path = format!("/api/v1/sessions/{}/messages", session_id);
    for i in 0..3 {
        let (status, body) = request(
            &router,
            "POST",
            &msg_path,
            Some(json!({ "role": "user", "content": format!("message {}", i) })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert!(body["message"]["id"].is_string());
        assert_eq!(body["extracted"]["facts"], json!(0));
    }

    let (status, body) =
        request(&router, "GET", &format!("/api/v1/sessions/{}", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message_count"], json!(3));

    // Unknown role is a 400
    let (status, _) = request(
        &router,
        "POST",
        &msg_path,
        Some(json!({ "role": "robot", "content": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // End, then re-end rejects
    let end_path = format!("/api/v1/sessions/{}/end", session_id);
    let (status, ended) = request(&router, "POST", &end_path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(ended["ended_at"].is_string());

    let (status, _) = request(&router, "POST", &end_path, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Messages on an ended session are rejected
    let (status, _) = request(
        &router,
        "POST",
        &msg_path,
        Some(json!({ "role": "user", "content": "too late" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recall_weights_echo_and_type_filter() {
    let Some((_, router)) = test_app().await else { return };

    let slug = unique_slug("agent-recall");
    create_agent(&router, &slug).await;

    let (status, _) = request(
        &router,
        "POST",
        "/api/v1/facts",
        Some(json!({ "agent_id": slug, "content": "Fastify powers the gateway service" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = request(
        &router,
        "POST",
        "/api/v1/tasks",
        Some(json!({ "agent_id": slug, "title": "Benchmark Fastify gateway" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Weights echo
    let (status, body) = request(
        &router,
        "POST",
        "/api/v1/recall",
        Some(json!({
            "query": "Fastify",
            "agent_id": slug,
            "semantic_weight": 0.3,
            "keyword_weight": 0.6,
            "recency_weight": 0.1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["weights"], json!({ "semantic": 0.3, "keyword": 0.6, "recency": 0.1 }));
    assert_eq!(body["total"].as_u64().unwrap() as usize, body["results"].as_array().unwrap().len());

    // No embedder: every result must come from the lexical arm only
    for result in body["results"].as_array().unwrap() {
        assert!(result["signals"].get("semantic").is_none());
        assert!(result["signals"]["keyword"].is_number());
    }

    // Type filter
    let (status, body) = request(
        &router,
        "POST",
        "/api/v1/recall",
        Some(json!({ "query": "Fastify", "agent_id": slug, "types": ["fact"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert!(!results.is_empty());
    for result in results {
        assert_eq!(result["type"], json!("fact"));
    }
}

#[tokio::test]
async fn test_recall_missing_agent_is_400() {
    let Some((_, router)) = test_app().await else { return };

    let (status, _) = request(
        &router,
        "POST",
        "/api/v1/recall",
        Some(json!({ "query": "anything" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_without_embedder_is_503() {
    let Some((_, router)) = test_app().await else { return };

    let slug = unique_slug("agent-search");
    create_agent(&router, &slug).await;

    let (status, _) = request(
        &router,
        "POST",
        "/api/v1/search",
        Some(json!({ "query": "anything", "agent_id": slug })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_edge_upsert_and_graph_view() {
    let Some((_, router)) = test_app().await else { return };

    let slug = unique_slug("agent-edges");
    create_agent(&router, &slug).await;

    let (_, fact) = request(
        &router,
        "POST",
        "/api/v1/facts",
        Some(json!({ "agent_id": slug, "content": format!("edge source fact {}", slug) })),
    )
    .await;
    let fact_id = fact["id"].as_str().unwrap().to_string();

    let (_, decision) = request(
        &router,
        "POST",
        "/api/v1/decisions",
        Some(json!({
            "agent_id": slug,
            "title": "Edge target",
            "decision": format!("decision for {}", slug),
        })),
    )
    .await;
    let decision_id = decision["id"].as_str().unwrap().to_string();

    let edge_body = |weight: f64| {
        json!({
            "agent_id": slug,
            "source_type": "fact",
            "source_id": fact_id,
            "target_type": "decision",
            "target_id": decision_id,
            "relation": "relates_to",
            "weight": weight,
        })
    };

    let (status, first) = request(&router, "POST", "/api/v1/edges", Some(edge_body(0.9))).await;
    assert_eq!(status, StatusCode::CREATED);
    let edge_id = first["id"].as_str().unwrap().to_string();
    assert_eq!(first["weight"], json!(0.9));

    // Same tuple upserts: same id, new weight
    let (status, second) = request(&router, "POST", "/api/v1/edges", Some(edge_body(1.0))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["id"].as_str().unwrap(), edge_id);
    assert_eq!(second["weight"], json!(1.0));

    // Second outgoing edge, then the node view counts both
    let (_, task) = request(
        &router,
        "POST",
        "/api/v1/tasks",
        Some(json!({ "agent_id": slug, "title": format!("edge task {}", slug) })),
    )
    .await;
    let task_id = task["id"].as_str().unwrap();

    let (status, _) = request(
        &router,
        "POST",
        "/api/v1/edges",
        Some(json!({
            "agent_id": slug,
            "source_type": "fact",
            "source_id": fact_id,
            "target_type": "task",
            "target_id": task_id,
            "relation": "led_to",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, graph) = request(
        &router,
        "GET",
        &format!("/api/v1/edges/graph/fact/{}?agent_id={}", fact_id, slug),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(graph["total"].as_u64().unwrap() >= 2);
    assert_eq!(graph["outgoing"].as_array().unwrap().len(), 2);

    // Delete, then delete again 404s
    let del_path = format!("/api/v1/edges/{}?agent_id={}", edge_id, slug);
    let (status, _) = request(&router, "DELETE", &del_path, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = request(&router, "DELETE", &del_path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recall_expands_related_neighbors() {
    let Some((_, router)) = test_app().await else { return };

    let slug = unique_slug("agent-expand");
    create_agent(&router, &slug).await;

    let marker = format!("zxqv-{}", &slug[slug.len() - 6..]);
    let (_, fact) = request(
        &router,
        "POST",
        "/api/v1/facts",
        Some(json!({ "agent_id": slug, "content": format!("unique marker {}", marker) })),
    )
    .await;
    let fact_id = fact["id"].as_str().unwrap().to_string();

    let (_, task) = request(
        &router,
        "POST",
        "/api/v1/tasks",
        Some(json!({ "agent_id": slug, "title": format!("neighbor task {}", slug) })),
    )
    .await;
    let task_id = task["id"].as_str().unwrap();

    let (status, _) = request(
        &router,
        "POST",
        "/api/v1/edges",
        Some(json!({
            "agent_id": slug,
            "source_type": "fact",
            "source_id": fact_id,
            "target_type": "task",
            "target_id": task_id,
            "relation": "led_to",
            "weight": 0.8,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = request(
        &router,
        "POST",
        "/api/v1/recall",
        Some(json!({ "query": marker, "agent_id": slug, "include_related": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let results = body["results"].as_array().unwrap();
    let parent = results
        .iter()
        .find(|r| r["id"].as_str() == Some(fact_id.as_str()))
        .expect("marker fact should be recalled");

    let related = parent["related"].as_array().expect("related present");
    assert_eq!(related.len(), 1);
    assert_eq!(related[0]["id"].as_str().unwrap(), task_id);
    assert_eq!(related[0]["score"], json!(0.8));
    assert_eq!(related[0]["signals"]["graph_boost"], json!(0.8));
    assert_eq!(related[0]["metadata"]["relation"], json!("led_to"));
    assert_eq!(related[0]["metadata"]["direction"], json!("outgoing"));
}

#[tokio::test]
async fn test_decay_sweep_on_fresh_data_is_noop() {
    let Some((_, router)) = test_app().await else { return };

    let slug = unique_slug("agent-decay");
    create_agent(&router, &slug).await;

    let (status, _) = request(
        &router,
        "POST",
        "/api/v1/facts",
        Some(json!({ "agent_id": slug, "content": format!("fresh fact {}", slug) })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, stats) = request(
        &router,
        "POST",
        "/api/v1/decay/sweep",
        Some(json!({ "agent_id": slug })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["transitioned_to_cooling"], json!(0));
    assert_eq!(stats["transitioned_to_archived"], json!(0));

    let (status, body) = request(
        &router,
        "GET",
        &format!("/api/v1/decay/status?agent_id={}", slug),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tables"]["facts"]["active"], json!(1));
    assert!(body["policies"].as_array().unwrap().len() >= 5);
}

#[tokio::test]
async fn test_analytics_log_receives_recall_queries() {
    let Some((_, router)) = test_app().await else { return };

    let slug = unique_slug("agent-metrics");
    create_agent(&router, &slug).await;

    let (status, _) = request(
        &router,
        "POST",
        "/api/v1/recall",
        Some(json!({ "query": "anything at all", "agent_id": slug })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(&router, "GET", "/api/v1/analytics/queries", None).await;
    assert_eq!(status, StatusCode::OK);
    let summary = body["summary"].as_array().unwrap();
    assert!(summary.iter().any(|s| s["endpoint"] == json!("/api/v1/recall")));
}

#[tokio::test]
async fn test_api_key_lifecycle() {
    let Some((_, router)) = test_app().await else { return };

    let (status, created) = request(
        &router,
        "POST",
        "/api/v1/keys",
        Some(json!({ "name": "ci key", "permissions": ["read"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let raw_key = created["key"].as_str().unwrap().to_string();
    let key_id = created["id"].as_str().unwrap().to_string();
    assert!(raw_key.starts_with("hm_"));

    // The created key authenticates reads but not writes
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/agents")
                .header("Authorization", format!("Bearer {}", raw_key))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/agents")
                .header("Authorization", format!("Bearer {}", raw_key))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "slug": unique_slug("denied"), "display_name": "x" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Revoke, then the key stops working
    let (status, _) = request(&router, "DELETE", &format!("/api/v1/keys/{}", key_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/agents")
                .header("Authorization", format!("Bearer {}", raw_key))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
