// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Facade tests: input validation, response shapes, and health aggregation.

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use aegis_armory::application::{SyncEngine, ToolCurationService, ToolSearch};
use aegis_armory::infrastructure::{EmbeddingClient, JsonFileCache, ToolIndex};
use aegis_armory::presentation::{app, AppState};

use support::{core_tool, hit, mcp_tool, MemoryToolIndex, MockPlatform};

struct Fixture {
    router: Router,
    platform: Arc<MockPlatform>,
    index: Arc<MemoryToolIndex>,
    tool_cache: Arc<JsonFileCache<Vec<aegis_armory::domain::ToolDescriptor>>>,
    server_cache: Arc<JsonFileCache<aegis_armory::domain::McpServerMap>>,
    _cache_dir: TempDir,
}

fn fixture() -> Fixture {
    let platform = Arc::new(MockPlatform::new(vec![core_tool("c1", "core_memory_append")]));
    let index = Arc::new(MemoryToolIndex::new());

    let cache_dir = TempDir::new().unwrap();
    let tool_cache = Arc::new(JsonFileCache::new(cache_dir.path().join("tool_cache.json")));
    let server_cache =
        Arc::new(JsonFileCache::new(cache_dir.path().join("mcp_servers_cache.json")));

    let search = Arc::new(ToolSearch::new(
        index.clone() as Arc<dyn ToolIndex>,
        EmbeddingClient::new(None),
    ));
    let curation = Arc::new(ToolCurationService::new(
        platform.clone(),
        search.clone(),
        tool_cache.clone(),
        0.1,
    ));
    let sync = Arc::new(SyncEngine::new(
        platform.clone(),
        index.clone(),
        tool_cache.clone(),
        server_cache.clone(),
    ));

    let state = Arc::new(AppState {
        curation,
        search,
        sync,
        index: index.clone(),
        tool_cache: tool_cache.clone(),
        server_cache: server_cache.clone(),
    });
    Fixture {
        router: app(state),
        platform,
        index,
        tool_cache,
        server_cache,
        _cache_dir: cache_dir,
    }
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn attach_without_agent_id_is_a_400() {
    let fx = fixture();
    let (status, body) =
        post_json(&fx.router, "/api/v1/tools/attach", json!({ "query": "send email" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "agent_id is required");
}

#[tokio::test]
async fn attach_fails_fast_when_the_store_stays_unready() {
    let fx = fixture();
    fx.index.is_ready.store(false, Ordering::SeqCst);
    let (status, body) = post_json(
        &fx.router,
        "/api/v1/tools/attach",
        json!({ "query": "send email", "agent_id": "agent-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn attach_returns_per_item_details() {
    let fx = fixture();
    fx.tool_cache.write(&vec![mcp_tool("t1", "alpha_tool", Some("s1"))]).await.unwrap();
    *fx.index.hits.lock().unwrap() = vec![hit(mcp_tool("t1", "alpha_tool", Some("s1")), 0.9)];

    let (status, body) = post_json(
        &fx.router,
        "/api/v1/tools/attach",
        json!({ "query": "alpha", "agent_id": "agent-1", "limit": 3 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["details"]["target_agent"], "agent-1");
    assert_eq!(body["details"]["success_count"], 1);
    assert_eq!(body["details"]["successful_attachments"][0]["tool_id"], "t1");
    assert!(body["message"].as_str().unwrap().contains("attached 1 tool(s)"));
    assert!(fx.platform.attached_ids.lock().unwrap().contains(&"t1".to_string()));
}

#[tokio::test]
async fn prune_validates_its_inputs() {
    let fx = fixture();

    let (status, body) = post_json(
        &fx.router,
        "/api/v1/tools/prune",
        json!({ "agent_id": "agent-1", "drop_rate": 0.5 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "user_prompt is required");

    let (status, body) = post_json(
        &fx.router,
        "/api/v1/tools/prune",
        json!({ "agent_id": "agent-1", "user_prompt": "p", "drop_rate": 1.5 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "drop_rate must be a number between 0 and 1");

    let (status, _) = post_json(
        &fx.router,
        "/api/v1/tools/prune",
        json!({ "user_prompt": "p", "drop_rate": 0.5 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn prune_reports_the_full_detail_block() {
    let fx = fixture();
    fx.platform
        .agent_tools
        .lock()
        .unwrap()
        .extend([mcp_tool("m1", "tool_1", Some("s1")), mcp_tool("m2", "tool_2", Some("s1"))]);

    let (status, body) = post_json(
        &fx.router,
        "/api/v1/tools/prune",
        json!({ "agent_id": "agent-1", "user_prompt": "prompt", "drop_rate": 1.0 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let details = &body["details"];
    assert_eq!(details["mcp_tools_on_agent_before"], 2);
    assert_eq!(details["target_mcp_tools_to_keep_after_pruning"], 0);
    assert_eq!(details["mcp_tools_detached_count"], 2);
    assert_eq!(details["core_tools_preserved_count"], 1);
    assert_eq!(details["drop_rate_applied_to_mcp_tools"], 1.0);
}

#[tokio::test]
async fn search_requires_a_query() {
    let fx = fixture();
    let (status, body) = post_json(&fx.router, "/api/v1/tools/search", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "query parameter is required");
}

#[tokio::test]
async fn search_returns_scored_descriptors() {
    let fx = fixture();
    *fx.index.hits.lock().unwrap() = vec![hit(mcp_tool("t1", "alpha_tool", Some("s1")), 0.8)];

    let (status, body) =
        post_json(&fx.router, "/api/v1/tools/search", json!({ "query": "alpha", "limit": 5 })).await;

    assert_eq!(status, StatusCode::OK);
    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["name"], "alpha_tool");
    assert!((results[0]["distance"].as_f64().unwrap() - 0.2).abs() < 1e-9);
}

#[tokio::test]
async fn get_tools_serves_the_catalog_cache() {
    let fx = fixture();
    fx.tool_cache
        .write(&vec![
            mcp_tool("t1", "alpha_tool", Some("s1")),
            mcp_tool("t2", "beta_tool", Some("s1")),
        ])
        .await
        .unwrap();

    let (status, body) = get_json(&fx.router, "/api/v1/tools").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn manual_sync_runs_a_cycle() {
    let fx = fixture();
    fx.platform
        .registry
        .lock()
        .unwrap()
        .insert("core_a".into(), core_tool("ca", "core_a"));

    let (status, body) = post_json(&fx.router, "/api/v1/tools/sync", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Sync process completed successfully.");
    assert_eq!(fx.index.object_names().len(), 1);
}

#[tokio::test]
async fn manual_sync_surfaces_cycle_failure() {
    let fx = fixture();
    let (status, body) = post_json(&fx.router, "/api/v1/tools/sync", json!({})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("sync"));
}

#[tokio::test]
async fn health_is_ok_when_every_subsystem_passes() {
    let fx = fixture();
    fx.tool_cache.write(&vec![mcp_tool("t1", "alpha_tool", Some("s1"))]).await.unwrap();
    fx.server_cache.write(&Default::default()).await.unwrap();
    fx.tool_cache.read(true).await;

    let (status, body) = get_json(&fx.router, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["details"]["tool_cache_in_memory"]["size"], 1);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn health_degrades_when_only_the_store_passes() {
    let fx = fixture();
    let (status, body) = get_json(&fx.router, "/api/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "DEGRADED");
}

#[tokio::test]
async fn health_errors_when_the_store_is_down() {
    let fx = fixture();
    fx.index.is_ready.store(false, Ordering::SeqCst);
    let (status, body) = get_json(&fx.router, "/api/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "ERROR");
    assert_eq!(body["details"]["vector_store"]["status"], "ERROR");
}
