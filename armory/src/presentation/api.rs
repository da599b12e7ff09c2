// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # HTTP Facade
//!
//! Thin axum surface over the engines: validates inputs, dispatches, and
//! serializes per-item outcomes. Engine semantics live one layer down; the
//! only logic here is input validation (400), engine-error mapping (500),
//! and health aggregation (200/503).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::application::{SyncEngine, ToolCurationService, ToolSearch};
use crate::domain::{McpServerMap, ToolDescriptor};
use crate::infrastructure::{JsonFileCache, ToolIndex};

const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Shared handles behind every request.
pub struct AppState {
    pub curation: Arc<ToolCurationService>,
    pub search: Arc<ToolSearch>,
    pub sync: Arc<SyncEngine>,
    pub index: Arc<dyn ToolIndex>,
    pub tool_cache: Arc<JsonFileCache<Vec<ToolDescriptor>>>,
    pub server_cache: Arc<JsonFileCache<McpServerMap>>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/tools/attach", post(attach_tools))
        .route("/api/v1/tools/prune", post(prune_tools))
        .route("/api/v1/tools/search", post(search_tools))
        .route("/api/v1/tools/sync", post(trigger_sync))
        .route("/api/v1/tools", get(get_tools))
        .route("/api/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// One readiness re-check per request before giving up on the store.
async fn index_ready(state: &AppState) -> bool {
    if state.index.ready().await {
        return true;
    }
    tracing::warn!("vector store not ready, re-checking once");
    state.index.ready().await
}

#[derive(Deserialize)]
struct AttachRequest {
    #[serde(default)]
    query: String,
    agent_id: Option<String>,
    limit: Option<usize>,
    #[serde(default)]
    keep_tools: Vec<String>,
}

async fn attach_tools(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AttachRequest>,
) -> impl IntoResponse {
    let Some(agent_id) = request.agent_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "agent_id is required" })));
    };

    if !index_ready(&state).await {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": "vector store not available after re-attempt" })),
        );
    }

    let limit = request.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    match state.curation.attach(&agent_id, &request.query, limit, &request.keep_tools).await {
        Ok(report) => {
            let message = format!(
                "Successfully processed {} candidates, attached {} tool(s) to agent {}",
                report.processed_count, report.success_count, agent_id
            );
            (
                StatusCode::OK,
                Json(json!({ "success": true, "message": message, "details": report })),
            )
        }
        Err(e) => {
            tracing::error!(%agent_id, error = ?e, "attach request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
        }
    }
}

#[derive(Deserialize)]
struct PruneRequest {
    agent_id: Option<String>,
    user_prompt: Option<String>,
    drop_rate: Option<f64>,
    #[serde(default)]
    keep_tool_ids: Vec<String>,
    #[serde(default)]
    newly_matched_tool_ids: Vec<String>,
}

async fn prune_tools(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PruneRequest>,
) -> impl IntoResponse {
    let Some(agent_id) = request.agent_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "agent_id is required" })));
    };
    let Some(user_prompt) = request.user_prompt.filter(|p| !p.is_empty()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "user_prompt is required" })));
    };
    let Some(drop_rate) = request.drop_rate.filter(|rate| (0.0..=1.0).contains(rate)) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "drop_rate must be a number between 0 and 1" })),
        );
    };

    match state
        .curation
        .prune(
            &agent_id,
            &user_prompt,
            drop_rate,
            &request.keep_tool_ids,
            &request.newly_matched_tool_ids,
        )
        .await
    {
        Ok(report) => {
            let message = format!(
                "Pruning completed for agent {agent_id}. Only MCP tools were considered for pruning."
            );
            (
                StatusCode::OK,
                Json(json!({ "success": true, "message": message, "details": report })),
            )
        }
        Err(e) => {
            tracing::error!(%agent_id, error = ?e, "prune request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
        }
    }
}

#[derive(Deserialize)]
struct SearchRequest {
    query: Option<String>,
    limit: Option<usize>,
}

async fn search_tools(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> impl IntoResponse {
    let Some(query) = request.query.filter(|q| !q.is_empty()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "query parameter is required" })));
    };

    if !index_ready(&state).await {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "vector store not available after re-attempt" })),
        );
    }

    match state.search.search_tools(&query, request.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)).await {
        Ok(results) => (StatusCode::OK, Json(json!(results))),
        Err(e) => {
            tracing::error!(error = ?e, "search request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("internal server error: {e}") })),
            )
        }
    }
}

async fn trigger_sync(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.sync.run_cycle().await {
        Ok(summary) => {
            tracing::info!(catalog = summary.catalog_size, "manual sync completed");
            (StatusCode::OK, Json(json!({ "message": "Sync process completed successfully." })))
        }
        Err(e) => {
            tracing::error!(error = ?e, "manual sync failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("internal server error during sync: {e}") })),
            )
        }
    }
}

async fn get_tools(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tools = state.tool_cache.read(false).await;
    tracing::info!(count = tools.len(), "serving tool catalog from cache");
    (StatusCode::OK, Json(json!(tools)))
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_ok = state.index.ready().await;
    let store_status = json!({
        "status": if store_ok { "OK" } else { "ERROR" },
        "message": if store_ok { "Connected and ready" } else { "Not connected or not ready" },
    });

    let mirror = state.tool_cache.mirror_status().await;
    let tool_cache_ok = mirror.loaded;
    let tool_cache_status = json!({
        "status": if tool_cache_ok { "OK" } else { "Error: cache not loaded in memory" },
        "size": state.tool_cache.mirror().await.map(|tools| tools.len()).unwrap_or(0),
        "last_loaded": mirror
            .last_loaded
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "Never".to_string()),
        "source_file_path": state.tool_cache.path().display().to_string(),
    });

    let (server_cache_ok, server_cache_status) = match state.server_cache.probe_file().await {
        Ok(size) => (
            true,
            json!({
                "status": "OK",
                "size_on_disk": size,
                "path": state.server_cache.path().display().to_string(),
            }),
        ),
        Err(e) => (
            false,
            json!({
                "status": format!("Error reading file: {e}"),
                "size_on_disk": "N/A",
                "path": state.server_cache.path().display().to_string(),
            }),
        ),
    };

    let overall = if store_ok && tool_cache_ok && server_cache_ok {
        "OK"
    } else if store_ok {
        "DEGRADED"
    } else {
        "ERROR"
    };

    let payload = json!({
        "status": overall,
        "details": {
            "vector_store": store_status,
            "tool_cache_in_memory": tool_cache_status,
            "mcp_servers_cache_file": server_cache_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    let code = if overall == "OK" { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(payload))
}
