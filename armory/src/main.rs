// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Service entrypoint: wire the shared clients and caches, run the startup
//! sync, start the sync scheduler, and serve the HTTP facade until
//! interrupted.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use aegis_armory::application::{SyncEngine, SyncScheduler, ToolCurationService, ToolSearch};
use aegis_armory::config::ArmoryConfig;
use aegis_armory::infrastructure::{
    EmbeddingClient, HttpAgentPlatform, JsonFileCache, ToolIndex, WeaviateToolIndex,
};
use aegis_armory::presentation::{app, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ArmoryConfig::from_env().context("loading configuration")?;
    info!(
        platform = %config.platform_url,
        vector = %format!("{}:{}", config.vector_http_host, config.vector_http_port),
        cache_dir = %config.cache_dir.display(),
        sync_interval_secs = config.sync_interval.as_secs(),
        default_drop_rate = config.default_drop_rate,
        "starting aegis-armory"
    );

    // Process-wide singletons: one pooled platform client, one vector store
    // handle, two shared caches. All initialized up front, before the facade
    // accepts its first request.
    let platform = Arc::new(HttpAgentPlatform::new(
        config.platform_url.clone(),
        config.platform_secret.clone(),
    ));
    let index = Arc::new(WeaviateToolIndex::new(
        &config.vector_http_host,
        config.vector_http_port,
        &config.vector_grpc_host,
        config.vector_grpc_port,
        config.embedding_api_key.clone(),
    ));
    let tool_cache = Arc::new(JsonFileCache::new(config.tool_cache_path()));
    let server_cache = Arc::new(JsonFileCache::new(config.mcp_servers_cache_path()));

    if !index.ready().await {
        warn!("vector store is not ready at startup, continuing degraded");
    }

    let search = Arc::new(ToolSearch::new(
        index.clone() as Arc<dyn aegis_armory::infrastructure::ToolIndex>,
        EmbeddingClient::new(config.embedding_api_key.clone()),
    ));
    let curation = Arc::new(ToolCurationService::new(
        platform.clone(),
        search.clone(),
        tool_cache.clone(),
        config.default_drop_rate,
    ));
    let sync = Arc::new(SyncEngine::new(
        platform.clone(),
        index.clone(),
        tool_cache.clone(),
        server_cache.clone(),
    ));

    if config.clear_on_startup {
        warn!("clear-on-startup requested");
        if let Err(e) = sync.clear_all().await {
            error!(error = ?e, "clear-on-startup failed, continuing with existing state");
        }
    }

    info!("performing initial sync before accepting requests");
    match sync.run_cycle().await {
        Ok(summary) => info!(catalog = summary.catalog_size, "initial sync completed"),
        Err(e) => error!(error = ?e, "initial sync failed, serving with possibly stale caches"),
    }

    // Warm the in-memory mirrors so the first requests and the health
    // endpoint see loaded caches.
    tool_cache.read(true).await;
    server_cache.read(true).await;

    let scheduler = Arc::new(SyncScheduler::new(sync.clone(), config.sync_interval));
    let shutdown_token = scheduler.shutdown_token();
    let scheduler_handle = scheduler.start();

    let state = Arc::new(AppState {
        curation,
        search,
        sync,
        index: index.clone(),
        tool_cache,
        server_cache,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "HTTP facade listening");

    let shutdown = shutdown_token.clone();
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("interrupt received, shutting down");
            shutdown.cancel();
        })
        .await
        .context("serving HTTP facade")?;

    shutdown_token.cancel();
    let _ = scheduler_handle.await;
    info!("aegis-armory stopped");
    Ok(())
}
