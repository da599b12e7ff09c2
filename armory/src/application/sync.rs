// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Catalog Sync Engine
//!
//! Periodic reconciler that makes the vector store's tool catalog converge
//! toward the agent platform's registry. One cycle:
//!
//! 1. fetch the platform tool registry (paged) into a map by name;
//! 2. fetch the MCP server list, persist it, and note the active servers;
//! 3. list every MCP server's tools in parallel, tagging each with its
//!    origin server;
//! 4. register, in parallel, MCP tools the platform does not know yet;
//! 5. drop MCP tools whose origin server is missing or no longer active;
//! 6. persist the catalog cache;
//! 7. reconcile the vector store: delete obsolete objects, insert new ones,
//!    backfill missing origin servers on old MCP objects.
//!
//! Every step is idempotent: a failed cycle is recovered by the next one.
//! The scheduler runs cycles inline in its tick loop, so overlapping cycles
//! are structurally impossible; delayed ticks are skipped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::future::join_all;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::domain::{
    McpServerMap, ToolDescriptor, DEFAULT_SOURCE_TYPE, TOOL_TYPE_EXTERNAL_MCP,
};
use crate::infrastructure::{AgentPlatform, JsonFileCache, ToolIndex};

/// Upper bound used when listing the whole vector store collection.
const STORE_FETCH_LIMIT: usize = 10_000;

/// Counters from one completed sync cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncSummary {
    pub platform_tools: usize,
    pub active_servers: usize,
    pub discovered_mcp_tools: usize,
    pub registered: usize,
    pub registration_failed: usize,
    pub filtered_obsolete: usize,
    pub catalog_size: usize,
    pub store_deleted: usize,
    pub store_added: usize,
    pub store_backfilled: usize,
}

/// The reconciler: platform registry → caches → vector store.
pub struct SyncEngine {
    platform: Arc<dyn AgentPlatform>,
    index: Arc<dyn ToolIndex>,
    catalog: Arc<JsonFileCache<Vec<ToolDescriptor>>>,
    servers: Arc<JsonFileCache<McpServerMap>>,
}

impl SyncEngine {
    pub fn new(
        platform: Arc<dyn AgentPlatform>,
        index: Arc<dyn ToolIndex>,
        catalog: Arc<JsonFileCache<Vec<ToolDescriptor>>>,
        servers: Arc<JsonFileCache<McpServerMap>>,
    ) -> Self {
        Self { platform, index, catalog, servers }
    }

    /// Wipe the vector store collection and both cache files
    /// (clear-on-startup).
    pub async fn clear_all(&self) -> Result<()> {
        tracing::warn!("clearing vector store collection and cache files");
        self.index.drop_collection().await.context("dropping vector store collection")?;
        self.catalog.clear().await?;
        self.servers.clear().await?;
        Ok(())
    }

    /// Run one full synchronization cycle.
    pub async fn run_cycle(&self) -> Result<SyncSummary> {
        tracing::info!("starting tool synchronization cycle");
        let mut summary = SyncSummary::default();

        // 1. Platform registry, keyed by name.
        let platform_tools = self
            .platform
            .list_platform_tools()
            .await
            .context("fetching platform tool registry")?;
        if platform_tools.is_empty() {
            bail!("platform returned no tools, aborting sync cycle");
        }
        let mut tools_by_name: HashMap<String, ToolDescriptor> = HashMap::new();
        for mut tool in platform_tools {
            if tool.name.is_empty() {
                continue;
            }
            tool.normalize_ids();
            tools_by_name.insert(tool.name.clone(), tool);
        }
        summary.platform_tools = tools_by_name.len();
        tracing::info!(count = summary.platform_tools, "fetched platform tools");

        // 2. MCP server list; persisted before anything depends on it.
        let servers = self
            .platform
            .list_mcp_servers()
            .await
            .context("fetching MCP server list")?;
        summary.active_servers = servers.len();
        tracing::info!(count = servers.len(), "fetched MCP servers");
        if let Err(e) = self.servers.write(&servers).await {
            tracing::error!(error = %e, "failed to persist MCP server cache, continuing");
        }

        // 3. Per-server tool listings in parallel; a failing server only
        // loses its own listing.
        let listings = join_all(servers.keys().map(|server| async move {
            (server.clone(), self.platform.list_mcp_server_tools(server).await)
        }))
        .await;

        let mut to_register: Vec<ToolDescriptor> = Vec::new();
        for (server, listing) in listings {
            let tools = match listing {
                Ok(tools) => tools,
                Err(e) => {
                    tracing::error!(%server, error = %e, "failed to list MCP server tools, skipping server");
                    continue;
                }
            };
            tracing::info!(%server, count = tools.len(), "fetched MCP server tools");
            for mut tool in tools {
                if tool.name.is_empty() {
                    tracing::warn!(%server, "skipping MCP tool without a name");
                    continue;
                }
                summary.discovered_mcp_tools += 1;
                tool.mcp_server_name = Some(server.clone());
                if tool.tool_type.is_none() {
                    tool.tool_type = Some(TOOL_TYPE_EXTERNAL_MCP.to_string());
                }

                match tools_by_name.get_mut(&tool.name) {
                    Some(existing) => match &existing.mcp_server_name {
                        None => existing.mcp_server_name = Some(server.clone()),
                        Some(origin) if origin != &server => {
                            tracing::warn!(
                                tool = %tool.name,
                                first = %origin,
                                also = %server,
                                "tool listed by multiple MCP servers, keeping first origin"
                            );
                        }
                        Some(_) => {}
                    },
                    None => to_register.push(tool),
                }
            }
        }

        // 4. Parallel registration of unknown MCP tools. A success adopts the
        // platform-assigned id; a failure keeps the candidate discoverable
        // (it may still be filtered below if its server vanished).
        let registrations = join_all(to_register.into_iter().map(|candidate| async move {
            let server =
                candidate.mcp_server_name.clone().expect("candidates always carry an origin");
            let result = self.platform.register_mcp_tool(&server, &candidate.name).await;
            (candidate, server, result)
        }))
        .await;

        for (mut candidate, server, result) in registrations {
            match result {
                Ok(registered) if registered.canonical_id().is_some() => {
                    candidate.id = registered.canonical_id().map(str::to_owned);
                    candidate.normalize_ids();
                    summary.registered += 1;
                    tracing::info!(tool = %candidate.name, %server, id = ?candidate.id, "registered MCP tool");
                }
                Ok(_) => {
                    summary.registration_failed += 1;
                    tracing::warn!(tool = %candidate.name, %server, "registration response carried no id, keeping unregistered");
                }
                Err(e) => {
                    summary.registration_failed += 1;
                    tracing::warn!(tool = %candidate.name, %server, error = %e, "registration failed, keeping unregistered");
                }
            }
            if candidate.source_type.is_none() {
                candidate.source_type = Some(DEFAULT_SOURCE_TYPE.to_string());
            }
            tools_by_name.insert(candidate.name.clone(), candidate);
        }

        // 5. Obsolescence filter: an MCP tool without a live origin is gone.
        let before = tools_by_name.len();
        tools_by_name.retain(|name, tool| {
            if !tool.is_mcp() {
                return true;
            }
            match &tool.mcp_server_name {
                Some(origin) if servers.contains_key(origin) => true,
                Some(origin) => {
                    tracing::warn!(tool = %name, %origin, "dropping tool, its MCP server is no longer active");
                    false
                }
                None => {
                    tracing::warn!(tool = %name, "dropping MCP tool with no recorded origin server");
                    false
                }
            }
        });
        summary.filtered_obsolete = before - tools_by_name.len();
        summary.catalog_size = tools_by_name.len();

        // 6. Persist the catalog, sorted by name so unchanged content yields
        // byte-identical files.
        let mut catalog: Vec<ToolDescriptor> = tools_by_name.values().cloned().collect();
        catalog.sort_by(|a, b| a.name.cmp(&b.name));
        self.catalog.write(&catalog).await.context("persisting tool catalog cache")?;

        // 7. Vector store reconciliation.
        self.reconcile_store(&tools_by_name, &mut summary).await?;

        tracing::info!(?summary, "tool synchronization cycle completed");
        Ok(summary)
    }

    /// Make the store's membership equal the catalog's: delete names the
    /// catalog lost, insert names it gained, backfill origins on stale MCP
    /// objects.
    async fn reconcile_store(
        &self,
        catalog: &HashMap<String, ToolDescriptor>,
        summary: &mut SyncSummary,
    ) -> Result<()> {
        self.index.ensure_schema().await.context("ensuring vector store schema")?;

        let stored = self
            .index
            .fetch_all(STORE_FETCH_LIMIT)
            .await
            .context("listing vector store objects")?;
        tracing::info!(count = stored.len(), "fetched vector store objects");

        let mut obsolete_names: Vec<&str> = stored
            .iter()
            .map(|t| t.tool.name.as_str())
            .filter(|name| !catalog.contains_key(*name))
            .collect();
        obsolete_names.sort_unstable();
        obsolete_names.dedup();
        for name in obsolete_names {
            match self.index.delete_by_name(name).await {
                Ok(outcome) if outcome.failed > 0 => {
                    tracing::warn!(tool = %name, failed = outcome.failed, "some deletions of obsolete tool failed");
                }
                Ok(outcome) => {
                    summary.store_deleted += outcome.successful;
                    tracing::info!(tool = %name, removed = outcome.successful, "removed obsolete tool from store");
                }
                Err(e) => tracing::error!(tool = %name, error = %e, "failed to remove obsolete tool"),
            }
        }

        let stored_names: std::collections::HashSet<&str> =
            stored.iter().map(|t| t.tool.name.as_str()).collect();
        let mut new_tools: Vec<ToolDescriptor> = catalog
            .values()
            .filter(|tool| !stored_names.contains(tool.name.as_str()))
            .cloned()
            .collect();
        new_tools.sort_by(|a, b| a.name.cmp(&b.name));
        if !new_tools.is_empty() {
            let outcome = self
                .index
                .insert_objects(&new_tools)
                .await
                .context("batch-inserting new tools into the store")?;
            summary.store_added = outcome.successful;
            tracing::info!(
                added = outcome.successful,
                failed = outcome.failed,
                "inserted new tools into store"
            );
        }

        // Origin backfill for MCP objects written before the origin property
        // existed. Individual updates; the batch surface cannot patch.
        for indexed in &stored {
            let is_stale_mcp = indexed.tool.tool_type.as_deref() == Some(TOOL_TYPE_EXTERNAL_MCP)
                && indexed.tool.mcp_server_name.is_none();
            if !is_stale_mcp {
                continue;
            }
            let Some(origin) = catalog
                .get(&indexed.tool.name)
                .and_then(|t| t.mcp_server_name.as_deref())
            else {
                continue;
            };
            match self.index.update_server_name(&indexed.uuid, origin).await {
                Ok(()) => summary.store_backfilled += 1,
                Err(e) => {
                    tracing::error!(uuid = %indexed.uuid, error = %e, "failed to backfill origin server");
                }
            }
        }
        if summary.store_backfilled > 0 {
            tracing::info!(count = summary.store_backfilled, "backfilled origin servers");
        }
        Ok(())
    }
}

/// Timer wrapper around the engine. Cycles run inline in the tick loop, so
/// a tick either starts a cycle or is skipped; two cycles can never overlap.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    interval: Duration,
    shutdown_token: CancellationToken,
}

impl SyncScheduler {
    pub fn new(engine: Arc<SyncEngine>, interval: Duration) -> Self {
        Self { engine, interval, shutdown_token: CancellationToken::new() }
    }

    /// Handle used to stop the scheduler.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Spawn the scheduler loop. The first cycle runs one full interval
    /// after start; the startup sync is the caller's responsibility.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "starting sync scheduler");
        let mut tick =
            tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.engine.run_cycle().await {
                        Ok(summary) => tracing::info!(
                            catalog = summary.catalog_size,
                            added = summary.store_added,
                            deleted = summary.store_deleted,
                            "scheduled sync cycle completed"
                        ),
                        Err(e) => tracing::error!(error = %e, "scheduled sync cycle failed"),
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("shutdown signal received, stopping sync scheduler");
                    break;
                }
            }
        }
    }
}
