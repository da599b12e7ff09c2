// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tool Curation Service — attach & prune
//!
//! The policy core of the armory. Given a prompt and an agent, `attach`
//! resolves the most relevant catalog tools to attachable platform ids,
//! swaps them in for less relevant incumbents, and chains into `prune` to
//! hold the agent's MCP tool count under the configured drop rate.
//!
//! ## Invariants
//!
//! - Core tools (any `tool_type` other than `external_mcp`) are never
//!   detached, by either operation.
//! - Batch mutations are isolated per item: one failed detach/attach never
//!   aborts or alters the outcome of the others.
//! - Within one attach call, every detach completes (success or failure)
//!   before the first attach is issued; chained pruning starts only after
//!   the attachments return.
//! - Must-keep ids (caller's keep list ∪ newly attached) survive pruning in
//!   normal operation. When they alone would saturate the target, pruning
//!   switches to an aggressive target of `max(1, ⌊0.8·N⌋)` so the call
//!   still makes progress.
//!
//! Neither operation holds local state between calls; concurrent calls for
//! different agents are safe, and concurrent calls for the same agent are
//! deliberately not serialized (last write wins at the platform).

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;

use crate::application::search::{ScoredTool, ToolSearch};
use crate::domain::{
    AttachReport, AttachedTools, DetachedTool, FailedAttachment, FailedDetachment, ProcessOutcome,
    PruneReport, SuccessfulAttachment, ToolDescriptor, ToolSource, TOOL_TYPE_EXTERNAL_MCP,
};
use crate::infrastructure::{AgentPlatform, JsonFileCache};

/// A search candidate resolved to an attachable platform descriptor.
#[derive(Debug, Clone)]
struct ResolvedCandidate {
    tool: ToolDescriptor,
    distance: Option<f64>,
}

impl ResolvedCandidate {
    fn match_score(&self) -> f64 {
        match self.distance {
            Some(distance) => 100.0 * (1.0 - distance),
            None => 100.0,
        }
    }
}

/// Attach/prune engine over the platform client, the vector search service,
/// and the read-only catalog cache.
pub struct ToolCurationService {
    platform: Arc<dyn AgentPlatform>,
    search: Arc<ToolSearch>,
    catalog: Arc<JsonFileCache<Vec<ToolDescriptor>>>,
    default_drop_rate: f64,
}

impl ToolCurationService {
    pub fn new(
        platform: Arc<dyn AgentPlatform>,
        search: Arc<ToolSearch>,
        catalog: Arc<JsonFileCache<Vec<ToolDescriptor>>>,
        default_drop_rate: f64,
    ) -> Self {
        Self { platform, search, catalog, default_drop_rate }
    }

    /// Find tools relevant to `query`, attach them to the agent, detach
    /// stale MCP incumbents, then prune under the default drop rate.
    ///
    /// Fails only when the initial agent state cannot be fetched; everything
    /// past that point is reported per item.
    pub async fn attach(
        &self,
        agent_id: &str,
        query: &str,
        limit: usize,
        keep_tools: &[String],
    ) -> Result<AttachReport> {
        let (agent, current_tools) = tokio::try_join!(
            async {
                self.platform
                    .get_agent(agent_id)
                    .await
                    .with_context(|| format!("fetching agent {agent_id}"))
            },
            async {
                self.platform
                    .list_agent_tools(agent_id)
                    .await
                    .with_context(|| format!("fetching tools of agent {agent_id}"))
            },
        )?;

        let attached = AttachedTools::partition(current_tools);
        tracing::info!(
            agent = %agent.name,
            agent_id,
            mcp_count = attached.mcp.len(),
            core_count = attached.core.len(),
            "curating agent tool-set"
        );

        let candidates = self
            .search
            .search_tools(query, limit)
            .await
            .context("hybrid search for attach candidates")?;
        let processed_count = candidates.len();
        tracing::info!(query, candidates = processed_count, "search returned attach candidates");

        let resolved = self.resolve_candidates(candidates).await;
        let passed_filter_count = resolved.len();

        let outcome = self.process_tools(agent_id, &attached, &resolved, keep_tools).await;

        // Chained pruning is best-effort: its failure never fails the attach.
        if !query.is_empty() && !outcome.successful_attachments.is_empty() {
            let newly: Vec<String> =
                outcome.successful_attachments.iter().map(|a| a.tool_id.clone()).collect();
            match self
                .prune(agent_id, query, self.default_drop_rate, keep_tools, &newly)
                .await
            {
                Ok(report) => tracing::info!(
                    detached = report.mcp_tools_detached_count,
                    "post-attach pruning completed"
                ),
                Err(e) => tracing::error!(error = %e, "post-attach pruning failed"),
            }
        } else {
            tracing::info!("skipping post-attach pruning (no query or no successful attachments)");
        }

        Ok(AttachReport {
            detached_tools: outcome.detached_tools,
            failed_detachments: outcome.failed_detachments,
            processed_count,
            passed_filter_count,
            success_count: outcome.successful_attachments.len(),
            failure_count: outcome.failed_attachments.len(),
            successful_attachments: outcome.successful_attachments,
            failed_attachments: outcome.failed_attachments,
            preserved_tools: keep_tools.to_vec(),
            target_agent: agent_id.to_string(),
        })
    }

    /// Resolve search hits through the catalog cache; register cache misses
    /// that carry an MCP origin; drop the rest. Resolution runs in parallel
    /// per candidate, and a failed registration only loses that candidate.
    async fn resolve_candidates(&self, candidates: Vec<ScoredTool>) -> Vec<ResolvedCandidate> {
        let catalog = self.catalog.read(false).await;

        let tasks = candidates.into_iter().map(|candidate| {
            let catalog = &catalog;
            async move {
                let name = candidate.tool.name.clone();
                let cached = catalog
                    .iter()
                    .find(|entry| entry.name == name && entry.canonical_id().is_some());

                if let Some(entry) = cached {
                    let mut tool = entry.clone();
                    tool.normalize_ids();
                    return Some(ResolvedCandidate { tool, distance: Some(candidate.distance) });
                }

                match candidate.tool.source() {
                    ToolSource::Mcp { server } => {
                        tracing::info!(tool = %name, server, "candidate missing from catalog, registering");
                        match self.platform.register_mcp_tool(server, &name).await {
                            Ok(mut registered) => {
                                if registered.canonical_id().is_none() {
                                    registered.id =
                                        Some(ToolDescriptor::synthetic_id(server, &name));
                                }
                                registered.normalize_ids();
                                if registered.mcp_server_name.is_none() {
                                    registered.mcp_server_name = Some(server.to_string());
                                }
                                Some(ResolvedCandidate {
                                    tool: registered,
                                    distance: Some(candidate.distance),
                                })
                            }
                            Err(e) => {
                                tracing::error!(tool = %name, server, error = %e, "registration failed, dropping candidate");
                                None
                            }
                        }
                    }
                    ToolSource::Native => {
                        tracing::warn!(tool = %name, "candidate has no id and no MCP origin, dropping");
                        None
                    }
                }
            }
        });

        join_all(tasks).await.into_iter().flatten().collect()
    }

    /// Detach stale MCP incumbents, then attach the resolved candidates.
    /// Detachments all return before the first attach is issued.
    async fn process_tools(
        &self,
        agent_id: &str,
        attached: &AttachedTools,
        resolved: &[ResolvedCandidate],
        keep_tools: &[String],
    ) -> ProcessOutcome {
        let mut keep_ids: HashSet<String> =
            keep_tools.iter().filter(|id| !id.is_empty()).cloned().collect();
        for candidate in resolved {
            if let Some(id) = candidate.tool.canonical_id() {
                keep_ids.insert(id.to_string());
            }
        }

        let to_detach: Vec<(String, String)> = attached
            .mcp
            .iter()
            .filter_map(|tool| {
                let id = tool.canonical_id()?;
                (!keep_ids.contains(id)).then(|| (id.to_string(), tool.name.clone()))
            })
            .collect();
        tracing::info!(
            agent_id,
            detach = to_detach.len(),
            attach = resolved.len(),
            keep = keep_ids.len(),
            "processing tool mutations"
        );

        let (detached, failed_detachments) = self.detach_batch(agent_id, &to_detach).await;

        let attach_tasks = resolved.iter().map(|candidate| async move {
            let tool_id = candidate
                .tool
                .canonical_id()
                .expect("resolved candidates always carry an id")
                .to_string();
            let name = candidate.tool.name.clone();
            match self.platform.attach_tool(agent_id, &tool_id).await {
                Ok(()) => Ok(SuccessfulAttachment {
                    tool_id,
                    name,
                    match_score: candidate.match_score(),
                }),
                Err(e) => {
                    tracing::error!(%tool_id, error = %e, "failed to attach tool");
                    Err(FailedAttachment { tool_id: Some(tool_id), name, error: e.to_string() })
                }
            }
        });

        let mut successful_attachments = Vec::new();
        let mut failed_attachments = Vec::new();
        for result in join_all(attach_tasks).await {
            match result {
                Ok(success) => successful_attachments.push(success),
                Err(failure) => failed_attachments.push(failure),
            }
        }

        ProcessOutcome {
            detached_tools: detached.into_iter().map(|d| d.tool_id).collect(),
            failed_detachments,
            successful_attachments,
            failed_attachments,
        }
    }

    /// Prune the agent's MCP tools down toward `⌊N·(1−drop_rate)⌋`, keeping
    /// the must-keep set and the most relevant incumbents. Core tools are
    /// never touched.
    pub async fn prune(
        &self,
        agent_id: &str,
        user_prompt: &str,
        drop_rate: f64,
        keep_tool_ids: &[String],
        newly_matched_tool_ids: &[String],
    ) -> Result<PruneReport> {
        tracing::info!(
            agent_id,
            user_prompt,
            drop_rate,
            keep = keep_tool_ids.len(),
            newly = newly_matched_tool_ids.len(),
            "pruning agent tools"
        );

        let current = self
            .platform
            .list_agent_tools(agent_id)
            .await
            .with_context(|| format!("fetching tools of agent {agent_id}"))?;
        let attached = AttachedTools::partition(current);
        let mcp_ids = attached.mcp_ids();
        let mut core_ids: Vec<String> = attached.core_ids().into_iter().collect();
        core_ids.sort();

        let n_mcp = mcp_ids.len();
        if n_mcp == 0 {
            tracing::info!(agent_id, "no MCP tools attached, nothing to prune");
            return Ok(PruneReport::nothing_to_prune(
                core_ids,
                drop_rate,
                keep_tool_ids.to_vec(),
                newly_matched_tool_ids.to_vec(),
            ));
        }

        let target = target_keep_count(n_mcp, drop_rate);
        tracing::info!(n_mcp, target, "computed MCP keep target");

        // Relevance ordering for the whole library; dedup keeps the first
        // (highest ranked) occurrence of each id.
        let search_limit = (target + 50).max(100);
        let library = self
            .search
            .search_tools(user_prompt, search_limit)
            .await
            .context("hybrid search for prune ranking")?;
        let mut ranked: Vec<(String, String, Option<String>)> = Vec::new();
        let mut ranked_seen: HashSet<String> = HashSet::new();
        for hit in &library {
            if let Some(id) = hit.tool.canonical_id() {
                if ranked_seen.insert(id.to_string()) {
                    ranked.push((id.to_string(), hit.tool.name.clone(), hit.tool.tool_type.clone()));
                }
            }
        }

        // Must-keep seed: newly attached first, then the caller's keep list,
        // both restricted to tools actually on the agent.
        let mut keep: HashSet<String> = HashSet::new();
        for id in newly_matched_tool_ids.iter().chain(keep_tool_ids) {
            if mcp_ids.contains(id) {
                keep.insert(id.clone());
            }
        }

        if keep.len() >= target {
            // The must-keep set alone saturates the target; enforce progress
            // with the aggressive target instead of a no-op.
            let aggressive = aggressive_target(n_mcp);
            tracing::info!(
                must_keep = keep.len(),
                target,
                aggressive,
                "must-keep set saturates the target, applying aggressive pruning"
            );
            if keep.len() > aggressive {
                let mut prioritized: HashSet<String> = HashSet::new();
                for id in newly_matched_tool_ids {
                    if mcp_ids.contains(id) && prioritized.len() < aggressive {
                        prioritized.insert(id.clone());
                    }
                }
                for (id, _, tool_type) in &ranked {
                    if prioritized.len() >= aggressive {
                        break;
                    }
                    if tool_type.as_deref() == Some(TOOL_TYPE_EXTERNAL_MCP)
                        && keep.contains(id)
                        && !prioritized.contains(id)
                    {
                        prioritized.insert(id.clone());
                    }
                }
                keep = prioritized;
            }
        } else {
            // Fill the remaining slots with the most relevant incumbents.
            let mut slots = target - keep.len();
            for (id, _, tool_type) in &ranked {
                if slots == 0 {
                    break;
                }
                if tool_type.as_deref() == Some(TOOL_TYPE_EXTERNAL_MCP)
                    && mcp_ids.contains(id)
                    && keep.insert(id.clone())
                {
                    slots -= 1;
                }
            }
        }
        tracing::info!(kept = keep.len(), "final MCP keep set decided");

        let name_of = |id: &str| {
            attached
                .mcp
                .iter()
                .find(|t| t.canonical_id() == Some(id))
                .map(|t| t.name.clone())
                .unwrap_or_else(|| "Unknown".to_string())
        };
        let to_detach: Vec<(String, String)> = mcp_ids
            .iter()
            .filter(|id| !keep.contains(*id))
            .map(|id| (id.clone(), name_of(id)))
            .collect();

        let (successful, failed) = self.detach_batch(agent_id, &to_detach).await;
        tracing::info!(
            detached = successful.len(),
            failed = failed.len(),
            "prune detachments finished"
        );

        let mut kept_ids: Vec<String> = keep.into_iter().collect();
        kept_ids.sort();

        Ok(PruneReport {
            tools_on_agent_before_total: n_mcp + core_ids.len(),
            mcp_tools_on_agent_before: n_mcp,
            core_tools_preserved_count: core_ids.len(),
            target_mcp_tools_to_keep_after_pruning: target,
            relevant_library_tools_found_count: ranked.len(),
            actual_total_tools_on_agent_after_pruning: kept_ids.len() + core_ids.len(),
            final_mcp_tool_ids_kept_on_agent: kept_ids,
            final_core_tool_ids_on_agent: core_ids,
            mcp_tools_detached_count: successful.len(),
            mcp_tools_failed_detachment_count: failed.len(),
            drop_rate_applied_to_mcp_tools: drop_rate,
            explicitly_kept_tool_ids_from_request: keep_tool_ids.to_vec(),
            newly_matched_tool_ids_from_request: newly_matched_tool_ids.to_vec(),
            successful_detachments_mcp: successful,
            failed_detachments_mcp: failed,
        })
    }

    /// Detach a batch in parallel with per-item outcomes. Nothing in here
    /// can fail the batch: timeouts and API errors become per-item failures.
    async fn detach_batch(
        &self,
        agent_id: &str,
        tools: &[(String, String)],
    ) -> (Vec<DetachedTool>, Vec<FailedDetachment>) {
        let tasks = tools.iter().map(|(tool_id, name)| async move {
            match self.platform.detach_tool(agent_id, tool_id).await {
                Ok(ack) => {
                    if ack.already_detached {
                        tracing::warn!(%tool_id, "tool was already detached");
                    }
                    Ok(DetachedTool { tool_id: tool_id.clone(), name: name.clone() })
                }
                Err(e) => {
                    tracing::error!(%tool_id, error = %e, "failed to detach tool");
                    Err(FailedDetachment {
                        tool_id: tool_id.clone(),
                        name: name.clone(),
                        error: e.to_string(),
                    })
                }
            }
        });

        let mut successful = Vec::new();
        let mut failed = Vec::new();
        for result in join_all(tasks).await {
            match result {
                Ok(ok) => successful.push(ok),
                Err(err) => failed.push(err),
            }
        }
        (successful, failed)
    }
}

/// `⌊N·(1−drop_rate)⌋`, the number of MCP tools pruning aims to keep.
fn target_keep_count(n_mcp: usize, drop_rate: f64) -> usize {
    ((n_mcp as f64) * (1.0 - drop_rate)).floor().max(0.0) as usize
}

/// `max(1, ⌊0.8·N⌋)`, the fallback target when must-keeps saturate.
fn aggressive_target(n_mcp: usize) -> usize {
    (((n_mcp as f64) * 0.8).floor() as usize).max(1)
}
