// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Per-item mutation outcomes and the reports the facade serializes.
//!
//! Batch mutations never fail as a whole: a batch of N calls yields N
//! outcomes, and one item's failure leaves every other outcome untouched.
//! These types are the serialized evidence of that contract.

use serde::Serialize;

/// A tool successfully attached, with the relevance score surfaced to the
/// caller (`100 × (1 − distance)`, or 100 when no distance was recorded).
#[derive(Debug, Clone, Serialize)]
pub struct SuccessfulAttachment {
    pub tool_id: String,
    pub name: String,
    pub match_score: f64,
}

/// A tool the engine tried to attach and could not.
#[derive(Debug, Clone, Serialize)]
pub struct FailedAttachment {
    pub tool_id: Option<String>,
    pub name: String,
    pub error: String,
}

/// A tool successfully detached.
#[derive(Debug, Clone, Serialize)]
pub struct DetachedTool {
    pub tool_id: String,
    pub name: String,
}

/// A tool the engine tried to detach and could not.
#[derive(Debug, Clone, Serialize)]
pub struct FailedDetachment {
    pub tool_id: String,
    pub name: String,
    pub error: String,
}

/// Combined result of one detach-then-attach pass over an agent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessOutcome {
    pub detached_tools: Vec<String>,
    pub failed_detachments: Vec<FailedDetachment>,
    pub successful_attachments: Vec<SuccessfulAttachment>,
    pub failed_attachments: Vec<FailedAttachment>,
}

/// Full result of an attach call, as returned by the facade under `details`.
#[derive(Debug, Clone, Serialize)]
pub struct AttachReport {
    pub detached_tools: Vec<String>,
    pub failed_detachments: Vec<FailedDetachment>,
    /// Candidates returned by the hybrid search.
    pub processed_count: usize,
    /// Candidates that resolved to an attachable platform id.
    pub passed_filter_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub successful_attachments: Vec<SuccessfulAttachment>,
    pub failed_attachments: Vec<FailedAttachment>,
    pub preserved_tools: Vec<String>,
    pub target_agent: String,
}

/// Full result of a prune call, as returned by the facade under `details`.
#[derive(Debug, Clone, Serialize)]
pub struct PruneReport {
    pub tools_on_agent_before_total: usize,
    pub mcp_tools_on_agent_before: usize,
    pub core_tools_preserved_count: usize,
    pub target_mcp_tools_to_keep_after_pruning: usize,
    pub relevant_library_tools_found_count: usize,
    pub final_mcp_tool_ids_kept_on_agent: Vec<String>,
    pub final_core_tool_ids_on_agent: Vec<String>,
    pub actual_total_tools_on_agent_after_pruning: usize,
    pub mcp_tools_detached_count: usize,
    pub mcp_tools_failed_detachment_count: usize,
    pub drop_rate_applied_to_mcp_tools: f64,
    pub explicitly_kept_tool_ids_from_request: Vec<String>,
    pub newly_matched_tool_ids_from_request: Vec<String>,
    pub successful_detachments_mcp: Vec<DetachedTool>,
    pub failed_detachments_mcp: Vec<FailedDetachment>,
}

impl PruneReport {
    /// Report for an agent with no MCP tools attached: nothing to prune,
    /// core tools untouched.
    pub fn nothing_to_prune(
        core_ids: Vec<String>,
        drop_rate: f64,
        keep: Vec<String>,
        newly: Vec<String>,
    ) -> Self {
        let core_count = core_ids.len();
        Self {
            tools_on_agent_before_total: core_count,
            mcp_tools_on_agent_before: 0,
            core_tools_preserved_count: core_count,
            target_mcp_tools_to_keep_after_pruning: 0,
            relevant_library_tools_found_count: 0,
            final_mcp_tool_ids_kept_on_agent: vec![],
            final_core_tool_ids_on_agent: core_ids,
            actual_total_tools_on_agent_after_pruning: core_count,
            mcp_tools_detached_count: 0,
            mcp_tools_failed_detachment_count: 0,
            drop_rate_applied_to_mcp_tools: drop_rate,
            explicitly_kept_tool_ids_from_request: keep,
            newly_matched_tool_ids_from_request: newly,
            successful_detachments_mcp: vec![],
            failed_detachments_mcp: vec![],
        }
    }
}
