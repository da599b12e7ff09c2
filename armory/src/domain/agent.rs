// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent-side projections of the armory.
//!
//! The armory never owns agent state. It observes an agent through two
//! projections — its summary and its currently attached tools — and mutates
//! the attachment set through the platform client.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::tool::ToolDescriptor;

/// The slice of agent metadata the engine actually reads. Agent identifiers
/// stay opaque strings end to end; the platform assigns them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: String,
    #[serde(default = "AgentSummary::unknown_name")]
    pub name: String,
}

impl AgentSummary {
    fn unknown_name() -> String {
        "Unknown Agent".to_string()
    }
}

/// An agent's attached tools split into the pruning-relevant partition.
///
/// `mcp` is de-duplicated by id with ids mirrored into both wire fields;
/// tools without any id are dropped (they cannot be addressed for mutation).
/// `core` holds everything that is not MCP-typed and is never pruned.
#[derive(Debug, Clone, Default)]
pub struct AttachedTools {
    pub core: Vec<ToolDescriptor>,
    pub mcp: Vec<ToolDescriptor>,
}

impl AttachedTools {
    pub fn partition(tools: Vec<ToolDescriptor>) -> Self {
        let mut seen_mcp_ids: HashSet<String> = HashSet::new();
        let mut out = Self::default();

        for mut tool in tools {
            let Some(id) = tool.canonical_id().map(str::to_owned) else {
                tracing::warn!(name = %tool.name, "attached tool has no id, skipping");
                continue;
            };
            tool.normalize_ids();
            if tool.is_mcp() {
                if seen_mcp_ids.insert(id) {
                    out.mcp.push(tool);
                }
            } else {
                out.core.push(tool);
            }
        }
        out
    }

    pub fn mcp_ids(&self) -> HashSet<String> {
        self.mcp
            .iter()
            .filter_map(|t| t.canonical_id().map(str::to_owned))
            .collect()
    }

    pub fn core_ids(&self) -> HashSet<String> {
        self.core
            .iter()
            .filter_map(|t| t.canonical_id().map(str::to_owned))
            .collect()
    }
}
