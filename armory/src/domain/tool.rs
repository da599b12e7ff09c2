// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tool Domain Types
//!
//! The tool descriptor is the central entity of the armory. It travels across
//! three systems under one identity rule: `name` is the stable key across the
//! agent platform and the vector store; `id` is authoritative only inside the
//! agent platform.
//!
//! ## Key Types
//!
//! | Type | Role |
//! |------|------|
//! | [`ToolDescriptor`] | Wire/cache representation of a platform tool |
//! | [`ToolSource`] | Tagged projection used for resolution decisions |
//! | [`McpServerRecord`] | One federated MCP sub-server as the platform lists it |
//!
//! An `external_mcp` descriptor whose `mcp_server_name` no longer names a
//! listed server is obsolete and must not survive a sync cycle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool type tag the agent platform uses for MCP-federated tools. Tools of
/// any other type are "core" tools and are never pruned.
pub const TOOL_TYPE_EXTERNAL_MCP: &str = "external_mcp";

/// Default source tag applied to descriptors discovered on MCP servers that
/// did not declare one.
pub const DEFAULT_SOURCE_TYPE: &str = "python";

/// A tool descriptor as exchanged with the agent platform and persisted in
/// the catalog cache.
///
/// The platform is inconsistent about whether the identifier arrives as `id`
/// or `tool_id`; [`ToolDescriptor::canonical_id`] resolves the pair and
/// [`ToolDescriptor::normalize_ids`] mirrors it into both fields so
/// downstream consumers can rely on either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<Value>,
    /// Federated sub-server of origin; present iff the tool is MCP-typed
    /// (backfilled during sync when the platform omits it).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_server_name: Option<String>,
}

impl ToolDescriptor {
    /// The identifier under either wire spelling, if any.
    pub fn canonical_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.tool_id.as_deref())
    }

    /// Mirror the identifier into both `id` and `tool_id`.
    pub fn normalize_ids(&mut self) {
        if let Some(id) = self.canonical_id().map(str::to_owned) {
            self.id = Some(id.clone());
            self.tool_id = Some(id);
        }
    }

    /// Whether the platform tags this tool as MCP-federated.
    pub fn is_mcp(&self) -> bool {
        self.tool_type.as_deref() == Some(TOOL_TYPE_EXTERNAL_MCP)
    }

    /// Tagged view over the tool's origin, used by candidate resolution.
    pub fn source(&self) -> ToolSource<'_> {
        match self.mcp_server_name.as_deref() {
            Some(server) if self.is_mcp() || self.tool_type.is_none() => {
                ToolSource::Mcp { server }
            }
            _ => ToolSource::Native,
        }
    }

    /// Identifier synthesized when registration succeeds but the platform
    /// response omits one. The platform may or may not accept it; callers
    /// surface the per-item outcome either way.
    pub fn synthetic_id(server: &str, name: &str) -> String {
        format!("{server}__{name}")
    }
}

/// Origin of a tool, as a two-arm tag.
///
/// Resolution of a search hit to an attachable platform id matches on this:
/// a native tool must already carry an id; an MCP tool without one can be
/// recovered by registering it against its originating server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSource<'a> {
    /// Platform-native tool (or any non-MCP type).
    Native,
    /// MCP-federated tool and the sub-server that exposes it.
    Mcp { server: &'a str },
}

/// One MCP sub-server as returned by the platform's server listing.
///
/// Opaque beyond `name`, which keys the platform's per-server tool listing
/// and the obsolescence filter's active-server set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub server_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The MCP server cache payload: records keyed by server name, exactly as the
/// platform returns its listing. `BTreeMap` keeps the on-disk file stable
/// across cycles with unchanged content.
pub type McpServerMap = BTreeMap<String, McpServerRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    fn mcp_tool(name: &str, server: Option<&str>) -> ToolDescriptor {
        ToolDescriptor {
            id: None,
            tool_id: None,
            name: name.to_string(),
            description: String::new(),
            tool_type: Some(TOOL_TYPE_EXTERNAL_MCP.to_string()),
            source_type: None,
            tags: vec![],
            json_schema: None,
            mcp_server_name: server.map(str::to_owned),
        }
    }

    #[test]
    fn canonical_id_prefers_id_over_tool_id() {
        let mut tool = mcp_tool("send_message", Some("chat"));
        tool.tool_id = Some("tool-b".to_string());
        assert_eq!(tool.canonical_id(), Some("tool-b"));
        tool.id = Some("tool-a".to_string());
        assert_eq!(tool.canonical_id(), Some("tool-a"));
    }

    #[test]
    fn normalize_ids_mirrors_whichever_field_is_present() {
        let mut tool = mcp_tool("send_message", Some("chat"));
        tool.tool_id = Some("tool-7".to_string());
        tool.normalize_ids();
        assert_eq!(tool.id.as_deref(), Some("tool-7"));
        assert_eq!(tool.tool_id.as_deref(), Some("tool-7"));
    }

    #[test]
    fn source_matches_mcp_when_server_is_known() {
        let tool = mcp_tool("send_message", Some("chat"));
        assert_eq!(tool.source(), ToolSource::Mcp { server: "chat" });

        let orphan = mcp_tool("send_message", None);
        assert_eq!(orphan.source(), ToolSource::Native);
    }

    #[test]
    fn synthetic_id_joins_server_and_name() {
        assert_eq!(
            ToolDescriptor::synthetic_id("chat", "send_message"),
            "chat__send_message"
        );
    }

    #[test]
    fn descriptor_roundtrips_through_json() {
        let raw = serde_json::json!({
            "id": "tool-1",
            "name": "ghost_create_post",
            "description": "Create a blog post",
            "tool_type": "external_mcp",
            "tags": ["cms"],
            "json_schema": {"type": "object"},
            "mcp_server_name": "ghost"
        });
        let tool: ToolDescriptor = serde_json::from_value(raw).unwrap();
        assert!(tool.is_mcp());
        assert_eq!(tool.canonical_id(), Some("tool-1"));
        let back = serde_json::to_value(&tool).unwrap();
        assert_eq!(back["mcp_server_name"], "ghost");
    }
}
