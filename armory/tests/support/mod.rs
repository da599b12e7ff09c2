// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Shared fixtures: a scriptable in-memory agent platform and vector store.
// Not every test binary exercises every fixture helper.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use aegis_armory::domain::{
    AgentSummary, McpServerMap, RemoteError, ToolDescriptor, TOOL_TYPE_EXTERNAL_MCP,
};
use aegis_armory::infrastructure::platform::{AgentPlatform, DetachAck};
use aegis_armory::infrastructure::weaviate::{BatchSummary, IndexedTool, SearchHit, ToolIndex};

pub fn mcp_tool(id: &str, name: &str, server: Option<&str>) -> ToolDescriptor {
    ToolDescriptor {
        id: Some(id.to_string()),
        tool_id: Some(id.to_string()),
        name: name.to_string(),
        description: format!("{name} description"),
        tool_type: Some(TOOL_TYPE_EXTERNAL_MCP.to_string()),
        source_type: Some("python".to_string()),
        tags: vec![],
        json_schema: None,
        mcp_server_name: server.map(str::to_owned),
    }
}

pub fn core_tool(id: &str, name: &str) -> ToolDescriptor {
    ToolDescriptor {
        id: Some(id.to_string()),
        tool_id: Some(id.to_string()),
        name: name.to_string(),
        description: format!("{name} description"),
        tool_type: Some("native".to_string()),
        source_type: Some("python".to_string()),
        tags: vec![],
        json_schema: None,
        mcp_server_name: None,
    }
}

/// Tool descriptor with no platform id, as a stale vector store hit has.
pub fn unregistered_tool(name: &str, server: &str) -> ToolDescriptor {
    ToolDescriptor {
        id: None,
        tool_id: None,
        name: name.to_string(),
        description: format!("{name} description"),
        tool_type: Some(TOOL_TYPE_EXTERNAL_MCP.to_string()),
        source_type: None,
        tags: vec![],
        json_schema: None,
        mcp_server_name: Some(server.to_string()),
    }
}

/// In-memory agent platform. Attach/detach mutate the agent's tool list so
/// successive engine calls observe their own effects; failures are scripted
/// per tool id.
#[derive(Default)]
pub struct MockPlatform {
    pub agent_name: String,
    /// The agent's currently attached tools.
    pub agent_tools: Mutex<Vec<ToolDescriptor>>,
    /// Descriptors adopted when an attach arrives for a known id.
    pub known_tools: Mutex<HashMap<String, ToolDescriptor>>,
    /// The platform-wide registry, by name.
    pub registry: Mutex<HashMap<String, ToolDescriptor>>,
    pub mcp_servers: Mutex<McpServerMap>,
    pub mcp_server_tools: Mutex<HashMap<String, Vec<ToolDescriptor>>>,
    /// Tool ids whose detach fails with a 500.
    pub fail_detach: Mutex<HashSet<String>>,
    /// Tool ids whose attach fails with a 500.
    pub fail_attach: Mutex<HashSet<String>>,
    /// Tool names whose registration fails with a 500.
    pub fail_register: Mutex<HashSet<String>>,
    /// Recorded mutations, in call order.
    pub attached_ids: Mutex<Vec<String>>,
    pub detached_ids: Mutex<Vec<String>>,
    pub registered: Mutex<Vec<(String, String)>>,
}

impl MockPlatform {
    pub fn new(agent_tools: Vec<ToolDescriptor>) -> Self {
        Self {
            agent_name: "Test Agent".to_string(),
            agent_tools: Mutex::new(agent_tools),
            ..Default::default()
        }
    }

    pub fn current_mcp_ids(&self) -> HashSet<String> {
        self.agent_tools
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.is_mcp())
            .filter_map(|t| t.canonical_id().map(str::to_owned))
            .collect()
    }

    pub fn current_core_ids(&self) -> HashSet<String> {
        self.agent_tools
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !t.is_mcp())
            .filter_map(|t| t.canonical_id().map(str::to_owned))
            .collect()
    }
}

#[async_trait]
impl AgentPlatform for MockPlatform {
    async fn get_agent(&self, agent_id: &str) -> Result<AgentSummary, RemoteError> {
        Ok(AgentSummary { id: agent_id.to_string(), name: self.agent_name.clone() })
    }

    async fn list_agent_tools(&self, _agent_id: &str) -> Result<Vec<ToolDescriptor>, RemoteError> {
        Ok(self.agent_tools.lock().unwrap().clone())
    }

    async fn list_platform_tools(&self) -> Result<Vec<ToolDescriptor>, RemoteError> {
        let mut tools: Vec<ToolDescriptor> = self.registry.lock().unwrap().values().cloned().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tools)
    }

    async fn list_mcp_servers(&self) -> Result<McpServerMap, RemoteError> {
        Ok(self.mcp_servers.lock().unwrap().clone())
    }

    async fn list_mcp_server_tools(
        &self,
        server_name: &str,
    ) -> Result<Vec<ToolDescriptor>, RemoteError> {
        Ok(self
            .mcp_server_tools
            .lock()
            .unwrap()
            .get(server_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn register_mcp_tool(
        &self,
        server_name: &str,
        tool_name: &str,
    ) -> Result<ToolDescriptor, RemoteError> {
        self.registered.lock().unwrap().push((server_name.to_string(), tool_name.to_string()));
        if self.fail_register.lock().unwrap().contains(tool_name) {
            return Err(RemoteError::Api { status: 500, message: "registration refused".into() });
        }
        let mut tool = mcp_tool(&format!("reg-{tool_name}"), tool_name, Some(server_name));
        tool.normalize_ids();
        self.known_tools
            .lock()
            .unwrap()
            .insert(tool.canonical_id().unwrap().to_string(), tool.clone());
        Ok(tool)
    }

    async fn attach_tool(&self, _agent_id: &str, tool_id: &str) -> Result<(), RemoteError> {
        if self.fail_attach.lock().unwrap().contains(tool_id) {
            return Err(RemoteError::Api { status: 500, message: "attach refused".into() });
        }
        self.attached_ids.lock().unwrap().push(tool_id.to_string());

        let mut agent_tools = self.agent_tools.lock().unwrap();
        if agent_tools.iter().any(|t| t.canonical_id() == Some(tool_id)) {
            return Ok(()); // conflict-as-success
        }
        let tool = self
            .known_tools
            .lock()
            .unwrap()
            .get(tool_id)
            .cloned()
            .unwrap_or_else(|| mcp_tool(tool_id, &format!("tool_{tool_id}"), None));
        agent_tools.push(tool);
        Ok(())
    }

    async fn detach_tool(&self, _agent_id: &str, tool_id: &str) -> Result<DetachAck, RemoteError> {
        if self.fail_detach.lock().unwrap().contains(tool_id) {
            return Err(RemoteError::Api { status: 500, message: "detach refused".into() });
        }
        self.detached_ids.lock().unwrap().push(tool_id.to_string());

        let mut agent_tools = self.agent_tools.lock().unwrap();
        let before = agent_tools.len();
        agent_tools.retain(|t| t.canonical_id() != Some(tool_id));
        Ok(DetachAck { already_detached: agent_tools.len() == before })
    }
}

/// In-memory vector store. Hybrid hits are canned; membership operations
/// mutate the object list the way the real store would.
#[derive(Default)]
pub struct MemoryToolIndex {
    pub objects: Mutex<Vec<IndexedTool>>,
    pub hits: Mutex<Vec<SearchHit>>,
    pub is_ready: AtomicBool,
    pub search_calls: AtomicUsize,
    pub backfills: Mutex<Vec<(Uuid, String)>>,
}

impl MemoryToolIndex {
    pub fn new() -> Self {
        let index = Self::default();
        index.is_ready.store(true, Ordering::SeqCst);
        index
    }

    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        let index = Self::new();
        *index.hits.lock().unwrap() = hits;
        index
    }

    pub fn seed_object(&self, tool: ToolDescriptor) {
        self.objects.lock().unwrap().push(IndexedTool { uuid: Uuid::new_v4(), tool });
    }

    pub fn object_names(&self) -> HashSet<String> {
        self.objects.lock().unwrap().iter().map(|o| o.tool.name.clone()).collect()
    }
}

pub fn hit(tool: ToolDescriptor, score: f64) -> SearchHit {
    SearchHit { tool, score: Some(score) }
}

#[async_trait]
impl ToolIndex for MemoryToolIndex {
    async fn ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    async fn ensure_schema(&self) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn drop_collection(&self) -> Result<(), RemoteError> {
        self.objects.lock().unwrap().clear();
        Ok(())
    }

    async fn fetch_all(&self, limit: usize) -> Result<Vec<IndexedTool>, RemoteError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.iter().take(limit).cloned().collect())
    }

    async fn insert_objects(&self, tools: &[ToolDescriptor]) -> Result<BatchSummary, RemoteError> {
        for tool in tools {
            self.seed_object(tool.clone());
        }
        Ok(BatchSummary { matched: tools.len(), successful: tools.len(), failed: 0 })
    }

    async fn update_server_name(&self, uuid: &Uuid, server: &str) -> Result<(), RemoteError> {
        self.backfills.lock().unwrap().push((*uuid, server.to_string()));
        let mut objects = self.objects.lock().unwrap();
        if let Some(object) = objects.iter_mut().find(|o| o.uuid == *uuid) {
            object.tool.mcp_server_name = Some(server.to_string());
        }
        Ok(())
    }

    async fn delete_by_name(&self, name: &str) -> Result<BatchSummary, RemoteError> {
        let mut objects = self.objects.lock().unwrap();
        let before = objects.len();
        objects.retain(|o| o.tool.name != name);
        let removed = before - objects.len();
        Ok(BatchSummary { matched: removed, successful: removed, failed: 0 })
    }

    async fn hybrid_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, RemoteError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if query.trim().is_empty() {
            return Ok(vec![]);
        }
        let hits = self.hits.lock().unwrap();
        Ok(hits.iter().take(limit).cloned().collect())
    }

    async fn object_vector(&self, _uuid: &Uuid) -> Result<Vec<f64>, RemoteError> {
        Ok(vec![])
    }

    async fn object_vector_graphql(&self, _uuid: &Uuid) -> Result<Vec<f64>, RemoteError> {
        Ok(vec![])
    }

    async fn near_text_vector(&self, _text: &str) -> Result<Vec<f64>, RemoteError> {
        Ok(vec![])
    }
}
