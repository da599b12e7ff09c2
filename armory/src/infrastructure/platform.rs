// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Platform Client
//!
//! Typed wrapper over the agent platform REST API: agent lookups, attached
//! tool listings, the paged tool registry, MCP server federation, and the
//! per-tool attach/detach mutations.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Anti-corruption layer for the platform's REST surface
//!
//! One pooled `reqwest` client is shared by every operation; the shared
//! secret is forwarded verbatim in a single header. Transport failures and
//! 5xx responses are retried by [`RetryPolicy`]; 4xx is terminal, except 404
//! which has per-operation semantics (a detach of an unknown tool is
//! reported as already detached, not as a failure).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{AgentSummary, McpServerMap, RemoteError, ToolDescriptor};
use crate::infrastructure::retry::RetryPolicy;

/// Header carrying the platform shared secret, forwarded verbatim.
pub const SHARED_SECRET_HEADER: &str = "X-BARE-PASSWORD";

/// Acknowledgement of a detach mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetachAck {
    /// The platform answered 404: the tool was not attached (or does not
    /// exist). Recovered as success with this note.
    pub already_detached: bool,
}

/// Remote operations the engines need from the agent platform.
///
/// Listing operations paginate internally and return complete sequences;
/// mutations are idempotent per the platform's semantics.
#[async_trait]
pub trait AgentPlatform: Send + Sync {
    async fn get_agent(&self, agent_id: &str) -> Result<AgentSummary, RemoteError>;

    async fn list_agent_tools(&self, agent_id: &str) -> Result<Vec<ToolDescriptor>, RemoteError>;

    /// Every tool registered in the platform, collected across cursor pages.
    async fn list_platform_tools(&self) -> Result<Vec<ToolDescriptor>, RemoteError>;

    async fn list_mcp_servers(&self) -> Result<McpServerMap, RemoteError>;

    /// Tools exposed by one federated MCP server, collected across pages.
    async fn list_mcp_server_tools(
        &self,
        server_name: &str,
    ) -> Result<Vec<ToolDescriptor>, RemoteError>;

    /// Materialize a federated tool as a first-class platform tool.
    /// Idempotent by `(server, name)`.
    async fn register_mcp_tool(
        &self,
        server_name: &str,
        tool_name: &str,
    ) -> Result<ToolDescriptor, RemoteError>;

    /// Attach a tool to an agent. A 409 (already attached) is success.
    async fn attach_tool(&self, agent_id: &str, tool_id: &str) -> Result<(), RemoteError>;

    /// Detach a tool from an agent. A 404 is success with a note.
    async fn detach_tool(&self, agent_id: &str, tool_id: &str) -> Result<DetachAck, RemoteError>;
}

/// `AgentPlatform` over HTTP.
pub struct HttpAgentPlatform {
    base_url: String,
    secret: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    mutation_timeout: Duration,
    page_limit: usize,
    page_pause: Duration,
}

impl HttpAgentPlatform {
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            secret: secret.into(),
            client: reqwest::Client::new(),
            retry: RetryPolicy::default(),
            mutation_timeout: Duration::from_secs(10),
            page_limit: 1000,
            page_pause: Duration::from_millis(200),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = limit;
        self
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header(SHARED_SECRET_HEADER, format!("password {}", self.secret))
    }

    async fn get_json(&self, url: &str) -> Result<Value, RemoteError> {
        self.retry
            .execute(|| async {
                let response = self
                    .authorized(self.client.get(url))
                    .send()
                    .await
                    .map_err(RemoteError::from_reqwest)?;
                let response = check_status(response).await?;
                response.json::<Value>().await.map_err(RemoteError::from_reqwest)
            })
            .await
    }

    /// Walk one paged tool listing to exhaustion. The cursor is the last
    /// returned id; a page shorter than the limit ends the walk. Once tools
    /// have been collected, a failing page degrades to a partial result
    /// rather than discarding what was already fetched.
    async fn fetch_tool_pages(&self, url: &str) -> Result<Vec<ToolDescriptor>, RemoteError> {
        let mut all_tools: Vec<ToolDescriptor> = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let page_url = match &after {
                Some(cursor) => format!("{url}?limit={}&after={cursor}", self.page_limit),
                None => format!("{url}?limit={}", self.page_limit),
            };

            let page = match self.get_json(&page_url).await {
                Ok(body) => coerce_tool_list(body),
                Err(e) if all_tools.is_empty() => return Err(e),
                Err(e) => {
                    tracing::warn!(url = %page_url, error = %e, "page fetch failed, returning partial listing");
                    return Ok(all_tools);
                }
            };

            let page_len = page.len();
            let last_id = page.last().and_then(|t| t.canonical_id().map(str::to_owned));
            all_tools.extend(page);
            tracing::debug!(url, page_len, total = all_tools.len(), "fetched tool page");

            if page_len < self.page_limit {
                return Ok(all_tools);
            }
            match last_id {
                Some(id) => {
                    after = Some(id);
                    tokio::time::sleep(self.page_pause).await;
                }
                None => return Ok(all_tools),
            }
        }
    }
}

#[async_trait]
impl AgentPlatform for HttpAgentPlatform {
    async fn get_agent(&self, agent_id: &str) -> Result<AgentSummary, RemoteError> {
        let body = self.get_json(&format!("{}/agents/{agent_id}", self.base_url)).await?;
        serde_json::from_value(body).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn list_agent_tools(&self, agent_id: &str) -> Result<Vec<ToolDescriptor>, RemoteError> {
        let body = self.get_json(&format!("{}/agents/{agent_id}/tools", self.base_url)).await?;
        Ok(coerce_tool_list(body))
    }

    async fn list_platform_tools(&self) -> Result<Vec<ToolDescriptor>, RemoteError> {
        self.fetch_tool_pages(&format!("{}/tools", self.base_url)).await
    }

    async fn list_mcp_servers(&self) -> Result<McpServerMap, RemoteError> {
        let body = self.get_json(&format!("{}/tools/mcp/servers", self.base_url)).await?;
        Ok(coerce_server_map(body))
    }

    async fn list_mcp_server_tools(
        &self,
        server_name: &str,
    ) -> Result<Vec<ToolDescriptor>, RemoteError> {
        self.fetch_tool_pages(&format!("{}/tools/mcp/servers/{server_name}/tools", self.base_url))
            .await
    }

    async fn register_mcp_tool(
        &self,
        server_name: &str,
        tool_name: &str,
    ) -> Result<ToolDescriptor, RemoteError> {
        let url = format!("{}/tools/mcp/servers/{server_name}/{tool_name}", self.base_url);
        let body = self
            .retry
            .execute(|| async {
                let response = self
                    .authorized(self.client.post(&url))
                    .timeout(Duration::from_secs(60))
                    .send()
                    .await
                    .map_err(RemoteError::from_reqwest)?;
                let response = check_status(response).await?;
                response.json::<Value>().await.map_err(RemoteError::from_reqwest)
            })
            .await?;

        let mut tool: ToolDescriptor =
            serde_json::from_value(body).map_err(|e| RemoteError::Decode(e.to_string()))?;
        tool.normalize_ids();
        Ok(tool)
    }

    async fn attach_tool(&self, agent_id: &str, tool_id: &str) -> Result<(), RemoteError> {
        let url = format!("{}/agents/{agent_id}/tools/attach/{tool_id}", self.base_url);
        let result = self
            .retry
            .execute(|| async {
                let response = self
                    .authorized(self.client.patch(&url))
                    .timeout(self.mutation_timeout)
                    .send()
                    .await
                    .map_err(RemoteError::from_reqwest)?;
                check_status(response).await.map(|_| ())
            })
            .await;

        match result {
            Err(RemoteError::Conflict(_)) => {
                tracing::debug!(agent_id, tool_id, "tool already attached");
                Ok(())
            }
            other => other,
        }
    }

    async fn detach_tool(&self, agent_id: &str, tool_id: &str) -> Result<DetachAck, RemoteError> {
        let url = format!("{}/agents/{agent_id}/tools/detach/{tool_id}", self.base_url);
        let result = self
            .retry
            .execute(|| async {
                let response = self
                    .authorized(self.client.patch(&url))
                    .timeout(self.mutation_timeout)
                    .send()
                    .await
                    .map_err(RemoteError::from_reqwest)?;
                check_status(response).await.map(|_| ())
            })
            .await;

        match result {
            Ok(()) => Ok(DetachAck { already_detached: false }),
            Err(RemoteError::NotFound(_)) => {
                tracing::warn!(agent_id, tool_id, "tool not found or already detached");
                Ok(DetachAck { already_detached: true })
            }
            Err(e) => Err(e),
        }
    }
}

fn normalize_base_url(raw: String) -> String {
    let trimmed = raw.trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(match status.as_u16() {
        404 => RemoteError::NotFound(message),
        409 => RemoteError::Conflict(message),
        code => RemoteError::Api { status: code, message },
    })
}

/// The platform sometimes returns a bare object where a list is expected;
/// tolerate both and drop anything that is not tool-shaped.
fn coerce_tool_list(body: Value) -> Vec<ToolDescriptor> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(_) => vec![body],
        other => {
            tracing::warn!(got = %other, "expected a tool list, treating as empty");
            return Vec::new();
        }
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ToolDescriptor>(item) {
            Ok(tool) => Some(tool),
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable tool entry");
                None
            }
        })
        .collect()
}

/// The MCP server listing is a map keyed by server name; a plain list is
/// accepted for older platform builds. Record names are filled from the map
/// keys when the payload omits them.
fn coerce_server_map(body: Value) -> McpServerMap {
    let mut map = McpServerMap::new();
    match body {
        Value::Object(entries) => {
            for (name, value) in entries {
                let mut record: crate::domain::McpServerRecord =
                    serde_json::from_value(value).unwrap_or(crate::domain::McpServerRecord {
                        name: String::new(),
                        server_type: None,
                        url: None,
                    });
                if record.name.is_empty() {
                    record.name = name.clone();
                }
                map.insert(name, record);
            }
        }
        Value::Array(items) => {
            for item in items {
                if let Ok(record) =
                    serde_json::from_value::<crate::domain::McpServerRecord>(item)
                {
                    if !record.name.is_empty() {
                        map.insert(record.name.clone(), record);
                    }
                }
            }
        }
        other => tracing::warn!(got = %other, "expected an MCP server map, treating as empty"),
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 1.0,
        }
    }

    fn client_for(server: &mockito::ServerGuard) -> HttpAgentPlatform {
        HttpAgentPlatform::new(format!("{}/v1", server.url()), "sekrit").with_retry(fast_retry())
    }

    #[tokio::test]
    async fn base_url_is_normalized_to_v1() {
        let platform = HttpAgentPlatform::new("http://platform.local/", "s");
        assert_eq!(platform.base_url, "http://platform.local/v1");
        let platform = HttpAgentPlatform::new("http://platform.local/v1", "s");
        assert_eq!(platform.base_url, "http://platform.local/v1");
    }

    #[tokio::test]
    async fn attach_treats_conflict_as_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/v1/agents/agent-1/tools/attach/tool-1")
            .match_header(SHARED_SECRET_HEADER, "password sekrit")
            .with_status(409)
            .create_async()
            .await;

        let platform = client_for(&server);
        platform.attach_tool("agent-1", "tool-1").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn attach_surfaces_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PATCH", "/v1/agents/agent-1/tools/attach/ghost")
            .with_status(404)
            .create_async()
            .await;

        let platform = client_for(&server);
        let err = platform.attach_tool("agent-1", "ghost").await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[tokio::test]
    async fn detach_recovers_404_as_already_detached() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PATCH", "/v1/agents/agent-1/tools/detach/tool-9")
            .with_status(404)
            .create_async()
            .await;

        let platform = client_for(&server);
        let ack = platform.detach_tool("agent-1", "tool-9").await.unwrap();
        assert!(ack.already_detached);
    }

    #[tokio::test]
    async fn server_errors_are_retried_to_exhaustion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/v1/agents/agent-1/tools/detach/tool-9")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let platform = client_for(&server);
        let err = platform.detach_tool("agent-1", "tool-9").await.unwrap_err();
        assert!(matches!(err, RemoteError::Api { status: 503, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn platform_tools_follow_the_cursor() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/tools")
            .match_query(mockito::Matcher::UrlEncoded("limit".into(), "2".into()))
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":"t1","name":"alpha"},{"id":"t2","name":"beta"}]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v1/tools")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("limit".into(), "2".into()),
                mockito::Matcher::UrlEncoded("after".into(), "t2".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":"t3","name":"gamma"}]"#)
            .create_async()
            .await;

        let platform = client_for(&server).with_page_limit(2);
        let tools = platform.list_platform_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
    }

    #[tokio::test]
    async fn register_normalizes_the_id_pair() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/tools/mcp/servers/ghost/create_post")
            .with_header("content-type", "application/json")
            .with_body(r#"{"tool_id":"tool-77","name":"create_post","tool_type":"external_mcp"}"#)
            .create_async()
            .await;

        let platform = client_for(&server);
        let tool = platform.register_mcp_tool("ghost", "create_post").await.unwrap();
        assert_eq!(tool.id.as_deref(), Some("tool-77"));
        assert_eq!(tool.tool_id.as_deref(), Some("tool-77"));
    }

    #[tokio::test]
    async fn server_map_fills_names_from_keys() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/tools/mcp/servers")
            .with_header("content-type", "application/json")
            .with_body(r#"{"ghost":{"type":"sse","url":"http://ghost:4000"},"plane":{}}"#)
            .create_async()
            .await;

        let platform = client_for(&server);
        let servers = platform.list_mcp_servers().await.unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers["ghost"].name, "ghost");
        assert_eq!(servers["ghost"].url.as_deref(), Some("http://ghost:4000"));
        assert_eq!(servers["plane"].name, "plane");
    }
}
