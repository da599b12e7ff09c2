// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Vector Store Client
//!
//! Weaviate-backed tool index reached over its REST and GraphQL surfaces.
//! Holds the `Tool` collection: one object per catalog tool, vectorized from
//! its description by the store's configured vectorizer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Semantic search + membership reconciliation for the catalog
//!
//! The engines consume this through [`ToolIndex`], which keeps the curation
//! and sync logic testable against an in-memory implementation. Hybrid
//! queries return a relevance `score` in `[0, 1]`; the application layer
//! converts that to `distance = 1 − score`.

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::{RemoteError, ToolDescriptor};
use crate::infrastructure::retry::RetryPolicy;

/// Collection class holding tool objects.
pub const TOOL_CLASS: &str = "Tool";

/// Vector-weighted share of the hybrid query (the remainder is keyword).
pub const HYBRID_ALPHA: f64 = 0.75;

const TOOL_PROPERTY_FIELDS: &str =
    "tool_id name description source_type tool_type tags json_schema mcp_server_name";

/// A stored tool object: its store UUID plus the descriptor projection.
#[derive(Debug, Clone)]
pub struct IndexedTool {
    pub uuid: Uuid,
    pub tool: ToolDescriptor,
}

/// One hybrid-search hit with its relevance score (absent when the store
/// returned no metadata for the object).
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub tool: ToolDescriptor,
    pub score: Option<f64>,
}

/// Outcome of a batch insert or filtered delete.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchSummary {
    pub matched: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Vector store operations the engines need.
#[async_trait]
pub trait ToolIndex: Send + Sync {
    /// Liveness/readiness of the store. Cheap; called per request by the
    /// facade's one-retry re-initialization path.
    async fn ready(&self) -> bool;

    /// Create the `Tool` class if it does not exist.
    async fn ensure_schema(&self) -> Result<(), RemoteError>;

    /// Drop the entire `Tool` class (clear-on-startup).
    async fn drop_collection(&self) -> Result<(), RemoteError>;

    /// Every stored object (bounded by `limit`), with UUIDs.
    async fn fetch_all(&self, limit: usize) -> Result<Vec<IndexedTool>, RemoteError>;

    /// Batch-insert descriptors as new objects.
    async fn insert_objects(&self, tools: &[ToolDescriptor]) -> Result<BatchSummary, RemoteError>;

    /// Backfill `mcp_server_name` on one pre-existing object.
    async fn update_server_name(&self, uuid: &Uuid, server: &str) -> Result<(), RemoteError>;

    /// Delete every object whose `name` equals the argument.
    async fn delete_by_name(&self, name: &str) -> Result<BatchSummary, RemoteError>;

    /// Hybrid keyword+vector query over name/description/tags.
    async fn hybrid_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, RemoteError>;

    /// The stored vector of one object, by UUID (direct fetch).
    async fn object_vector(&self, uuid: &Uuid) -> Result<Vec<f64>, RemoteError>;

    /// The stored vector of one object, by UUID, through GraphQL (fallback
    /// path when the direct fetch yields no usable vector).
    async fn object_vector_graphql(&self, uuid: &Uuid) -> Result<Vec<f64>, RemoteError>;

    /// The vector the store's vectorizer would use for `text`, extracted via
    /// a `nearText` query.
    async fn near_text_vector(&self, text: &str) -> Result<Vec<f64>, RemoteError>;
}

/// `ToolIndex` over Weaviate's HTTP surfaces.
pub struct WeaviateToolIndex {
    base_url: String,
    grpc_endpoint: String,
    client: reqwest::Client,
    embedding_key: Option<String>,
    retry: RetryPolicy,
}

impl WeaviateToolIndex {
    pub fn new(
        http_host: &str,
        http_port: u16,
        grpc_host: &str,
        grpc_port: u16,
        embedding_key: Option<String>,
    ) -> Self {
        let index = Self {
            base_url: format!("http://{http_host}:{http_port}"),
            grpc_endpoint: format!("{grpc_host}:{grpc_port}"),
            client: reqwest::Client::new(),
            embedding_key,
            retry: RetryPolicy::default(),
        };
        tracing::info!(
            http = %index.base_url,
            grpc = %index.grpc_endpoint,
            "vector store endpoints configured"
        );
        index
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.embedding_key {
            Some(key) => builder.header("X-OpenAI-Api-Key", key),
            None => builder,
        }
    }

    async fn graphql(&self, query: String) -> Result<Value, RemoteError> {
        let url = format!("{}/v1/graphql", self.base_url);
        let body = self
            .retry
            .execute(|| async {
                let response = self
                    .request(self.client.post(&url))
                    .json(&json!({ "query": query.as_str() }))
                    .send()
                    .await
                    .map_err(RemoteError::from_reqwest)?;
                let response = check_status(response).await?;
                response.json::<Value>().await.map_err(RemoteError::from_reqwest)
            })
            .await?;

        if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
            return Err(RemoteError::Api { status: 200, message: errors.to_string() });
        }
        Ok(body)
    }

    /// Objects under `data.Get.Tool` of a GraphQL response.
    fn graphql_tools(body: &Value) -> &[Value] {
        body.pointer(&format!("/data/Get/{TOOL_CLASS}"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[async_trait]
impl ToolIndex for WeaviateToolIndex {
    async fn ready(&self) -> bool {
        let url = format!("{}/v1/.well-known/ready", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "vector store readiness probe failed");
                false
            }
        }
    }

    async fn ensure_schema(&self) -> Result<(), RemoteError> {
        let class_url = format!("{}/v1/schema/{TOOL_CLASS}", self.base_url);
        let existing = self
            .request(self.client.get(&class_url))
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;
        if existing.status().is_success() {
            tracing::debug!("using existing {TOOL_CLASS} schema");
            return Ok(());
        }

        tracing::info!("{TOOL_CLASS} schema not found, creating");
        let schema = json!({
            "class": TOOL_CLASS,
            "description": "An agent platform tool with its metadata and description",
            "vectorizer": "text2vec-openai",
            "moduleConfig": {
                "text2vec-openai": { "model": "ada", "modelVersion": "002", "type": "text" }
            },
            "properties": [
                { "name": "tool_id", "dataType": ["text"] },
                { "name": "name", "dataType": ["text"] },
                {
                    "name": "description",
                    "dataType": ["text"],
                    "moduleConfig": { "text2vec-openai": { "vectorizePropertyName": false } }
                },
                { "name": "source_type", "dataType": ["text"] },
                { "name": "tool_type", "dataType": ["text"] },
                { "name": "tags", "dataType": ["text[]"] },
                {
                    "name": "json_schema",
                    "dataType": ["text"],
                    "moduleConfig": { "text2vec-openai": { "skip": true } }
                },
                {
                    "name": "mcp_server_name",
                    "dataType": ["text"],
                    "moduleConfig": { "text2vec-openai": { "skip": true } }
                }
            ]
        });

        let url = format!("{}/v1/schema", self.base_url);
        let response = self
            .request(self.client.post(&url))
            .json(&schema)
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;
        check_status(response).await.map(|_| ())
    }

    async fn drop_collection(&self) -> Result<(), RemoteError> {
        let url = format!("{}/v1/schema/{TOOL_CLASS}", self.base_url);
        let response = self
            .request(self.client.delete(&url))
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;
        match check_status(response).await {
            Ok(_) | Err(RemoteError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn fetch_all(&self, limit: usize) -> Result<Vec<IndexedTool>, RemoteError> {
        let query = format!(
            "{{ Get {{ {TOOL_CLASS}(limit: {limit}) {{ {TOOL_PROPERTY_FIELDS} _additional {{ id }} }} }} }}"
        );
        let body = self.graphql(query).await?;
        Ok(Self::graphql_tools(&body)
            .iter()
            .filter_map(|obj| {
                let raw = obj.pointer("/_additional/id")?.as_str()?;
                let uuid = Uuid::parse_str(raw).ok()?;
                Some(IndexedTool { uuid, tool: properties_to_descriptor(obj) })
            })
            .collect())
    }

    async fn insert_objects(&self, tools: &[ToolDescriptor]) -> Result<BatchSummary, RemoteError> {
        if tools.is_empty() {
            return Ok(BatchSummary::default());
        }
        let objects: Vec<Value> = tools
            .iter()
            .map(|tool| json!({ "class": TOOL_CLASS, "properties": descriptor_to_properties(tool) }))
            .collect();

        let url = format!("{}/v1/batch/objects", self.base_url);
        let response = self
            .request(self.client.post(&url))
            .json(&json!({ "objects": objects }))
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;
        let response = check_status(response).await?;
        let results: Value = response.json().await.map_err(RemoteError::from_reqwest)?;

        let mut summary = BatchSummary { matched: tools.len(), ..Default::default() };
        if let Some(items) = results.as_array() {
            for item in items {
                let failed = item
                    .pointer("/result/errors")
                    .map(|e| !e.is_null())
                    .unwrap_or(false);
                if failed {
                    summary.failed += 1;
                } else {
                    summary.successful += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn update_server_name(&self, uuid: &Uuid, server: &str) -> Result<(), RemoteError> {
        let url = format!("{}/v1/objects/{TOOL_CLASS}/{uuid}", self.base_url);
        let response = self
            .request(self.client.patch(&url))
            .json(&json!({
                "class": TOOL_CLASS,
                "properties": { "mcp_server_name": server }
            }))
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;
        check_status(response).await.map(|_| ())
    }

    async fn delete_by_name(&self, name: &str) -> Result<BatchSummary, RemoteError> {
        let url = format!("{}/v1/batch/objects", self.base_url);
        let response = self
            .request(self.client.delete(&url))
            .json(&json!({
                "match": {
                    "class": TOOL_CLASS,
                    "where": {
                        "path": ["name"],
                        "operator": "Equal",
                        "valueText": name
                    }
                },
                "output": "minimal"
            }))
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;
        let response = check_status(response).await?;
        let body: Value = response.json().await.map_err(RemoteError::from_reqwest)?;

        Ok(BatchSummary {
            matched: body.pointer("/results/matches").and_then(Value::as_u64).unwrap_or(0) as usize,
            successful: body
                .pointer("/results/successful")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize,
            failed: body.pointer("/results/failed").and_then(Value::as_u64).unwrap_or(0) as usize,
        })
    }

    async fn hybrid_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, RemoteError> {
        let escaped = graphql_string(query);
        let gql = format!(
            "{{ Get {{ {TOOL_CLASS}(limit: {limit}, hybrid: {{ query: {escaped}, alpha: {HYBRID_ALPHA}, \
             properties: [\"name^2\", \"description^1.5\", \"tags\"], fusionType: relativeScoreFusion }}) \
             {{ {TOOL_PROPERTY_FIELDS} _additional {{ score }} }} }} }}"
        );
        let body = self.graphql(gql).await?;
        Ok(Self::graphql_tools(&body)
            .iter()
            .map(|obj| SearchHit {
                tool: properties_to_descriptor(obj),
                score: obj.pointer("/_additional/score").and_then(value_as_f64),
            })
            .collect())
    }

    async fn object_vector(&self, uuid: &Uuid) -> Result<Vec<f64>, RemoteError> {
        let url = format!("{}/v1/objects/{TOOL_CLASS}/{uuid}?include=vector", self.base_url);
        let response = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;
        let response = check_status(response).await?;
        let body: Value = response.json().await.map_err(RemoteError::from_reqwest)?;
        Ok(extract_vector(body.get("vector")))
    }

    async fn object_vector_graphql(&self, uuid: &Uuid) -> Result<Vec<f64>, RemoteError> {
        let escaped = graphql_string(&uuid.to_string());
        let query = format!(
            "{{ Get {{ {TOOL_CLASS}(where: {{ operator: Equal, path: [\"id\"], valueString: {escaped} }}, limit: 1) \
             {{ _additional {{ vector }} }} }} }}"
        );
        let body = self.graphql(query).await?;
        Ok(Self::graphql_tools(&body)
            .first()
            .map(|obj| extract_vector(obj.pointer("/_additional/vector")))
            .unwrap_or_default())
    }

    async fn near_text_vector(&self, text: &str) -> Result<Vec<f64>, RemoteError> {
        let escaped = graphql_string(text);
        let query = format!(
            "{{ Get {{ {TOOL_CLASS}(limit: 1, nearText: {{ concepts: [{escaped}] }}) \
             {{ _additional {{ vector }} }} }} }}"
        );
        let body = self.graphql(query).await?;
        Ok(Self::graphql_tools(&body)
            .first()
            .map(|obj| extract_vector(obj.pointer("/_additional/vector")))
            .unwrap_or_default())
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
        code => RemoteError::Api { status: code, message },
    })
}

/// Serialize a string as a GraphQL/JSON literal (quoted, escaped).
fn graphql_string(raw: &str) -> String {
    serde_json::to_string(raw).unwrap_or_else(|_| "\"\"".to_string())
}

/// Stored object properties → descriptor. The store keeps `json_schema` as a
/// serialized string; it is parsed back where possible.
fn properties_to_descriptor(obj: &Value) -> ToolDescriptor {
    let str_prop = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_owned);
    let mut tool = ToolDescriptor {
        id: str_prop("tool_id").filter(|s| !s.is_empty()),
        tool_id: None,
        name: str_prop("name").unwrap_or_default(),
        description: str_prop("description").unwrap_or_default(),
        tool_type: str_prop("tool_type"),
        source_type: str_prop("source_type"),
        tags: obj
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_owned).collect())
            .unwrap_or_default(),
        json_schema: str_prop("json_schema")
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| serde_json::from_str(&raw).ok()),
        mcp_server_name: str_prop("mcp_server_name").filter(|s| !s.is_empty()),
    };
    tool.normalize_ids();
    tool
}

/// Descriptor → stored object properties, with `None` values omitted so the
/// vectorizer never sees null fields.
fn descriptor_to_properties(tool: &ToolDescriptor) -> Value {
    let mut properties = serde_json::Map::new();
    properties.insert(
        "tool_id".into(),
        Value::String(tool.canonical_id().unwrap_or_default().to_string()),
    );
    properties.insert("name".into(), Value::String(tool.name.clone()));
    properties.insert("description".into(), Value::String(tool.description.clone()));
    properties.insert(
        "source_type".into(),
        Value::String(
            tool.source_type.clone().unwrap_or_else(|| crate::domain::DEFAULT_SOURCE_TYPE.into()),
        ),
    );
    properties.insert(
        "tool_type".into(),
        Value::String(
            tool.tool_type.clone().unwrap_or_else(|| crate::domain::TOOL_TYPE_EXTERNAL_MCP.into()),
        ),
    );
    properties.insert(
        "tags".into(),
        Value::Array(tool.tags.iter().cloned().map(Value::String).collect()),
    );
    properties.insert(
        "json_schema".into(),
        Value::String(
            tool.json_schema.as_ref().map(|schema| schema.to_string()).unwrap_or_default(),
        ),
    );
    if let Some(server) = &tool.mcp_server_name {
        properties.insert("mcp_server_name".into(), Value::String(server.clone()));
    }
    Value::Object(properties)
}

/// A usable vector: length > 1, all elements numeric. Anything else is
/// treated as absent.
fn extract_vector(value: Option<&Value>) -> Vec<f64> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    let vector: Option<Vec<f64>> = items.iter().map(value_as_f64).collect();
    match vector {
        Some(v) if v.len() > 1 => v,
        _ => Vec::new(),
    }
}

/// Weaviate's GraphQL metadata serializes numbers as strings in places;
/// accept either encoding.
fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
