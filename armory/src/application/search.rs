// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Semantic Tool Search
//!
//! Application service over the vector store: query expansion, hybrid
//! search with score→distance conversion, and the two embedding-retrieval
//! paths (stored vector by object id; ad-hoc vector for free text with a
//! direct-provider fallback).

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::ToolDescriptor;
use crate::infrastructure::{EmbeddingClient, ToolIndex};

/// Static synonym table used to broaden recall before the vector query.
/// Keyed by prompt token; values are unioned into the expanded query.
const QUERY_EXPANSIONS: &[(&str, &[&str])] = &[
    ("create", &["add", "new", "publish", "post", "initiate", "build"]),
    ("post", &["publish", "entry", "article"]),
    ("list", &["get", "fetch", "show", "display", "view", "enumerate"]),
    ("delete", &["remove", "destroy", "clear", "erase", "purge"]),
    ("update", &["edit", "modify", "change", "revise", "upgrade"]),
    ("search", &["find", "query", "lookup", "locate", "explore"]),
    ("manage", &["organize", "handle", "control", "track", "administer"]),
    ("api", &["integration", "service", "endpoint", "connection"]),
    ("content", &["post", "article", "page", "data", "material", "resource"]),
    ("tool", &["utility", "function", "capability", "feature"]),
    ("blog", &["article", "posts", "ghost", "cms", "write-up"]),
    ("integration", &["api", "service", "connector", "plugin"]),
    ("configure", &["setup", "initialize", "customize"]),
    ("ghost", &["blogging", "headless", "cms"]),
    ("web", &["online", "internet", "site", "webpage"]),
];

/// Expand a prompt by unioning its tokens with the synonym table.
/// Duplicates are dropped; first occurrence wins the position.
pub fn expand_query(query: &str) -> String {
    let mut seen: HashSet<String> = HashSet::new();
    let mut expanded: Vec<String> = Vec::new();

    let mut push = |word: &str, seen: &mut HashSet<String>, out: &mut Vec<String>| {
        if seen.insert(word.to_string()) {
            out.push(word.to_string());
        }
    };

    for word in query.to_lowercase().split_whitespace() {
        push(word, &mut seen, &mut expanded);
        if let Some((_, synonyms)) = QUERY_EXPANSIONS.iter().find(|(key, _)| *key == word) {
            for synonym in *synonyms {
                push(synonym, &mut seen, &mut expanded);
            }
        }
    }
    expanded.join(" ")
}

/// A search hit with its distance (`1 − score`, lower is better).
#[derive(Debug, Clone, Serialize)]
pub struct ScoredTool {
    #[serde(flatten)]
    pub tool: ToolDescriptor,
    pub distance: f64,
}

/// Search and embedding retrieval over the shared vector store handle.
pub struct ToolSearch {
    index: Arc<dyn ToolIndex>,
    embeddings: EmbeddingClient,
}

impl ToolSearch {
    pub fn new(index: Arc<dyn ToolIndex>, embeddings: EmbeddingClient) -> Self {
        Self { index, embeddings }
    }

    /// Hybrid search with query expansion. Hits without score metadata get
    /// the neutral distance 0.5; results come back sorted by ascending
    /// distance (ties keep the store's ranking).
    pub async fn search_tools(&self, query: &str, limit: usize) -> anyhow::Result<Vec<ScoredTool>> {
        let expanded = expand_query(query);
        tracing::debug!(query, expanded = %expanded, limit, "running hybrid tool search");

        let hits = self.index.hybrid_search(&expanded, limit).await?;
        let mut scored: Vec<ScoredTool> = hits
            .into_iter()
            .map(|hit| ScoredTool {
                tool: hit.tool,
                distance: 1.0 - hit.score.unwrap_or(0.5),
            })
            .collect();
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(scored)
    }

    /// Stored vector for a tool object: direct fetch first, GraphQL id
    /// filter as fallback. Empty when neither path yields a usable vector.
    pub async fn tool_embedding_by_id(&self, uuid: &Uuid) -> Vec<f64> {
        match self.index.object_vector(uuid).await {
            Ok(vector) if !vector.is_empty() => return vector,
            Ok(_) => {
                tracing::debug!(%uuid, "no usable vector from direct fetch, trying GraphQL");
            }
            Err(e) => {
                tracing::warn!(%uuid, error = %e, "direct vector fetch failed, trying GraphQL");
            }
        }
        match self.index.object_vector_graphql(uuid).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(%uuid, error = %e, "GraphQL vector fallback failed");
                Vec::new()
            }
        }
    }

    /// The vector the store's vectorizer would use for `text`; falls back to
    /// the embedding provider when the vectorizer path yields nothing. The
    /// redundancy covers a vectorizer that is unreachable or misconfigured
    /// at request time.
    pub async fn embedding_for_text(&self, text: &str) -> Vec<f64> {
        match self.index.near_text_vector(text).await {
            Ok(vector) if !vector.is_empty() => return vector,
            Ok(_) => tracing::debug!("vectorizer returned no vector, using direct provider"),
            Err(e) => {
                tracing::warn!(error = %e, "nearText extraction failed, using direct provider");
            }
        }
        match self.embeddings.embed(text).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::error!(error = %e, "direct embedding fallback failed");
                Vec::new()
            }
        }
    }
}

/// Cosine similarity of two vectors; 0.0 for empty, mismatched, or
/// zero-magnitude inputs.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|y| y * y).sum::<f64>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}
