// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Direct embedding-provider client.
//!
//! The vector store's vectorizer is the primary embedding path; this client
//! is the fallback for when that vectorizer is unreachable or misconfigured
//! at request time. It calls the provider's embeddings API directly with the
//! configured model.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::domain::RemoteError;

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f64>,
}

/// Client for the embedding provider's HTTP API.
pub struct EmbeddingClient {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl EmbeddingClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: EMBEDDINGS_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Embed `text` with the configured model. Returns an empty vector when
    /// no key is configured or the provider yields nothing usable, matching
    /// the degraded posture of the vectorizer path.
    pub async fn embed(&self, text: &str) -> Result<Vec<f64>, RemoteError> {
        let Some(api_key) = &self.api_key else {
            tracing::warn!("no embedding provider key configured, returning empty vector");
            return Ok(Vec::new());
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .timeout(Duration::from_secs(30))
            .json(&json!({ "model": EMBEDDING_MODEL, "input": text }))
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api { status: status.as_u16(), message });
        }

        let parsed: EmbeddingResponse =
            response.json().await.map_err(RemoteError::from_reqwest)?;
        let vector = parsed.data.into_iter().next().map(|d| d.embedding).unwrap_or_default();
        tracing::debug!(dimensions = vector.len(), "direct embedding fetched");
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_without_key_is_empty_not_an_error() {
        let client = EmbeddingClient::new(None);
        assert!(client.embed("hello").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embed_extracts_the_first_datum() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .match_header("authorization", "Bearer key-1")
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"embedding":[0.1,0.2,0.3]}]}"#)
            .create_async()
            .await;

        let client = EmbeddingClient::new(Some("key-1".into()))
            .with_endpoint(format!("{}/v1/embeddings", server.url()));
        assert_eq!(client.embed("hello").await.unwrap(), vec![0.1, 0.2, 0.3]);
    }
}
