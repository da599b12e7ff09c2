// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure layer: remote clients, the file-backed caches, and the
//! retry policy shared by the client layer.

pub mod cache;
pub mod embedding;
pub mod platform;
pub mod retry;
pub mod weaviate;

pub use cache::{JsonFileCache, MirrorStatus};
pub use embedding::EmbeddingClient;
pub use platform::{AgentPlatform, DetachAck, HttpAgentPlatform, SHARED_SECRET_HEADER};
pub use retry::RetryPolicy;
pub use weaviate::{
    BatchSummary, IndexedTool, SearchHit, ToolIndex, WeaviateToolIndex, HYBRID_ALPHA, TOOL_CLASS,
};
