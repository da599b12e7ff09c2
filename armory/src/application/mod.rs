// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application layer: the curation (attach/prune) engine, the semantic
//! search service, and the catalog sync engine with its scheduler.

pub mod curation;
pub mod search;
pub mod sync;

pub use curation::ToolCurationService;
pub use search::{cosine_similarity, expand_query, ScoredTool, ToolSearch};
pub use sync::{SyncEngine, SyncScheduler, SyncSummary};
