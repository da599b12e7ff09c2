// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # aegis-armory
//!
//! Dynamic tool curation for AEGIS agents. Agents carry a bounded tool-set;
//! the armory keeps that set relevant: given a natural-language prompt it
//! semantically searches the tool catalog, attaches the best matches to the
//! named agent, and prunes less relevant incumbents so the attached-tool
//! count stays under control. A background reconciler keeps the vector
//! store's catalog — including tools federated through MCP sub-servers —
//! converged with the agent platform's registry.
//!
//! ## Layer Structure
//!
//! ```text
//! presentation/   ← HTTP facade (axum)
//!     ↓
//! application/    ← curation engine, semantic search, catalog sync
//!     ↓
//! domain/         ← tool/agent value objects, outcomes, error taxonomy
//!     ↓
//! infrastructure/ ← platform client, vector store client, file caches
//! ```
//!
//! Integration tests live in `armory/tests/` and exercise the curation and
//! sync engines against mock remote seams.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use config::ArmoryConfig;
pub use domain::*;
