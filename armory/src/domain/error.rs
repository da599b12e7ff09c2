// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Error taxonomy for remote calls.
//!
//! The client layer maps HTTP failures into [`RemoteError`] variants; the
//! engines never retry — retry lives in the clients, driven by
//! [`RemoteError::is_retryable`]. Batch operations never propagate these as
//! failures of the batch: each item's error is captured in its own outcome.

use std::time::Duration;

/// A failure talking to the agent platform, the vector store, or the
/// embedding provider.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The remote system denies knowledge of the entity (HTTP 404).
    /// Per-operation semantics apply: a detach 404 is recovered as success.
    #[error("not found: {0}")]
    NotFound(String),

    /// The mutation conflicts with current remote state (HTTP 409), e.g.
    /// attaching a tool that is already attached. Treated as success by
    /// mutation call sites.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Connection-level failure or timeout; retryable.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete within the per-request budget.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The remote answered with a terminal status (4xx other than 404/409,
    /// or 5xx after retries are exhausted).
    #[error("remote API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded into the expected shape.
    #[error("malformed remote response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Transport problems and server-side errors are worth retrying;
    /// everything else is terminal for the attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport(_) | RemoteError::Timeout(_) => true,
            RemoteError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Classify a reqwest failure, preserving the timeout distinction.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout(Duration::from_secs(0))
        } else if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}
