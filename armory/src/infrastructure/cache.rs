// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! File-backed JSON caches with mtime-driven in-memory coherency.
//!
//! Two instances exist per process: the tool catalog (a JSON array of
//! descriptors) and the MCP server map. The sync engine is the only writer;
//! request handlers are concurrent readers. Writes go to a temp file, are
//! fsynced, then renamed over the target — a reader that completes `read`
//! after a write observes exactly the written sequence, never a torn state,
//! without any cross-process locking.
//!
//! A read error of any kind (missing file, malformed JSON) yields the empty
//! value and resets the in-memory mirror, matching the degraded-but-alive
//! posture of the rest of the service.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// Snapshot of the in-memory mirror, for health reporting.
#[derive(Debug, Clone)]
pub struct MirrorStatus {
    pub loaded: bool,
    pub last_loaded: Option<DateTime<Utc>>,
}

struct Mirror<T> {
    value: Option<T>,
    loaded_mtime: Option<SystemTime>,
    loaded_at: Option<DateTime<Utc>>,
}

impl<T> Mirror<T> {
    fn reset(&mut self) {
        self.value = None;
        self.loaded_mtime = None;
        self.loaded_at = None;
    }
}

/// A JSON file with a shared in-memory mirror that reloads whenever the
/// file's mtime advances past the last-loaded mtime.
pub struct JsonFileCache<T> {
    path: PathBuf,
    mirror: RwLock<Mirror<T>>,
}

impl<T> JsonFileCache<T>
where
    T: Clone + Default + Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mirror: RwLock::new(Mirror { value: None, loaded_mtime: None, loaded_at: None }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cache, serving from memory unless `force_reload` is set, the
    /// mirror is empty, or the file has been rewritten since the last load.
    pub async fn read(&self, force_reload: bool) -> T {
        let current_mtime = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.modified().ok(),
            Err(_) => {
                tracing::warn!(path = %self.path.display(), "cache file not found, returning empty");
                self.mirror.write().await.reset();
                return T::default();
            }
        };

        {
            let mirror = self.mirror.read().await;
            if !force_reload && mirror.value.is_some() && !mtime_advanced(&mirror, current_mtime) {
                return mirror.value.clone().expect("checked above");
            }
        }

        let mut mirror = self.mirror.write().await;
        // Another reader may have reloaded while we waited for the lock.
        if !force_reload && mirror.value.is_some() && !mtime_advanced(&mirror, current_mtime) {
            return mirror.value.clone().expect("checked above");
        }

        match self.load_from_disk().await {
            Ok(value) => {
                tracing::info!(path = %self.path.display(), "loaded cache file");
                mirror.value = Some(value.clone());
                mirror.loaded_mtime = current_mtime;
                mirror.loaded_at = Some(Utc::now());
                value
            }
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "failed to read cache file, returning empty");
                mirror.reset();
                T::default()
            }
        }
    }

    /// Atomically replace the cache file: temp write, fsync, rename. The
    /// mirror is not touched — readers pick the change up via the advanced
    /// mtime, exactly as an out-of-process writer would be observed.
    pub async fn write(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating cache directory {}", parent.display()))?;
        }

        let payload = serde_json::to_vec_pretty(value).context("serializing cache payload")?;
        let tmp_path = self.path.with_extension("tmp");

        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        file.write_all(&payload).await.context("writing cache payload")?;
        file.sync_all().await.context("fsyncing cache file")?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("renaming {} into place", tmp_path.display()))?;

        tracing::info!(path = %self.path.display(), bytes = payload.len(), "cache file updated");
        Ok(())
    }

    /// Remove the backing file and reset the mirror (clear-on-startup).
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::info!(path = %self.path.display(), "removed cache file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("removing {}", self.path.display())),
        }
        self.mirror.write().await.reset();
        Ok(())
    }

    /// Mirror state without touching the disk.
    pub async fn mirror_status(&self) -> MirrorStatus {
        let mirror = self.mirror.read().await;
        MirrorStatus { loaded: mirror.value.is_some(), last_loaded: mirror.loaded_at }
    }

    /// The in-memory copy, if one is loaded. Never reloads.
    pub async fn mirror(&self) -> Option<T> {
        self.mirror.read().await.value.clone()
    }

    /// Read and parse the file directly, bypassing the mirror, and report
    /// how many entries it holds. Used by the health probe.
    pub async fn probe_file(&self) -> Result<usize> {
        let raw = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        let value: serde_json::Value = serde_json::from_slice(&raw).context("parsing cache JSON")?;
        let len = match &value {
            serde_json::Value::Array(items) => items.len(),
            serde_json::Value::Object(map) => map.len(),
            _ => 0,
        };
        Ok(len)
    }

    async fn load_from_disk(&self) -> Result<T> {
        let raw = tokio::fs::read(&self.path).await.context("reading cache file")?;
        serde_json::from_slice(&raw).context("parsing cache JSON")
    }
}

fn mtime_advanced<T>(mirror: &Mirror<T>, current: Option<SystemTime>) -> bool {
    match (mirror.loaded_mtime, current) {
        (Some(loaded), Some(current)) => current > loaded,
        // Unknown mtimes force a reload rather than risk staleness.
        _ => true,
    }
}
