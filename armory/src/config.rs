// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Service configuration, collected once at startup from the environment so
//! container deployments can override every knob without a config file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

/// Everything the service needs to start.
#[derive(Debug, Clone)]
pub struct ArmoryConfig {
    /// Agent platform base URL (normalized by the client to end in `/v1`).
    pub platform_url: String,
    /// Shared secret forwarded verbatim to the platform.
    pub platform_secret: String,
    /// Embedding-provider key (vectorizer header + direct fallback).
    pub embedding_api_key: Option<String>,
    pub vector_http_host: String,
    pub vector_http_port: u16,
    pub vector_grpc_host: String,
    pub vector_grpc_port: u16,
    pub cache_dir: PathBuf,
    pub sync_interval: Duration,
    pub default_drop_rate: f64,
    pub clear_on_startup: bool,
    pub port: u16,
}

impl ArmoryConfig {
    /// Read configuration from the process environment. Fails when the
    /// shared secret is absent or a numeric knob cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let platform_secret = match std::env::var("ARMORY_PLATFORM_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => bail!("ARMORY_PLATFORM_SECRET is not set; platform calls cannot be authorized"),
        };

        let vector_http_host = env_or("ARMORY_VECTOR_HTTP_HOST", "weaviate");
        let config = Self {
            platform_url: env_or("ARMORY_PLATFORM_URL", "http://localhost:8283/v1"),
            platform_secret,
            embedding_api_key: std::env::var("ARMORY_EMBEDDING_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            vector_http_port: parse_env("ARMORY_VECTOR_HTTP_PORT", 8080)?,
            vector_grpc_host: env_or("ARMORY_VECTOR_GRPC_HOST", &vector_http_host),
            vector_grpc_port: parse_env("ARMORY_VECTOR_GRPC_PORT", 50051)?,
            vector_http_host,
            cache_dir: PathBuf::from(env_or("ARMORY_CACHE_DIR", "./runtime_cache")),
            sync_interval: Duration::from_secs(parse_env("ARMORY_SYNC_INTERVAL_SECS", 300u64)?),
            default_drop_rate: parse_env("ARMORY_DEFAULT_DROP_RATE", 0.1f64)?,
            clear_on_startup: env_flag("ARMORY_CLEAR_ON_STARTUP"),
            port: parse_env("ARMORY_PORT", 3001)?,
        };

        if !(0.0..=1.0).contains(&config.default_drop_rate) {
            bail!(
                "ARMORY_DEFAULT_DROP_RATE must be within [0, 1], got {}",
                config.default_drop_rate
            );
        }
        Ok(config)
    }

    pub fn tool_cache_path(&self) -> PathBuf {
        self.cache_dir.join("tool_cache.json")
    }

    pub fn mcp_servers_cache_path(&self) -> PathBuf {
        self.cache_dir.join("mcp_servers_cache.json")
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.is_empty() => match raw.parse() {
            Ok(value) => Ok(value),
            Err(e) => bail!("invalid value for {key}: '{raw}' ({e})"),
        },
        _ => Ok(default),
    }
}

fn env_flag(key: &str) -> bool {
    match std::env::var(key) {
        Ok(raw) => matches!(raw.to_lowercase().as_str(), "true" | "1" | "yes" | "on"),
        Err(_) => false,
    }
}
