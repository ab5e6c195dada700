// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Restrict watches to a single namespace, all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Periodic requeue of every workload, independent of watch events
    pub resync_interval: Duration,
    /// Delay before retrying a workload after an optimistic concurrency conflict
    pub conflict_requeue: Duration,
    pub error_backoff_base: Duration,
    pub error_backoff_max: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            watch_namespace: None,
            resync_interval: Duration::from_secs(600),
            conflict_requeue: Duration::from_secs(1),
            error_backoff_base: Duration::from_secs(5),
            error_backoff_max: Duration::from_secs(300),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        let watch_namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        let config = Config {
            watch_namespace,
            resync_interval: secs(&lookup, "RESYNC_INTERVAL_SECS", defaults.resync_interval)?,
            conflict_requeue: secs(&lookup, "CONFLICT_REQUEUE_SECS", defaults.conflict_requeue)?,
            error_backoff_base: secs(&lookup, "ERROR_BACKOFF_BASE_SECS", defaults.error_backoff_base)?,
            error_backoff_max: secs(&lookup, "ERROR_BACKOFF_MAX_SECS", defaults.error_backoff_max)?,
        };

        if config.error_backoff_max < config.error_backoff_base {
            anyhow::bail!("ERROR_BACKOFF_MAX_SECS must not be lower than ERROR_BACKOFF_BASE_SECS");
        }

        Ok(config)
    }
}

fn secs(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: Duration) -> Result<Duration> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .with_context(|| format!("{} must be a whole number of seconds, got '{}'", name, value)),
        None => Ok(default),
    }
}
