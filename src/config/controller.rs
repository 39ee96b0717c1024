//! Controller configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::model::DEFAULT_GROUP_LABEL;
use crate::core::work_queue::ExponentialBackoff;

/// Default age beyond which a non-terminal group is left alone (48h).
pub const DEFAULT_STALE_THRESHOLD_SECS: u64 = 48 * 60 * 60;

/// Default retry limit per key before the error is only logged.
pub const DEFAULT_MAX_RETRIES: u32 = 15;

/// Default re-read attempts on a status-update conflict.
pub const DEFAULT_CONFLICT_RETRIES: u32 = 5;

/// Environment variable prefix read by [`ControllerConfig::from_env`].
pub const ENV_PREFIX: &str = "GANG_";

/// Configuration for the group-status reconciliation controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Parallel reconcile workers.
    pub worker_count: usize,
    /// Maximum group age, in seconds, for reconciliation.
    pub stale_threshold_secs: u64,
    /// Label on members naming their group.
    pub group_label: String,
    /// Namespace to watch; `None` watches all namespaces.
    pub namespace: Option<String>,
    /// Backoff requeues per key before giving up.
    pub max_retries: u32,
    /// Re-read-and-recompute attempts on a version conflict.
    pub conflict_retries: u32,
    /// First backoff delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub backoff_max_ms: u64,
    /// Stack size for worker threads.
    pub thread_stack_size: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().clamp(1, 8),
            stale_threshold_secs: DEFAULT_STALE_THRESHOLD_SECS,
            group_label: DEFAULT_GROUP_LABEL.to_string(),
            namespace: None,
            max_retries: DEFAULT_MAX_RETRIES,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
            backoff_base_ms: 5,
            backoff_max_ms: 60_000,
            thread_stack_size: 2 * 1024 * 1024,
        }
    }
}

impl ControllerConfig {
    /// Defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the staleness threshold.
    #[must_use]
    pub const fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold_secs = threshold.as_secs();
        self
    }

    /// Set the group label key.
    #[must_use]
    pub fn with_group_label(mut self, label: impl Into<String>) -> Self {
        self.group_label = label.into();
        self
    }

    /// Restrict to one namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the per-key retry limit.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the conflict retry limit.
    #[must_use]
    pub const fn with_conflict_retries(mut self, conflict_retries: u32) -> Self {
        self.conflict_retries = conflict_retries;
        self
    }

    /// Set backoff bounds.
    #[must_use]
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        self.backoff_max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Staleness threshold as a duration.
    #[must_use]
    pub const fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }

    /// Backoff policy for the work queue.
    #[must_use]
    pub const fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.stale_threshold_secs == 0 {
            return Err("stale_threshold_secs must be greater than 0".into());
        }
        if self.group_label.trim().is_empty() {
            return Err("group_label must not be empty".into());
        }
        if self.namespace.as_deref().is_some_and(str::is_empty) {
            return Err("namespace must not be empty when set".into());
        }
        if self.backoff_base_ms == 0 {
            return Err("backoff_base_ms must be greater than 0".into());
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err("backoff_max_ms must be at least backoff_base_ms".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `GANG_*` environment variables, loading a
    /// `.env` file first if present.
    ///
    /// Recognised: `GANG_WORKER_COUNT`, `GANG_STALE_THRESHOLD_SECS`,
    /// `GANG_GROUP_LABEL`, `GANG_NAMESPACE`, `GANG_MAX_RETRIES`,
    /// `GANG_CONFLICT_RETRIES`, `GANG_BACKOFF_BASE_MS`, `GANG_BACKOFF_MAX_MS`,
    /// `GANG_THREAD_STACK_SIZE`.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or the
    /// validation failure.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`ControllerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, String>
        where
            T::Err: std::fmt::Display,
        {
            raw.trim()
                .parse()
                .map_err(|e| format!("{ENV_PREFIX}{name}: {e}"))
        }

        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut cfg = Self::default();

        if let Some(v) = get("WORKER_COUNT") {
            cfg.worker_count = parse("WORKER_COUNT", &v)?;
        }
        if let Some(v) = get("STALE_THRESHOLD_SECS") {
            cfg.stale_threshold_secs = parse("STALE_THRESHOLD_SECS", &v)?;
        }
        if let Some(v) = get("GROUP_LABEL") {
            cfg.group_label = v;
        }
        if let Some(v) = get("NAMESPACE") {
            cfg.namespace = Some(v).filter(|ns| !ns.is_empty());
        }
        if let Some(v) = get("MAX_RETRIES") {
            cfg.max_retries = parse("MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("CONFLICT_RETRIES") {
            cfg.conflict_retries = parse("CONFLICT_RETRIES", &v)?;
        }
        if let Some(v) = get("BACKOFF_BASE_MS") {
            cfg.backoff_base_ms = parse("BACKOFF_BASE_MS", &v)?;
        }
        if let Some(v) = get("BACKOFF_MAX_MS") {
            cfg.backoff_max_ms = parse("BACKOFF_MAX_MS", &v)?;
        }
        if let Some(v) = get("THREAD_STACK_SIZE") {
            cfg.thread_stack_size = parse("THREAD_STACK_SIZE", &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}
