//! Background worker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Background job worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the worker pool is started with the server.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of independent worker loops.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Sleep after finding the queue empty, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Sleep after a store connectivity error, in milliseconds.
    #[serde(default = "default_error_backoff")]
    pub error_backoff_ms: u64,
    /// Consecutive store errors tolerated silently before logging.
    #[serde(default = "default_error_log_threshold")]
    pub error_log_threshold: u32,
    /// Poll interval while waiting for another crawl of the same audit.
    #[serde(default = "default_crawl_gate_poll")]
    pub crawl_gate_poll_ms: u64,
    /// How long a claimed job is protected from reclaim.
    #[serde(default = "default_lock_duration")]
    pub lock_duration_seconds: u64,
    /// Claim ceiling for newly enqueued jobs.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    /// Interval between orphan-page reconciliation sweeps (0 disables).
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_seconds: u64,
    /// Minimum age of a Pending page without a live job before it is re-enqueued.
    #[serde(default = "default_orphan_grace")]
    pub orphan_grace_seconds: u64,
    /// How long shutdown waits for in-flight jobs.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl WorkerConfig {
    /// Claim lock duration as a [`Duration`].
    pub fn lock_duration(&self) -> Duration {
        Duration::from_secs(self.lock_duration_seconds)
    }

    /// Empty-queue poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Store-error backoff as a [`Duration`].
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// Crawl gate poll interval as a [`Duration`].
    pub fn crawl_gate_poll(&self) -> Duration {
        Duration::from_millis(self.crawl_gate_poll_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            worker_count: default_worker_count(),
            poll_interval_ms: default_poll_interval(),
            error_backoff_ms: default_error_backoff(),
            error_log_threshold: default_error_log_threshold(),
            crawl_gate_poll_ms: default_crawl_gate_poll(),
            lock_duration_seconds: default_lock_duration(),
            max_attempts: default_max_attempts(),
            reconcile_interval_seconds: default_reconcile_interval(),
            orphan_grace_seconds: default_orphan_grace(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_worker_count() -> usize {
    3
}

fn default_poll_interval() -> u64 {
    2_000
}

fn default_error_backoff() -> u64 {
    5_000
}

fn default_error_log_threshold() -> u32 {
    3
}

fn default_crawl_gate_poll() -> u64 {
    500
}

fn default_lock_duration() -> u64 {
    300
}

fn default_max_attempts() -> i32 {
    3
}

fn default_reconcile_interval() -> u64 {
    60
}

fn default_orphan_grace() -> u64 {
    600
}

fn default_shutdown_timeout() -> u64 {
    30
}
