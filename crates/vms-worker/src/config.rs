//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Concurrent job slots (spec.md §5 default: 3).
    pub concurrency: usize,
    /// Scratch directory the worker downloads originals into before
    /// probing/generating a thumbnail.
    pub work_dir: String,
    /// How often an in-flight job refreshes its heartbeat.
    pub heartbeat_interval: Duration,
    /// How often the worker scans for stalled jobs to reclaim.
    pub claim_interval: Duration,
    /// Minimum idle time (in the stream's pending entries list) before a job
    /// is eligible for reclamation from a crashed consumer.
    pub claim_min_idle: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            work_dir: "/tmp/vms-worker".to_string(),
            heartbeat_interval: Duration::from_secs(15),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_usize("WORKER_CONCURRENCY") {
            cfg.concurrency = v;
        }
        if let Ok(v) = std::env::var("WORKER_WORK_DIR") {
            cfg.work_dir = v;
        }
        if let Some(v) = env_secs("WORKER_HEARTBEAT_SECS") {
            cfg.heartbeat_interval = v;
        }
        if let Some(v) = env_secs("WORKER_CLAIM_INTERVAL_SECS") {
            cfg.claim_interval = v;
        }
        if let Some(v) = env_secs("WORKER_CLAIM_MIN_IDLE_SECS") {
            cfg.claim_min_idle = v;
        }
        cfg
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
}
