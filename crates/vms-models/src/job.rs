//! Processing Job queue payload: spec.md §3, §4.5.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::video::VideoId;

/// { video_id, enqueued_at }. Everything else (attempts, backoff, timeout,
/// retention) is queue policy carried by `vms-queue::QueueConfig`, not part
/// of the payload itself.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingJob {
    pub video_id: VideoId,
    pub enqueued_at: DateTime<Utc>,
}

impl ProcessingJob {
    pub fn new(video_id: VideoId) -> Self {
        Self {
            video_id,
            enqueued_at: Utc::now(),
        }
    }

    /// Jobs are deduplicated per video id: a second enqueue for a video
    /// already waiting/active is a no-op, matching "exactly one processing
    /// attempt in flight per video" from spec.md §4.5/§4.6.
    pub fn idempotency_key(&self) -> String {
        format!("process:{}", self.video_id)
    }
}
