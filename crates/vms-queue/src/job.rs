//! Queue envelope around `vms_models::ProcessingJob`.

use serde::{Deserialize, Serialize};
use vms_models::ProcessingJob;

/// The queue currently carries a single job kind. Wrapped in an enum (rather
/// than enqueuing `ProcessingJob` directly) so new job kinds can be added
/// later without changing the wire format of existing ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum QueueJob {
    ProcessVideo(ProcessingJob),
}

impl QueueJob {
    pub fn video_id(&self) -> &vms_models::VideoId {
        match self {
            QueueJob::ProcessVideo(job) => &job.video_id,
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::ProcessVideo(job) => job.idempotency_key(),
        }
    }
}
