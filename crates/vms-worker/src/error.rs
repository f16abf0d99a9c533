//! Worker error types.

use thiserror::Error;
use vms_models::VideoId;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("video {0} not found")]
    VideoNotFound(VideoId),

    #[error("storage error: {0}")]
    Storage(#[from] vms_storage::StorageError),

    #[error("firestore error: {0}")]
    Firestore(#[from] vms_firestore::FirestoreError),

    #[error("media error: {0}")]
    Media(#[from] vms_media::MediaError),

    #[error("queue error: {0}")]
    Queue(#[from] vms_queue::QueueError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("job failed: {0}")]
    JobFailed(String),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }
}
