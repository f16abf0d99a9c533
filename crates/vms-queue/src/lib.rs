//! Job Queue: a durable FIFO with priority-free retries, backed by Redis
//! Streams with a consumer group, plus Redis Pub/Sub progress fan-out and a
//! job-status cache. Spec.md §4.5.

pub mod error;
pub mod job;
pub mod progress;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::QueueJob;
pub use progress::{JobState, JobStatusCache, ProgressChannel, QueueStats, HEARTBEAT_TTL_SECS};
pub use queue::{JobQueue, QueueConfig};
