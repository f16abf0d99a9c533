//! Per-job progress/status tracking and the progress pub/sub channel used to
//! fan events out to the Realtime Hub: spec.md §4.5, §4.6, §4.8.

use chrono::Utc;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vms_models::{RealtimeEvent, VideoId};

use crate::error::QueueResult;

const HEARTBEAT_PREFIX: &str = "vms:heartbeat:";
const STATUS_PREFIX: &str = "vms:jobstatus:";
const PROGRESS_CHANNEL_PREFIX: &str = "vms:progress:";

/// Worker heartbeat TTL. A job whose heartbeat lapses this long is returned
/// to waiting by the stalled-job reconciliation task (spec.md §4.5).
pub const HEARTBEAT_TTL_SECS: u64 = 60;

const STATUS_TTL_SECS: u64 = 86_400;

/// Queue-level job lifecycle: waiting -> active -> {completed,
/// failed-retrying, failed-terminal}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    FailedRetrying,
    FailedTerminal,
}

/// `status(job_id) -> {state, progress, result?, failure_reason?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusCache {
    pub video_id: VideoId,
    pub state: JobState,
    pub progress: u8,
    pub attempt: u32,
    pub failure_reason: Option<String>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl JobStatusCache {
    pub fn new(video_id: VideoId) -> Self {
        Self {
            video_id,
            state: JobState::Waiting,
            progress: 0,
            attempt: 0,
            failure_reason: None,
            updated_at: Utc::now(),
        }
    }
}

/// Aggregate job counts by state, for `stats()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed_retrying: u64,
    pub failed_terminal: u64,
}

/// Redis-backed progress/status/heartbeat tracker, shared by the worker
/// (writer) and the API's realtime hub (reader/subscriber).
#[derive(Clone)]
pub struct ProgressChannel {
    client: redis::Client,
}

impl ProgressChannel {
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    fn channel_name(video_id: &VideoId) -> String {
        format!("{PROGRESS_CHANNEL_PREFIX}{video_id}")
    }

    /// Publish a realtime event for a video's processing attempt. Callers
    /// (the worker) are responsible for only emitting non-decreasing
    /// progress within a single attempt.
    pub async fn publish(&self, video_id: &VideoId, event: &RealtimeEvent) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let channel = Self::channel_name(video_id);
        let payload = serde_json::to_string(event)?;
        debug!(%video_id, channel = %channel, "publishing progress event");
        conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }

    /// Subscribe to the realtime events published for one video. Used by the
    /// API process to bridge queue-side progress into hub room broadcasts.
    pub async fn subscribe(
        &self,
        video_id: &VideoId,
    ) -> QueueResult<std::pin::Pin<Box<dyn futures_util::Stream<Item = RealtimeEvent> + Send>>>
    {
        use futures_util::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(Self::channel_name(video_id)).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }

    /// Subscribe to every video's progress events via a pattern match, used
    /// by the hub to bridge all worker output without per-video
    /// subscriptions.
    pub async fn subscribe_all(
        &self,
    ) -> QueueResult<std::pin::Pin<Box<dyn futures_util::Stream<Item = RealtimeEvent> + Send>>>
    {
        use futures_util::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub
            .psubscribe(format!("{PROGRESS_CHANNEL_PREFIX}*"))
            .await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }

    pub async fn heartbeat(&self, video_id: &VideoId) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{HEARTBEAT_PREFIX}{video_id}");
        conn.set_ex::<_, _, ()>(&key, Utc::now().timestamp(), HEARTBEAT_TTL_SECS)
            .await?;
        Ok(())
    }

    pub async fn is_alive(&self, video_id: &VideoId) -> QueueResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{HEARTBEAT_PREFIX}{video_id}");
        Ok(conn.exists(&key).await?)
    }

    pub async fn clear_heartbeat(&self, video_id: &VideoId) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{HEARTBEAT_PREFIX}{video_id}");
        conn.del::<_, ()>(&key).await?;
        Ok(())
    }

    pub async fn set_status(&self, status: &JobStatusCache) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{STATUS_PREFIX}{}", status.video_id);
        let payload = serde_json::to_string(status)?;
        conn.set_ex::<_, _, ()>(&key, payload, STATUS_TTL_SECS)
            .await?;
        Ok(())
    }

    pub async fn get_status(&self, video_id: &VideoId) -> QueueResult<Option<JobStatusCache>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{STATUS_PREFIX}{video_id}");
        let value: Option<String> = conn.get(&key).await?;
        Ok(value.and_then(|s| serde_json::from_str(&s).ok()))
    }

    /// Scan cached statuses for entries in `Active` state whose heartbeat
    /// has lapsed, used by the stalled-job reconciliation task.
    pub async fn find_stalled(&self, candidates: &[VideoId]) -> QueueResult<Vec<VideoId>> {
        let mut stalled = Vec::new();
        for video_id in candidates {
            if let Some(status) = self.get_status(video_id).await? {
                if status.state == JobState::Active && !self.is_alive(video_id).await? {
                    stalled.push(video_id.clone());
                }
            }
        }
        Ok(stalled)
    }
}
