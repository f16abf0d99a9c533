//! Job Queue: a durable FIFO with retries, backed by Redis Streams with a
//! consumer group. Spec.md §4.5.

use std::time::Duration;

use redis::AsyncCommands;
use tracing::{debug, info, warn};

use vms_models::VideoId;

use crate::error::{QueueError, QueueResult};
use crate::job::QueueJob;

/// Job settings: max attempts = 3, exponential backoff starting at 5s,
/// timeout per attempt ~5 min, retain last N completed / last M failed.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    pub stream_name: String,
    pub consumer_group: String,
    pub dlq_stream_name: String,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub attempt_timeout: Duration,
    pub retain_completed: u64,
    pub retain_failed: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vms:jobs".to_string(),
            consumer_group: "vms:workers".to_string(),
            dlq_stream_name: "vms:dlq".to_string(),
            max_attempts: 3,
            backoff_base: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(300),
            retain_completed: 1000,
            retain_failed: 1000,
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("REDIS_URL") {
            cfg.redis_url = v;
        }
        if let Ok(v) = std::env::var("QUEUE_STREAM") {
            cfg.stream_name = v;
        }
        if let Ok(v) = std::env::var("QUEUE_CONSUMER_GROUP") {
            cfg.consumer_group = v;
        }
        if let Ok(v) = std::env::var("QUEUE_DLQ_STREAM") {
            cfg.dlq_stream_name = v;
        }
        if let Ok(v) = std::env::var("QUEUE_MAX_ATTEMPTS").ok().and_then(|s| s.parse().ok()) {
            cfg.max_attempts = v;
        }
        if let Ok(v) = std::env::var("QUEUE_BACKOFF_BASE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            cfg.backoff_base = Duration::from_secs(v);
        }
        if let Ok(v) = std::env::var("QUEUE_ATTEMPT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            cfg.attempt_timeout = Duration::from_secs(v);
        }
        cfg
    }

    /// attempt k (1-indexed) waits `backoff_base * 2^(k-1)` before
    /// re-entering waiting.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

/// Redis Streams-backed job queue.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Create the consumer group if it does not already exist.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!(group = %self.config.consumer_group, "created consumer group"),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(group = %self.config.consumer_group, "consumer group already exists");
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Enqueue a processing job for a video. Deduplicated per video id: a
    /// second enqueue while one is already in flight is rejected rather than
    /// creating a concurrent attempt for the same video.
    pub async fn enqueue(&self, job: QueueJob) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(&job)?;
        let dedup_key = format!("vms:dedup:{}", job.idempotency_key());

        let exists: bool = conn.exists(&dedup_key).await?;
        if exists {
            warn!(key = %job.idempotency_key(), "duplicate job rejected");
            return Err(QueueError::enqueue_failed("duplicate job"));
        }

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        conn.set_ex::<_, _, ()>(&dedup_key, "1", self.config.attempt_timeout.as_secs() * 10)
            .await?;

        info!(video_id = %job.video_id(), message_id = %message_id, "enqueued job");
        Ok(message_id)
    }

    /// Clear the dedup key, allowing the video to be requeued (called after
    /// terminal completion or failure).
    pub async fn clear_dedup(&self, job: &QueueJob) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let dedup_key = format!("vms:dedup:{}", job.idempotency_key());
        conn.del::<_, ()>(&dedup_key).await?;
        Ok(())
    }

    /// Consume up to `count` new jobs, blocking for `block_ms`.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();
        for stream_key in result.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();
                if let Some(redis::Value::BulkString(payload)) = entry.map.get("job") {
                    let payload_str = String::from_utf8_lossy(payload);
                    match serde_json::from_str::<QueueJob>(&payload_str) {
                        Ok(job) => jobs.push((message_id, job)),
                        Err(e) => {
                            warn!(error = %e, "failed to parse job payload, acking to drop");
                            self.ack(&message_id).await.ok();
                        }
                    }
                }
            }
        }
        Ok(jobs)
    }

    /// Claim messages idle longer than `min_idle_ms` from crashed consumers,
    /// returning them to this consumer for (re)processing.
    pub async fn claim_stalled(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pending_details: Vec<Vec<redis::Value>> = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut to_claim = Vec::new();
        for detail in pending_details {
            if let (Some(redis::Value::BulkString(id_bytes)), Some(redis::Value::Int(idle_ms))) =
                (detail.get(0), detail.get(2))
            {
                if *idle_ms as u64 >= min_idle_ms {
                    if let Ok(id) = String::from_utf8(id_bytes.clone()) {
                        to_claim.push(id);
                    }
                }
            }
        }

        if to_claim.is_empty() {
            return Ok(Vec::new());
        }

        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms);
        for id in &to_claim {
            cmd.arg(id);
        }

        let claimed: Vec<Vec<redis::Value>> = cmd.query_async(&mut conn).await?;
        let mut jobs = Vec::new();
        for message in claimed {
            if let (Some(redis::Value::BulkString(id_bytes)), Some(redis::Value::Array(fields))) =
                (message.get(0), message.get(1))
            {
                if let Ok(message_id) = String::from_utf8(id_bytes.clone()) {
                    let mut i = 0;
                    while i + 1 < fields.len() {
                        if let (
                            Some(redis::Value::BulkString(field)),
                            Some(redis::Value::BulkString(value)),
                        ) = (fields.get(i), fields.get(i + 1))
                        {
                            if field == b"job" {
                                if let Ok(payload) = String::from_utf8(value.clone()) {
                                    if let Ok(job) = serde_json::from_str::<QueueJob>(&payload) {
                                        jobs.push((message_id.clone(), job));
                                    }
                                }
                                break;
                            }
                        }
                        i += 2;
                    }
                }
            }
        }
        Ok(jobs)
    }

    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;
        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Move a terminally-failed job to the dead letter stream, retaining at
    /// most `retain_failed` entries.
    pub async fn dlq(&self, message_id: &str, job: &QueueJob, error: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(job)?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.config.retain_failed)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;
        warn!(video_id = %job.video_id(), error = %error, "moved job to DLQ");
        Ok(())
    }

    /// Record a completed job, retaining at most `retain_completed` entries.
    pub async fn record_completed(&self, message_id: &str, job: &QueueJob) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let completed_stream = format!("{}:completed", self.config.stream_name);
        let payload = serde_json::to_string(job)?;
        redis::cmd("XADD")
            .arg(&completed_stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.config.retain_completed)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .query_async::<()>(&mut conn)
            .await?;
        self.ack(message_id).await?;
        Ok(())
    }

    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn.xlen(&self.config.stream_name).await?)
    }

    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn.xlen(&self.config.dlq_stream_name).await?)
    }

    pub async fn get_retry_count(&self, video_id: &VideoId) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("vms:retry:{video_id}");
        Ok(conn.get::<_, Option<u32>>(&key).await?.unwrap_or(0))
    }

    pub async fn increment_retry(&self, video_id: &VideoId) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("vms:retry:{video_id}");
        let count: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, 86_400).await?;
        Ok(count)
    }

    pub async fn clear_retry_count(&self, video_id: &VideoId) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("vms:retry:{video_id}");
        conn.del::<_, ()>(&key).await?;
        Ok(())
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let cfg = QueueConfig::default();
        assert_eq!(cfg.backoff_for_attempt(1), Duration::from_secs(5));
        assert_eq!(cfg.backoff_for_attempt(2), Duration::from_secs(10));
        assert_eq!(cfg.backoff_for_attempt(3), Duration::from_secs(20));
    }
}
