//! Job executor: consumes from the Job Queue with bounded concurrency and
//! reconciles stalled jobs. Spec.md §4.5, §4.6, §5.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vms_queue::{JobQueue, QueueJob};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::processor::{ProcessingContext, VideoProcessor};

/// Consumes jobs from the queue and runs them through [`VideoProcessor`]
/// with `config.concurrency` slots in flight at once.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
    video_processor: VideoProcessor,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: JobQueue) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.concurrency));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            job_semaphore,
            shutdown,
            consumer_name,
            video_processor: VideoProcessor::new(),
        }
    }

    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            consumer = %self.consumer_name,
            concurrency = self.config.concurrency,
            "starting job executor"
        );

        self.queue.init().await?;
        let ctx = Arc::new(ProcessingContext::new(&self.config).await?);

        let mut shutdown_rx = self.shutdown.subscribe();
        let claim_task = self.spawn_claim_task(Arc::clone(&ctx));

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs(&ctx) => {
                    if let Err(e) = result {
                        error!(error = %e, "error consuming jobs");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();
        info!("waiting for in-flight jobs to complete");
        let _ = tokio::time::timeout(Duration::from_secs(60), self.wait_for_jobs()).await;
        info!("job executor stopped");
        Ok(())
    }

    fn spawn_claim_task(&self, ctx: Arc<ProcessingContext>) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let consumer_name = self.consumer_name.clone();
        let semaphore = Arc::clone(&self.job_semaphore);
        let video_processor = self.video_processor.clone();
        let claim_interval = self.config.claim_interval;
        let min_idle_ms = self.config.claim_min_idle.as_millis() as u64;
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match queue.claim_stalled(&consumer_name, min_idle_ms, 5).await {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!(count = jobs.len(), "reclaimed stalled jobs");
                                for (message_id, job) in jobs {
                                    let ctx = Arc::clone(&ctx);
                                    let queue = Arc::clone(&queue);
                                    let video_processor = video_processor.clone();
                                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                                        break;
                                    };
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_job(ctx, queue, message_id, job, video_processor).await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "failed to scan for stalled jobs"),
                        }
                    }
                }
            }
        })
    }

    async fn consume_jobs(&self, ctx: &Arc<ProcessingContext>) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!(count = jobs.len(), "consumed jobs from queue");

        for (message_id, job) in jobs {
            let ctx = Arc::clone(ctx);
            let queue = Arc::clone(&self.queue);
            let video_processor = self.video_processor.clone();
            let permit = self
                .job_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("semaphore closed"))?;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(ctx, queue, message_id, job, video_processor).await;
            });
        }

        Ok(())
    }

    async fn execute_job(
        ctx: Arc<ProcessingContext>,
        queue: Arc<JobQueue>,
        message_id: String,
        job: QueueJob,
        video_processor: VideoProcessor,
    ) {
        let video_id = job.video_id().clone();
        info!(%video_id, "executing job");

        let QueueJob::ProcessVideo(ref inner) = job;
        let result = video_processor.process_video_job(&ctx, inner).await;

        match result {
            Ok(()) => {
                info!(%video_id, "job completed successfully");
                if let Err(e) = queue.record_completed(&message_id, &job).await {
                    error!(%video_id, error = %e, "failed to record completed job");
                }
                queue.clear_dedup(&job).await.ok();
                queue.clear_retry_count(&video_id).await.ok();
            }
            Err(WorkerError::VideoNotFound(_)) => {
                warn!(%video_id, "video missing, moving job straight to DLQ");
                queue.dlq(&message_id, &job, "video not found").await.ok();
                queue.clear_dedup(&job).await.ok();
            }
            Err(e) => {
                let retry_count = queue.increment_retry(&video_id).await.unwrap_or(u32::MAX);
                let max_attempts = queue.max_attempts();

                if retry_count >= max_attempts {
                    warn!(%video_id, attempts = retry_count, "job exceeded max attempts, moving to DLQ");
                    queue.dlq(&message_id, &job, &e.to_string()).await.ok();
                    queue.clear_dedup(&job).await.ok();
                    queue.clear_retry_count(&video_id).await.ok();
                } else {
                    let backoff = queue.config().backoff_for_attempt(retry_count);
                    info!(
                        %video_id,
                        attempt = retry_count,
                        max_attempts,
                        backoff_secs = backoff.as_secs(),
                        "job failed, will retry after reclamation"
                    );
                }
            }
        }
    }

    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.config.concurrency {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
