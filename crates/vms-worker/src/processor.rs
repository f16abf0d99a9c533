//! Processing pipeline: spec.md §4.6.
//!
//! Each job runs the five steps below against a single Video. Any failure
//! at any step marks the video `failed` and publishes
//! `video:process:failed`; the queue's retry policy decides whether the job
//! runs again, and each attempt restarts from step 1 with progress reset.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use vms_firestore::{FirestoreClient, VideoRepository};
use vms_models::job::ProcessingJob;
use vms_models::video::VideoStatus;
use vms_models::{RealtimeEvent, VideoId};
use vms_queue::ProgressChannel;
use vms_storage::R2Client;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::sensitivity;

/// Shared handles the processor needs for every job; built once per worker
/// process and reused across jobs.
pub struct ProcessingContext {
    pub videos: VideoRepository,
    pub storage: Arc<R2Client>,
    pub progress: Arc<ProgressChannel>,
    pub work_dir: PathBuf,
}

impl ProcessingContext {
    pub async fn new(config: &WorkerConfig) -> WorkerResult<Self> {
        let storage = R2Client::from_env().await?;
        let firestore = FirestoreClient::from_env().await?;
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let progress = ProgressChannel::new(&redis_url)?;

        Ok(Self {
            videos: VideoRepository::new(firestore),
            storage: Arc::new(storage),
            progress: Arc::new(progress),
            work_dir: PathBuf::from(&config.work_dir),
        })
    }
}

#[derive(Clone, Default)]
pub struct VideoProcessor;

impl VideoProcessor {
    pub fn new() -> Self {
        Self
    }

    pub async fn process_video_job(
        &self,
        ctx: &ProcessingContext,
        job: &ProcessingJob,
    ) -> WorkerResult<()> {
        let video_id = job.video_id.clone();

        let Some(video) = ctx.videos.get(&video_id).await? else {
            return Err(WorkerError::VideoNotFound(video_id));
        };

        tokio::fs::create_dir_all(&ctx.work_dir).await?;
        let work_path = ctx.work_dir.join(format!("{video_id}.src"));
        let thumb_path = ctx.work_dir.join(format!("{video_id}.jpg"));

        let result = self
            .run_pipeline(
                ctx,
                &video_id,
                &video.storage_key,
                video.file_size,
                &work_path,
                &thumb_path,
            )
            .await;

        let _ = tokio::fs::remove_file(&work_path).await;
        let _ = tokio::fs::remove_file(&thumb_path).await;

        if let Err(e) = &result {
            warn!(%video_id, error = %e, "processing job failed");
            ctx.videos
                .update_progress(&video_id, VideoStatus::Failed, 0)
                .await
                .ok();
            ctx.progress
                .publish(
                    &video_id,
                    &RealtimeEvent::VideoProcessFailed {
                        video_id: video_id.clone(),
                        error: e.to_string(),
                    },
                )
                .await
                .ok();
        }

        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_pipeline(
        &self,
        ctx: &ProcessingContext,
        video_id: &VideoId,
        storage_key: &str,
        file_size: u64,
        work_path: &PathBuf,
        thumb_path: &PathBuf,
    ) -> WorkerResult<()> {
        // Step 1: mark processing and reset progress, whether this is the
        // first attempt or a retry.
        ctx.videos
            .update_progress(video_id, VideoStatus::Processing, 0)
            .await?;
        self.emit_progress(ctx, video_id, 0, "starting", "processing started")
            .await;

        ctx.storage.download_file(storage_key, work_path).await?;

        // Step 2: probe metadata.
        let metadata = vms_media::probe_video(work_path).await?;
        ctx.videos.update_metadata(video_id, &metadata).await?;
        self.emit_progress(ctx, video_id, 18, "probing", "metadata extracted")
            .await;

        // Step 3: thumbnail. Failure here is logged, not fatal.
        match vms_media::generate_thumbnail(work_path, thumb_path).await {
            Ok(()) => match tokio::fs::read(thumb_path).await {
                Ok(bytes) => {
                    let key = vms_storage::thumbnail_storage_key(video_id.as_str());
                    match ctx.storage.upload_bytes(bytes, &key, "image/jpeg").await {
                        Ok(()) => {
                            ctx.videos.update_thumbnail_key(video_id, &key).await?;
                        }
                        Err(e) => warn!(%video_id, error = %e, "thumbnail upload failed"),
                    }
                }
                Err(e) => warn!(%video_id, error = %e, "failed to read generated thumbnail"),
            },
            Err(e) => warn!(%video_id, error = %e, "thumbnail generation failed"),
        }
        self.emit_progress(ctx, video_id, 35, "thumbnail", "thumbnail step complete")
            .await;

        // Step 4: sensitivity analysis.
        let sensitivity = sensitivity::analyze(&metadata, file_size);
        ctx.videos.update_sensitivity(video_id, &sensitivity).await?;
        self.emit_progress(ctx, video_id, 82, "sensitivity", "sensitivity analysis complete")
            .await;

        // Step 5: complete.
        ctx.videos.mark_completed(video_id).await?;
        let thumbnail_key = ctx.videos.get(video_id).await?.and_then(|v| v.thumbnail_key);
        ctx.progress
            .publish(
                video_id,
                &RealtimeEvent::VideoProcessComplete {
                    video_id: video_id.clone(),
                    status: VideoStatus::Completed.as_str().to_string(),
                    sensitivity,
                    thumbnail_key,
                    duration: metadata.duration_seconds,
                    resolution: metadata.resolution,
                },
            )
            .await
            .ok();

        info!(%video_id, "processing complete");
        Ok(())
    }

    async fn emit_progress(
        &self,
        ctx: &ProcessingContext,
        video_id: &VideoId,
        progress: u8,
        stage: &str,
        message: &str,
    ) {
        ctx.progress.heartbeat(video_id).await.ok();
        ctx.progress
            .publish(
                video_id,
                &RealtimeEvent::VideoProgress {
                    video_id: video_id.clone(),
                    progress,
                    stage: stage.to_string(),
                    message: message.to_string(),
                },
            )
            .await
            .ok();
    }
}
