//! Stalled-job reconciliation: spec.md §4.5, §4.6.
//!
//! A worker that crashes mid-attempt leaves its video stuck in
//! `processing` with a heartbeat that stops renewing. This background
//! task periodically scans every video still `processing`, checks each
//! one's cached job status against its heartbeat, and for any whose
//! heartbeat has lapsed: marks the video `failed`, clears the heartbeat,
//! and publishes a `video:process:failed` event so connected clients stop
//! waiting on a job that will never resume. The worker's own
//! `claim_stalled` XCLAIM path handles the case where the queue message
//! itself can still be redelivered; this task instead covers a video
//! whose queue message was lost entirely (e.g. DLQ'd after exhausting
//! retries) but whose Firestore row is still `processing`.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};

use vms_firestore::{FirestoreClient, VideoRepository};
use vms_models::{RealtimeEvent, VideoId};
use vms_queue::ProgressChannel;

/// Interval between stale job detection runs.
const DETECTION_INTERVAL: Duration = Duration::from_secs(30);

/// Background stalled-job reconciliation service.
pub struct StaleJobDetector {
    progress: Arc<ProgressChannel>,
    firestore: Arc<FirestoreClient>,
    enabled: bool,
}

impl StaleJobDetector {
    pub fn new(progress: Arc<ProgressChannel>, firestore: Arc<FirestoreClient>) -> Self {
        let enabled = std::env::var("ENABLE_STALE_DETECTION")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Self {
            progress,
            firestore,
            enabled,
        }
    }

    /// Runs indefinitely; spawn as a background task.
    pub async fn run(&self) {
        if !self.enabled {
            info!("stale job detection disabled");
            return;
        }

        info!(interval = ?DETECTION_INTERVAL, "starting stale job detector");
        let mut ticker = interval(DETECTION_INTERVAL);

        loop {
            ticker.tick().await;
            if let Err(e) = self.detect_and_recover().await {
                error!(error = %e, "stale job detection cycle failed");
            }
        }
    }

    async fn detect_and_recover(&self) -> Result<(), vms_firestore::FirestoreError> {
        let video_repo = VideoRepository::new((*self.firestore).clone());
        let processing = video_repo.list_processing().await?;

        if processing.is_empty() {
            return Ok(());
        }

        let candidates: Vec<VideoId> = processing.iter().map(|v| v.id.clone()).collect();
        let stalled = match self.progress.find_stalled(&candidates).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "failed to scan for stalled jobs");
                return Ok(());
            }
        };

        for video_id in stalled {
            warn!(%video_id, "detected stalled job, no heartbeat");
            if let Err(e) = self.recover_stalled(&video_id, &video_repo).await {
                error!(%video_id, error = %e, "failed to recover stalled job");
            } else {
                info!(%video_id, "recovered stalled job");
            }
        }

        Ok(())
    }

    async fn recover_stalled(
        &self,
        video_id: &VideoId,
        video_repo: &VideoRepository,
    ) -> Result<(), vms_firestore::FirestoreError> {
        const MESSAGE: &str = "processing timed out; the worker may have crashed, please retry";

        video_repo.mark_failed(video_id).await?;

        self.progress
            .publish(
                video_id,
                &RealtimeEvent::VideoProcessFailed {
                    video_id: video_id.clone(),
                    error: MESSAGE.to_string(),
                },
            )
            .await
            .ok();

        self.progress.clear_heartbeat(video_id).await.ok();

        Ok(())
    }
}
