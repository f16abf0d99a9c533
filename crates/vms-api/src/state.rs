//! Application state: the explicit, no-hidden-globals dependency bundle
//! spec.md §9 calls for — storage, document-store, queue, progress, and
//! token-service handles constructed once at bootstrap.

use std::sync::Arc;

use vms_firestore::FirestoreClient;
use vms_queue::{JobQueue, ProgressChannel};
use vms_storage::R2Client;

use crate::auth::TokenService;
use crate::config::ApiConfig;
use crate::middleware::{category_quota, CategoryRateLimiter};
use crate::ws::RealtimeHub;

/// Shared application state, cloned cheaply (everything behind an `Arc`)
/// into every request handler via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: Arc<R2Client>,
    pub firestore: Arc<FirestoreClient>,
    pub queue: Arc<JobQueue>,
    pub progress: Arc<ProgressChannel>,
    pub token_service: Arc<TokenService>,
    pub realtime: Arc<RealtimeHub>,
    /// Login/register/refresh attempt limiter, keyed by client IP: spec.md §4.10.
    pub auth_limiter: Arc<CategoryRateLimiter>,
    /// Upload attempt limiter, keyed by authenticated subject id (or IP as a
    /// fallback for unauthenticated requests): spec.md §4.10.
    pub upload_limiter: Arc<CategoryRateLimiter>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let storage = R2Client::from_env().await?;
        let firestore = FirestoreClient::from_env().await?;
        let queue = JobQueue::from_env()?;

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let progress = ProgressChannel::new(&redis_url)?;

        let token_service = TokenService::new(
            config.access_token_secret.clone(),
            config.refresh_token_secret.clone(),
            config.access_token_ttl,
            config.refresh_token_ttl,
        );

        let auth_limiter = CategoryRateLimiter::with_quota(category_quota(
            config.auth_rate_limit_attempts,
            config.auth_rate_limit_window,
        ));
        let upload_limiter = CategoryRateLimiter::with_quota(category_quota(
            config.upload_rate_limit_count,
            config.upload_rate_limit_window,
        ));

        Ok(Self {
            config,
            storage: Arc::new(storage),
            firestore: Arc::new(firestore),
            queue: Arc::new(queue),
            progress: Arc::new(progress),
            token_service: Arc::new(token_service),
            realtime: Arc::new(RealtimeHub::new()),
            auth_limiter: Arc::new(auth_limiter),
            upload_limiter: Arc::new(upload_limiter),
            started_at: chrono::Utc::now(),
        })
    }
}
