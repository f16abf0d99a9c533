//! HTTP Router: spec.md §4.10. Composes middleware in the fixed order the
//! spec calls for: error envelope (via `ApiError`'s `IntoResponse`) ->
//! recovery (axum's per-request panic boundary) -> request logging -> CORS
//! -> body-size limit -> cookie parsing (per-extractor via
//! `axum_extra::CookieJar`) -> rate limiter (global, plus per-category
//! auth/upload limiters scoped to their route groups) -> auth -> role/
//! tenant/visibility guards (inside handlers, see `access`) -> handler.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::auth::{login, logout, me, refresh, register};
use crate::handlers::health::{health, ready};
use crate::handlers::stream::{stream_thumbnail, stream_video};
use crate::handlers::videos::{
    create_video, delete_video, get_video, list_videos, update_video, video_status,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    auth_rate_limit_middleware, cors_layer, rate_limit_middleware, request_id, request_logging,
    security_headers, upload_rate_limit_middleware, RateLimiterCache,
};
use crate::state::AppState;
use crate::ws::ws_connect;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let auth_routes = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_rate_limit_middleware,
        ));

    let me_route = Router::new().route("/auth/me", get(me));

    let video_routes = Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/:id", get(get_video))
        .route("/videos/:id", put(update_video))
        .route("/videos/:id", delete(delete_video))
        .route("/videos/:id/status", get(video_status));

    let upload_routes = Router::new()
        .route("/videos", post(create_video))
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            upload_rate_limit_middleware,
        ));

    let stream_routes = Router::new()
        .route("/stream/:id", get(stream_video))
        .route("/stream/:id/thumbnail", get(stream_thumbnail));

    // Global rate limiter applied to every `/api` route.
    let rate_limiter = std::sync::Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(auth_routes)
        .merge(me_route)
        .merge(video_routes)
        .merge(upload_routes)
        .merge(stream_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter.clone(),
            rate_limit_middleware,
        ));

    let realtime_routes = Router::new().route("/realtime", get(ws_connect));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes.merge(realtime_routes))
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&[state.config.frontend_origin.clone()]))
        .with_state(state)
}
