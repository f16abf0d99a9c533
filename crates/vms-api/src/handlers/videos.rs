//! Video API handlers: spec.md §4.4, §6.

use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vms_firestore::{VideoListFilter, VideoRepository};
use vms_models::{ProcessingJob, SensitivityStatus, Video, VideoId, VideoStatus, Visibility};
use vms_queue::QueueJob;

use crate::access::{authorize_video_read, authorize_video_write, require_role};
use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::security::{validate_description, validate_format, validate_size, validate_title};
use crate::state::AppState;

/// Client-facing Video shape: the full document minus nothing sensitive
/// lives on Video itself, so this is a thin pass-through wrapper kept
/// distinct from the document type in case the two need to diverge later.
#[derive(Debug, Serialize)]
pub struct VideoResponse {
    #[serde(flatten)]
    pub video: Video,
}

impl From<Video> for VideoResponse {
    fn from(video: Video) -> Self {
        Self { video }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginationResponse {
    pub page: u32,
    pub limit: u32,
    pub total: u32,
}

#[derive(Debug, Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<Video>,
    pub pagination: PaginationResponse,
}

#[derive(Debug, Deserialize)]
pub struct ListVideosQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub sensitivity_status: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VideoStatusResponse {
    pub status: VideoStatus,
    pub progress: u8,
    pub sensitivity_status: SensitivityStatus,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<String>,
}

/// `POST /api/videos`: multipart upload. Accepts fields `video` (the file),
/// `title`, `description` (optional), `visibility` (optional, defaults to
/// `organization`).
pub async fn create_video(
    State(state): State<AppState>,
    ctx: AuthContext,
    mut multipart: Multipart,
) -> ApiResult<(axum::http::StatusCode, Json<VideoResponse>)> {
    require_role(&ctx, &[vms_models::Role::Editor, vms_models::Role::Admin])?;

    let (org_repo, _user_repo, video_repo) = crate::auth::firestore_repos(&state.firestore);
    let organization = org_repo
        .get(&ctx.tenant_id)
        .await?
        .ok_or_else(|| ApiError::internal("organization for authenticated tenant is missing"))?;

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut original_filename = String::new();
    let mut title = String::new();
    let mut description = String::new();
    let mut visibility = Visibility::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "video" => {
                original_filename = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to read uploaded file: {e}")))?;
                file_bytes = Some(data.to_vec());
            }
            "title" => {
                title = field.text().await.unwrap_or_default();
            }
            "description" => {
                description = field.text().await.unwrap_or_default();
            }
            "visibility" => {
                let raw = field.text().await.unwrap_or_default();
                visibility = Visibility::parse(&raw)
                    .ok_or_else(|| ApiError::bad_request("visibility must be private, organization, or public"))?;
            }
            _ => {}
        }
    }

    let file_bytes = file_bytes.ok_or_else(|| ApiError::bad_request("missing video file field"))?;

    validate_title(&title).map_err(ApiError::bad_request)?;
    validate_description(&description).map_err(ApiError::bad_request)?;
    let format = validate_format(&original_filename, &organization.settings.allowed_formats)
        .map_err(ApiError::bad_request)?;
    validate_size(file_bytes.len() as u64, organization.settings.max_video_size_mb)
        .map_err(ApiError::bad_request)?;

    let video_id = VideoId::new();
    let storage_key = vms_storage::video_storage_key(video_id.as_str());

    state
        .storage
        .upload_bytes(file_bytes.clone(), &storage_key, content_type_for(&format))
        .await?;

    let mut video = Video::new_uploaded(
        title,
        description,
        original_filename,
        storage_key.clone(),
        file_bytes.len() as u64,
        format,
        ctx.tenant_id.clone(),
        ctx.subject_id.clone(),
        visibility,
    );
    video.id = video_id.clone();

    if let Err(e) = video_repo.create(&video).await {
        warn!(video_id = %video_id, error = %e, "failed to create video row after blob upload, deleting blob");
        let _ = state.storage.delete_object(&storage_key).await;
        return Err(ApiError::from(e));
    }

    if let Err(e) = state.queue.enqueue(QueueJob::ProcessVideo(ProcessingJob::new(video_id.clone()))).await {
        warn!(video_id = %video_id, error = %e, "failed to enqueue processing job after video row was created");
        let _ = video_repo.delete(&video_id).await;
        let _ = state.storage.delete_object(&storage_key).await;
        return Err(ApiError::from(e));
    }

    info!(video_id = %video_id, organization_id = %ctx.tenant_id, "video uploaded, processing enqueued");
    Ok((axum::http::StatusCode::CREATED, Json(video.into())))
}

/// `GET /api/videos`: tenant-scoped, filtered, paginated listing.
pub async fn list_videos(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(q): Query<ListVideosQuery>,
) -> ApiResult<Json<VideoListResponse>> {
    let (_org_repo, _user_repo, video_repo) = crate::auth::firestore_repos(&state.firestore);

    let status = q
        .status
        .as_deref()
        .map(parse_video_status)
        .transpose()?;
    let sensitivity_status = q
        .sensitivity_status
        .as_deref()
        .map(parse_sensitivity_status)
        .transpose()?;

    let filter = VideoListFilter {
        status,
        sensitivity_status,
        search: q.search,
        sort_by: q.sort_by,
        descending: q.order.as_deref().map(|o| o.eq_ignore_ascii_case("desc")).unwrap_or(true),
        page: q.page.unwrap_or(1),
        limit: q.limit.unwrap_or(20),
    };

    let (videos, total) = video_repo.list_for_tenant(&ctx.tenant_id, &filter).await?;
    Ok(Json(VideoListResponse {
        videos,
        pagination: PaginationResponse {
            page: filter.page.max(1),
            limit: filter.limit.max(1),
            total,
        },
    }))
}

/// `GET /api/videos/:id`.
pub async fn get_video(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(video_id): Path<String>,
) -> ApiResult<Json<VideoResponse>> {
    let video = load_video(&state, &video_id).await?;
    authorize_video_read(&ctx, &video)?;
    Ok(Json(video.into()))
}

/// `PUT /api/videos/:id`: owner or admin only.
pub async fn update_video(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(video_id): Path<String>,
    Json(req): Json<UpdateVideoRequest>,
) -> ApiResult<Json<VideoResponse>> {
    let video = load_video(&state, &video_id).await?;
    authorize_video_write(&ctx, &video)?;

    if let Some(title) = &req.title {
        validate_title(title).map_err(ApiError::bad_request)?;
    }
    if let Some(description) = &req.description {
        validate_description(description).map_err(ApiError::bad_request)?;
    }
    let visibility = req
        .visibility
        .as_deref()
        .map(|v| Visibility::parse(v).ok_or_else(|| ApiError::bad_request("visibility must be private, organization, or public")))
        .transpose()?;

    let (_org_repo, _user_repo, video_repo) = crate::auth::firestore_repos(&state.firestore);
    video_repo
        .update_title_description_visibility(
            &video.id,
            req.title.as_deref(),
            req.description.as_deref(),
            visibility,
        )
        .await?;

    let updated = video_repo
        .get(&video.id)
        .await?
        .ok_or_else(|| ApiError::not_found("video not found"))?;
    Ok(Json(updated.into()))
}

/// `DELETE /api/videos/:id`: owner or admin only. Idempotent — a second
/// delete of an already-gone video is a 404, not an error surfaced from a
/// partially-completed first delete.
pub async fn delete_video(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(video_id): Path<String>,
) -> ApiResult<axum::http::StatusCode> {
    let video = load_video(&state, &video_id).await?;
    authorize_video_write(&ctx, &video)?;

    let (_org_repo, _user_repo, video_repo) = crate::auth::firestore_repos(&state.firestore);
    video_repo.delete(&video.id).await?;

    let mut keys = vec![video.storage_key.clone()];
    if let Some(thumb) = &video.thumbnail_key {
        keys.push(thumb.clone());
    }
    if let Err(e) = state.storage.delete_objects(&keys).await {
        warn!(video_id = %video.id, error = %e, "failed to delete one or more blobs for deleted video");
    }

    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// `GET /api/videos/:id/status`: lightweight polling endpoint.
pub async fn video_status(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(video_id): Path<String>,
) -> ApiResult<Json<VideoStatusResponse>> {
    let video = load_video(&state, &video_id).await?;
    authorize_video_read(&ctx, &video)?;
    Ok(Json(VideoStatusResponse {
        status: video.status,
        progress: video.processing_progress,
        sensitivity_status: video.sensitivity.status,
    }))
}

async fn load_video(state: &AppState, video_id: &str) -> ApiResult<Video> {
    let video_repo = VideoRepository::new((*state.firestore).clone());
    video_repo
        .get(&VideoId::from(video_id.to_string()))
        .await?
        .ok_or_else(|| ApiError::not_found("video not found"))
}

fn parse_video_status(s: &str) -> ApiResult<VideoStatus> {
    match s {
        "uploading" => Ok(VideoStatus::Uploading),
        "processing" => Ok(VideoStatus::Processing),
        "completed" => Ok(VideoStatus::Completed),
        "failed" => Ok(VideoStatus::Failed),
        other => Err(ApiError::bad_request(format!("unknown status filter: {other}"))),
    }
}

fn parse_sensitivity_status(s: &str) -> ApiResult<SensitivityStatus> {
    match s {
        "safe" => Ok(SensitivityStatus::Safe),
        "flagged" => Ok(SensitivityStatus::Flagged),
        other => Err(ApiError::bad_request(format!("unknown sensitivity_status filter: {other}"))),
    }
}

pub(crate) fn content_type_for(format: &str) -> &'static str {
    match format {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}
