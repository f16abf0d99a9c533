//! Streaming Handler: spec.md §4.9. Byte-range delivery of the original
//! video and its thumbnail, authenticated the same way as every other
//! route but additionally accepting the access token via a `token=` query
//! parameter (handled transparently by [`crate::auth::AuthContext`]) since
//! `<video>`/`<img>` elements cannot set an `Authorization` header.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::TryStreamExt;
use serde::Serialize;
use tracing::warn;

use vms_firestore::VideoRepository;
use vms_models::{Video, VideoId, VideoStatus};

use crate::access::authorize_video_read_optional;
use crate::auth::OptionalAuthContext;
use crate::error::{ApiError, ApiResult};
use crate::handlers::videos::content_type_for;
use crate::state::AppState;

const CACHE_CONTROL: &str = "public, max-age=31536000";

#[derive(Debug, Serialize)]
struct ProcessingPendingResponse {
    status: VideoStatus,
    progress: u8,
}

/// `GET /api/stream/:id`.
pub async fn stream_video(
    State(state): State<AppState>,
    OptionalAuthContext(ctx): OptionalAuthContext,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let video = load_video(&state, &video_id).await?;
    authorize_video_read_optional(ctx.as_ref(), &video)?;

    match video.status {
        VideoStatus::Completed => {}
        VideoStatus::Failed => {
            return Err(ApiError::internal("video processing failed"));
        }
        VideoStatus::Uploading | VideoStatus::Processing => {
            return Ok((
                StatusCode::ACCEPTED,
                Json(ProcessingPendingResponse {
                    status: video.status,
                    progress: video.processing_progress,
                }),
            )
                .into_response());
        }
    }

    let total = video.file_size;
    let range = match headers.get(header::RANGE) {
        Some(value) => Some(parse_range(value, total)?),
        None => None,
    };

    let response = match range {
        None => {
            let object = state.storage.open_range(&video.storage_key, None).await?;
            build_response(StatusCode::OK, object.body, total, None, content_type_for(&video.format))
        }
        Some((start, end)) => {
            let object = state
                .storage
                .open_range(&video.storage_key, Some((start, end)))
                .await?;
            build_response(
                StatusCode::PARTIAL_CONTENT,
                object.body,
                end - start + 1,
                Some((start, end, total)),
                content_type_for(&video.format),
            )
        }
    };

    spawn_view_count_increment(state.firestore.clone(), video.id.clone());

    Ok(response)
}

/// `GET /api/stream/:id/thumbnail`.
pub async fn stream_thumbnail(
    State(state): State<AppState>,
    OptionalAuthContext(ctx): OptionalAuthContext,
    Path(video_id): Path<String>,
) -> ApiResult<Response> {
    let video = load_video(&state, &video_id).await?;
    authorize_video_read_optional(ctx.as_ref(), &video)?;

    let Some(thumbnail_key) = video.thumbnail_key.clone() else {
        return Err(ApiError::not_found("video has no thumbnail"));
    };

    let object = state.storage.open_range(&thumbnail_key, None).await?;
    Ok(build_response(
        StatusCode::OK,
        object.body,
        object.content_length,
        None,
        "image/jpeg",
    ))
}

async fn load_video(state: &AppState, video_id: &str) -> ApiResult<Video> {
    let video_repo = VideoRepository::new((*state.firestore).clone());
    video_repo
        .get(&VideoId::from(video_id.to_string()))
        .await?
        .ok_or_else(|| ApiError::not_found("video not found"))
}

/// Parses a single `bytes=start-end` range against `total`. Suffix ranges
/// (`bytes=-N`) and multi-range requests are not specified by the source
/// (spec.md §9 Open Questions) and are treated as unsupported, returning
/// the same 416 as an out-of-bounds range.
fn parse_range(value: &HeaderValue, total: u64) -> ApiResult<(u64, u64)> {
    let unsatisfiable = || ApiError::RangeNotSatisfiable { total };

    let s = value.to_str().map_err(|_| unsatisfiable())?;
    let spec = s.strip_prefix("bytes=").ok_or_else(unsatisfiable)?;
    if spec.contains(',') {
        return Err(unsatisfiable());
    }
    let (start_s, end_s) = spec.split_once('-').ok_or_else(unsatisfiable)?;
    if start_s.is_empty() {
        // Suffix range `bytes=-N`: unsupported per spec.md §9.
        return Err(unsatisfiable());
    }
    let start: u64 = start_s.parse().map_err(|_| unsatisfiable())?;
    let end: u64 = if end_s.is_empty() {
        total.saturating_sub(1)
    } else {
        end_s.parse().map_err(|_| unsatisfiable())?
    };

    if total == 0 || start > end || end >= total {
        return Err(unsatisfiable());
    }
    Ok((start, end))
}

/// Streams `object` into the response body in the bounded-size chunks the
/// SDK's `ByteStream` itself polls in (the full object is never
/// materialized in memory), setting the headers spec.md §4.9 step 6 calls
/// for.
fn build_response(
    status: StatusCode,
    object: aws_sdk_s3::primitives::ByteStream,
    content_length: u64,
    range: Option<(u64, u64, u64)>,
    content_type: &str,
) -> Response {
    let body = Body::from_stream(object.map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    }));

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, CACHE_CONTROL);

    if let Some((start, end, total)) = range {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {start}-{end}/{total}"),
        );
    }

    builder
        .body(body)
        .expect("response built from well-formed header values")
}

/// Fire-and-forget view-count bump: spec.md §4.9 step 8 — failures here
/// must not affect delivery, which has already completed by the time this
/// runs.
fn spawn_view_count_increment(firestore: std::sync::Arc<vms_firestore::FirestoreClient>, video_id: VideoId) {
    tokio::spawn(async move {
        let repo = VideoRepository::new((*firestore).clone());
        if let Err(e) = repo.increment_view_count(&video_id).await {
            warn!(%video_id, error = %e, "failed to increment view count");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(v: &str) -> HeaderValue {
        HeaderValue::from_str(v).unwrap()
    }

    #[test]
    fn single_byte_range_at_start() {
        assert_eq!(parse_range(&header("bytes=0-0"), 1000).unwrap(), (0, 0));
    }

    #[test]
    fn single_byte_range_at_end() {
        assert_eq!(parse_range(&header("bytes=999-999"), 1000).unwrap(), (999, 999));
    }

    #[test]
    fn open_ended_range_defaults_to_last_byte() {
        assert_eq!(parse_range(&header("bytes=500-"), 1000).unwrap(), (500, 999));
    }

    #[test]
    fn out_of_bounds_range_is_unsatisfiable() {
        assert!(parse_range(&header("bytes=1000-1005"), 1000).is_err());
    }

    #[test]
    fn suffix_range_is_unsupported() {
        assert!(parse_range(&header("bytes=-500"), 1000).is_err());
    }

    #[test]
    fn multi_range_is_unsupported() {
        assert!(parse_range(&header("bytes=0-10,20-30"), 1000).is_err());
    }

    #[test]
    fn start_after_end_is_unsatisfiable() {
        assert!(parse_range(&header("bytes=500-100"), 1000).is_err());
    }
}
