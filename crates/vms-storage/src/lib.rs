//! Blob Store client, backed by an S3-compatible bucket (Cloudflare R2).
//!
//! This crate provides opaque byte storage for uploaded video originals and
//! generated thumbnails, addressed by storage key. Reads support byte ranges
//! so the streaming handler can serve partial content without buffering a
//! whole object in memory.

pub mod client;
pub mod error;

pub use client::{ObjectInfo, R2Client, R2Config};
pub use error::{StorageError, StorageResult};

/// Namespace prefix for uploaded video originals.
pub const VIDEOS_PREFIX: &str = "videos";
/// Namespace prefix for generated thumbnails.
pub const THUMBNAILS_PREFIX: &str = "thumbnails";

/// Build the storage key for an uploaded video original.
pub fn video_storage_key(opaque_id: &str) -> String {
    format!("{VIDEOS_PREFIX}/{opaque_id}")
}

/// Build the storage key for a video's generated thumbnail.
pub fn thumbnail_storage_key(video_id: &str) -> String {
    format!("{THUMBNAILS_PREFIX}/{video_id}.jpg")
}
