//! The Video document: spec.md §3.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::organization::OrganizationId;
use crate::sensitivity::Sensitivity;
use crate::user::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// status transitions form a DAG: uploading -> processing -> {completed,
/// failed}; failed is terminal until deletion; completed may not regress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    #[default]
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    #[default]
    Organization,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Organization => "organization",
            Self::Public => "public",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Self::Private),
            "organization" => Some(Self::Organization),
            "public" => Some(Self::Public),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Metadata extracted by the Media Adapter's probe step. Fields are
/// `Option` because a corrupt or partially-readable source may leave some
/// unset; the sensitivity analyzer treats any `None` field (or
/// `codec == "unknown"`) as `corrupt_metadata`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProbedMetadata {
    pub duration_seconds: Option<f64>,
    pub resolution: Option<Resolution>,
    pub codec: Option<String>,
    pub bitrate: Option<u64>,
    pub frame_rate: Option<f64>,
    pub audio_codec: Option<String>,
    /// Container format, e.g. "mp4".
    pub format: Option<String>,
}

/// { id, title, description, original_filename, storage_key, file_size,
/// format, organization_id, uploaded_by, visibility, allowed_user_ids,
/// status, processing_progress, metadata, thumbnail_key, sensitivity,
/// view_count, last_viewed_at, created_at, updated_at }
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Video {
    pub id: VideoId,
    pub title: String,
    pub description: String,
    pub original_filename: String,
    pub storage_key: String,
    pub file_size: u64,
    /// Container/file format, e.g. "mp4" (from the uploaded filename/content
    /// type, independent of the probed container format once processed).
    pub format: String,
    pub organization_id: OrganizationId,
    pub uploaded_by: UserId,
    pub visibility: Visibility,
    pub allowed_user_ids: Vec<UserId>,
    pub status: VideoStatus,
    pub processing_progress: u8,
    pub metadata: ProbedMetadata,
    pub thumbnail_key: Option<String>,
    pub sensitivity: Sensitivity,
    pub view_count: u64,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Created by the Upload Handler in status=processing, progress=0.
    #[allow(clippy::too_many_arguments)]
    pub fn new_uploaded(
        title: String,
        description: String,
        original_filename: String,
        storage_key: String,
        file_size: u64,
        format: String,
        organization_id: OrganizationId,
        uploaded_by: UserId,
        visibility: Visibility,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: VideoId::new(),
            title,
            description,
            original_filename,
            storage_key,
            file_size,
            format,
            organization_id,
            uploaded_by,
            visibility,
            allowed_user_ids: Vec::new(),
            status: VideoStatus::Processing,
            processing_progress: 0,
            metadata: ProbedMetadata::default(),
            thumbnail_key: None,
            sensitivity: Sensitivity::default(),
            view_count: 0,
            last_viewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `private` requires the caller to be the uploader, an admin, or named
    /// in `allowed_user_ids`; `organization` requires the same tenant
    /// (already enforced by the tenant guard before this runs); `public`
    /// requires no further check.
    pub fn visible_to(&self, subject_id: &UserId, is_admin: bool) -> bool {
        match self.visibility {
            Visibility::Public | Visibility::Organization => true,
            Visibility::Private => {
                is_admin
                    || &self.uploaded_by == subject_id
                    || self.allowed_user_ids.contains(subject_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(vis: Visibility, uploader: &str, allowed: &[&str]) -> Video {
        let mut v = Video::new_uploaded(
            "t".into(),
            "d".into(),
            "f.mp4".into(),
            "videos/k".into(),
            10,
            "mp4".into(),
            OrganizationId::from("org1"),
            UserId::from(uploader),
            vis,
        );
        v.allowed_user_ids = allowed.iter().map(|s| UserId::from(*s)).collect();
        v
    }

    #[test]
    fn public_and_organization_visible_to_anyone() {
        let v = video(Visibility::Public, "u1", &[]);
        assert!(v.visible_to(&UserId::from("u2"), false));
        let v = video(Visibility::Organization, "u1", &[]);
        assert!(v.visible_to(&UserId::from("u2"), false));
    }

    #[test]
    fn private_requires_owner_admin_or_allowlist() {
        let v = video(Visibility::Private, "owner", &["friend"]);
        assert!(v.visible_to(&UserId::from("owner"), false));
        assert!(v.visible_to(&UserId::from("friend"), false));
        assert!(v.visible_to(&UserId::from("stranger"), true));
        assert!(!v.visible_to(&UserId::from("stranger"), false));
    }

    #[test]
    fn new_uploaded_starts_processing_at_zero() {
        let v = video(Visibility::Organization, "u1", &[]);
        assert_eq!(v.status, VideoStatus::Processing);
        assert_eq!(v.processing_progress, 0);
        assert!(v.thumbnail_key.is_none());
    }
}
