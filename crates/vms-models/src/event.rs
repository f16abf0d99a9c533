//! Realtime Hub room naming and event payloads: spec.md §4.8, §6.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::sensitivity::Sensitivity;
use crate::video::{Resolution, VideoId};

/// Rooms are `org:<id>`, `user:<id>`, and, on demand, `video:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    Organization(String),
    User(String),
    Video(String),
}

impl Room {
    pub fn organization(id: impl Into<String>) -> Self {
        Self::Organization(id.into())
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    pub fn video(id: impl Into<String>) -> Self {
        Self::Video(id.into())
    }

    pub fn name(&self) -> String {
        match self {
            Room::Organization(id) => format!("org:{id}"),
            Room::User(id) => format!("user:{id}"),
            Room::Video(id) => format!("video:{id}"),
        }
    }
}

/// Events published by the Realtime Hub. Tagged so clients can dispatch on
/// `event` and decode `payload` accordingly; the wire shape mirrors what a
/// socket.io-style `emit(room, event, payload)` call sends.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum RealtimeEvent {
    Connected,
    #[serde(rename = "video:progress")]
    VideoProgress {
        video_id: VideoId,
        progress: u8,
        stage: String,
        message: String,
    },
    #[serde(rename = "video:process:complete")]
    VideoProcessComplete {
        video_id: VideoId,
        status: String,
        sensitivity: Sensitivity,
        thumbnail_key: Option<String>,
        duration: Option<f64>,
        resolution: Option<Resolution>,
    },
    #[serde(rename = "video:process:failed")]
    VideoProcessFailed { video_id: VideoId, error: String },
}

impl RealtimeEvent {
    /// Name used by the outer `{"event": ..., "payload": ...}` envelope;
    /// kept in sync with the serde tag above for clients that want a flat
    /// `event` string without decoding the whole enum.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::VideoProgress { .. } => "video:progress",
            Self::VideoProcessComplete { .. } => "video:process:complete",
            Self::VideoProcessFailed { .. } => "video:process:failed",
        }
    }
}
