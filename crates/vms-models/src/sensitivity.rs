//! Content-sensitivity classification output.
//!
//! These types are the *output* shape of the sensitivity analyzer in
//! `vms-worker`; this crate only carries the value types so both the API
//! (for serialization) and the worker (for scoring) can share them.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityLevel {
    #[default]
    Unknown,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityStatus {
    #[default]
    Pending,
    Safe,
    Flagged,
}

/// One of the named scoring rule outcomes from spec §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityCategory {
    LongDuration,
    ExtremelyLongDuration,
    NoVideoStream,
    UnusualResolution,
    HighBitrate,
    LowBitrate,
    UnusualFramerate,
    SuspiciousAspectRatio,
    NoAudioLongVideo,
    HighDataRate,
    LowDataRate,
    UnusualFormat,
    CorruptMetadata,
    SuspiciouslySmallFile,
    ManualReviewRecommended,
    AnalysisError,
}

impl SensitivityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LongDuration => "long_duration",
            Self::ExtremelyLongDuration => "extremely_long_duration",
            Self::NoVideoStream => "no_video_stream",
            Self::UnusualResolution => "unusual_resolution",
            Self::HighBitrate => "high_bitrate",
            Self::LowBitrate => "low_bitrate",
            Self::UnusualFramerate => "unusual_framerate",
            Self::SuspiciousAspectRatio => "suspicious_aspect_ratio",
            Self::NoAudioLongVideo => "no_audio_long_video",
            Self::HighDataRate => "high_data_rate",
            Self::LowDataRate => "low_data_rate",
            Self::UnusualFormat => "unusual_format",
            Self::CorruptMetadata => "corrupt_metadata",
            Self::SuspiciouslySmallFile => "suspiciously_small_file",
            Self::ManualReviewRecommended => "manual_review_recommended",
            Self::AnalysisError => "analysis_error",
        }
    }
}

/// Persisted sensitivity block on a Video document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Sensitivity {
    pub level: SensitivityLevel,
    pub score: f64,
    pub status: SensitivityStatus,
    pub categories: Vec<SensitivityCategory>,
    pub analysis_details: String,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self {
            level: SensitivityLevel::Unknown,
            score: 0.0,
            status: SensitivityStatus::Pending,
            categories: Vec::new(),
            analysis_details: String::new(),
            analyzed_at: None,
            reviewed_by: None,
            review_notes: None,
        }
    }
}
