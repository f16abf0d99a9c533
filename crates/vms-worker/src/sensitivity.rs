//! Sensitivity Analyzer: spec.md §4.7.
//!
//! A pure function over probed metadata and file facts — no I/O, no
//! randomness, safe to unit test exhaustively. Each matching rule adds a
//! fixed weight; the sum is clamped to 1.0 and mapped to a status/level.

use vms_models::sensitivity::{Sensitivity, SensitivityCategory, SensitivityLevel, SensitivityStatus};
use vms_models::video::ProbedMetadata;

const LONG_DURATION_SECS: f64 = 7200.0;
const EXTREMELY_LONG_DURATION_SECS: f64 = 10800.0;
const MIN_RESOLUTION: (u32, u32) = (320, 240);
const MAX_RESOLUTION: (u32, u32) = (7680, 4320);
const HIGH_BITRATE_BPS: f64 = 15_000_000.0;
const LOW_BITRATE_BPS: f64 = 100_000.0;
const LOW_BITRATE_MIN_DURATION_SECS: f64 = 60.0;
const MAX_FRAMERATE: f64 = 120.0;
const MIN_FRAMERATE: f64 = 15.0;
const ASPECT_RATIO_TOLERANCE: f64 = 0.05;
const NO_AUDIO_MIN_DURATION_SECS: f64 = 60.0;
const HIGH_DATA_RATE_BPS: f64 = 10_000_000.0;
const LOW_DATA_RATE_BPS: f64 = 50_000.0;
const LOW_DATA_RATE_MIN_DURATION_SECS: f64 = 60.0;
const KNOWN_FORMATS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];
const SUSPICIOUS_BYTES_PER_SECOND: f64 = 100_000.0;

const STANDARD_ASPECT_RATIOS: &[(f64, f64)] = &[
    (16.0, 9.0),
    (4.0, 3.0),
    (21.0, 9.0),
    (1.0, 1.0),
    (9.0, 16.0),
];

const HIGH_THRESHOLD: f64 = 0.7;
const MEDIUM_THRESHOLD: f64 = 0.4;

/// Score `metadata` against the rule table and return the persisted
/// sensitivity block. Never fails: an unreadable/corrupt probe is scored
/// the same as any other input, and `corrupt_metadata` picks up the slack.
pub fn analyze(metadata: &ProbedMetadata, file_size: u64) -> Sensitivity {
    let mut score = 0.0f64;
    let mut categories = Vec::new();
    let mut notes = Vec::new();

    let mut add = |weight: f64, category: SensitivityCategory, note: &str| {
        score += weight;
        categories.push(category);
        notes.push(note.to_string());
    };

    let duration = metadata.duration_seconds;

    if let Some(d) = duration {
        if d > LONG_DURATION_SECS {
            add(
                0.10,
                SensitivityCategory::LongDuration,
                &format!("duration {d:.0}s exceeds {LONG_DURATION_SECS:.0}s"),
            );
            if d > EXTREMELY_LONG_DURATION_SECS {
                add(
                    0.05,
                    SensitivityCategory::ExtremelyLongDuration,
                    &format!("duration {d:.0}s exceeds {EXTREMELY_LONG_DURATION_SECS:.0}s"),
                );
            }
        }
    }

    match metadata.resolution {
        Some(r) if r.width == 0 || r.height == 0 => {
            add(0.30, SensitivityCategory::NoVideoStream, "zero-dimension video stream");
        }
        Some(r) => {
            let (min_w, min_h) = MIN_RESOLUTION;
            let (max_w, max_h) = MAX_RESOLUTION;
            if r.width < min_w || r.height < min_h || r.width > max_w || r.height > max_h {
                add(
                    0.15,
                    SensitivityCategory::UnusualResolution,
                    &format!("resolution {}x{} outside expected bounds", r.width, r.height),
                );
            }
            let matches_standard = STANDARD_ASPECT_RATIOS
                .iter()
                .any(|(num, den)| aspect_ratio_matches(r.width, r.height, *num, *den));
            if !matches_standard {
                add(
                    0.10,
                    SensitivityCategory::SuspiciousAspectRatio,
                    "aspect ratio doesn't match any standard ratio within tolerance",
                );
            }
        }
        None => {
            add(0.30, SensitivityCategory::NoVideoStream, "no video stream reported");
        }
    }

    if let Some(bitrate) = metadata.bitrate {
        let bitrate = bitrate as f64;
        if bitrate > HIGH_BITRATE_BPS {
            add(0.10, SensitivityCategory::HighBitrate, &format!("bitrate {bitrate:.0} bps"));
        }
        if bitrate < LOW_BITRATE_BPS && duration.is_some_and(|d| d > LOW_BITRATE_MIN_DURATION_SECS) {
            add(0.15, SensitivityCategory::LowBitrate, &format!("bitrate {bitrate:.0} bps"));
        }
    }

    if let Some(fps) = metadata.frame_rate {
        if fps > 0.0 && (fps > MAX_FRAMERATE || fps < MIN_FRAMERATE) {
            add(0.10, SensitivityCategory::UnusualFramerate, &format!("frame rate {fps:.2}"));
        }
    }

    let has_audio = metadata.audio_codec.is_some();
    if !has_audio && duration.is_some_and(|d| d > NO_AUDIO_MIN_DURATION_SECS) {
        add(0.05, SensitivityCategory::NoAudioLongVideo, "no audio stream on a long video");
    }

    if let Some(d) = duration {
        if d > 0.0 {
            let bytes_per_second = file_size as f64 / d;
            if bytes_per_second > HIGH_DATA_RATE_BPS / 8.0 {
                add(
                    0.10,
                    SensitivityCategory::HighDataRate,
                    &format!("{bytes_per_second:.0} bytes/s"),
                );
            }
            if bytes_per_second < LOW_DATA_RATE_BPS / 8.0 && d > LOW_DATA_RATE_MIN_DURATION_SECS {
                add(
                    0.15,
                    SensitivityCategory::LowDataRate,
                    &format!("{bytes_per_second:.0} bytes/s"),
                );
            }
            if (file_size as f64) < d * SUSPICIOUS_BYTES_PER_SECOND {
                add(
                    0.15,
                    SensitivityCategory::SuspiciouslySmallFile,
                    "file size implausibly small for reported duration",
                );
            }
        }
    }

    match metadata.format.as_deref() {
        Some(f) if !KNOWN_FORMATS.contains(&f) => {
            add(0.05, SensitivityCategory::UnusualFormat, &format!("container format {f}"));
        }
        _ => {}
    }

    if is_corrupt(metadata) {
        add(0.25, SensitivityCategory::CorruptMetadata, "one or more probe fields missing or unknown");
    }

    score = score.min(1.0);

    let (status, level) = if score > HIGH_THRESHOLD {
        (SensitivityStatus::Flagged, SensitivityLevel::High)
    } else if score > MEDIUM_THRESHOLD {
        categories.push(SensitivityCategory::ManualReviewRecommended);
        (SensitivityStatus::Flagged, SensitivityLevel::Medium)
    } else {
        (SensitivityStatus::Safe, SensitivityLevel::Low)
    };

    Sensitivity {
        level,
        score,
        status,
        categories,
        analysis_details: notes.join("; "),
        analyzed_at: Some(chrono::Utc::now()),
        reviewed_by: None,
        review_notes: None,
    }
}

/// The error path: metadata couldn't be read at all. Scored safe per
/// spec.md §4.7 rather than propagating the failure into the stored score.
pub fn analyze_error() -> Sensitivity {
    Sensitivity {
        level: SensitivityLevel::Unknown,
        score: 0.0,
        status: SensitivityStatus::Safe,
        categories: vec![SensitivityCategory::AnalysisError],
        analysis_details: "metadata could not be analyzed".to_string(),
        analyzed_at: Some(chrono::Utc::now()),
        reviewed_by: None,
        review_notes: None,
    }
}

fn is_corrupt(metadata: &ProbedMetadata) -> bool {
    metadata.duration_seconds.is_none()
        || metadata.resolution.is_none()
        || metadata.bitrate.is_none()
        || metadata.frame_rate.is_none()
        || metadata.format.is_none()
        || metadata.codec.as_deref().is_none_or(|c| c == "unknown")
}

fn aspect_ratio_matches(width: u32, height: u32, num: f64, den: f64) -> bool {
    if width == 0 || height == 0 || den == 0.0 {
        return false;
    }
    let actual = width as f64 / height as f64;
    let expected = num / den;
    (actual - expected).abs() / expected <= ASPECT_RATIO_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use vms_models::video::Resolution;

    fn clean_metadata() -> ProbedMetadata {
        ProbedMetadata {
            duration_seconds: Some(120.0),
            resolution: Some(Resolution { width: 1920, height: 1080 }),
            codec: Some("h264".to_string()),
            bitrate: Some(5_000_000),
            frame_rate: Some(30.0),
            audio_codec: Some("aac".to_string()),
            format: Some("mp4".to_string()),
        }
    }

    #[test]
    fn clean_video_is_safe() {
        let result = analyze(&clean_metadata(), 75_000_000);
        assert_eq!(result.status, SensitivityStatus::Safe);
        assert_eq!(result.level, SensitivityLevel::Low);
        assert!(result.categories.is_empty());
    }

    #[test]
    fn missing_video_stream_is_flagged_high() {
        let mut metadata = clean_metadata();
        metadata.resolution = None;
        let result = analyze(&metadata, 75_000_000);
        assert!(result.categories.contains(&SensitivityCategory::NoVideoStream));
        assert!(result.score >= 0.30);
    }

    #[test]
    fn zero_dimension_resolution_flags_no_video_stream() {
        let mut metadata = clean_metadata();
        metadata.resolution = Some(Resolution { width: 0, height: 1080 });
        let result = analyze(&metadata, 75_000_000);
        assert!(result.categories.contains(&SensitivityCategory::NoVideoStream));
    }

    #[test]
    fn extremely_long_duration_stacks_both_categories() {
        let mut metadata = clean_metadata();
        metadata.duration_seconds = Some(11_000.0);
        let result = analyze(&metadata, 5_000_000_000);
        assert!(result.categories.contains(&SensitivityCategory::LongDuration));
        assert!(result.categories.contains(&SensitivityCategory::ExtremelyLongDuration));
    }

    #[test]
    fn corrupt_metadata_triggers_on_unknown_codec() {
        let mut metadata = clean_metadata();
        metadata.codec = Some("unknown".to_string());
        let result = analyze(&metadata, 75_000_000);
        assert!(result.categories.contains(&SensitivityCategory::CorruptMetadata));
    }

    #[test]
    fn fully_unreadable_metadata_is_flagged() {
        let metadata = ProbedMetadata::default();
        let result = analyze(&metadata, 1);
        assert!(result.score <= 1.0);
        assert_eq!(result.status, SensitivityStatus::Flagged);
        assert!(result.categories.contains(&SensitivityCategory::NoVideoStream));
        assert!(result.categories.contains(&SensitivityCategory::CorruptMetadata));
    }

    #[test]
    fn score_is_clamped_to_one() {
        let metadata = ProbedMetadata {
            duration_seconds: Some(20_000.0),
            resolution: Some(Resolution { width: 0, height: 0 }),
            codec: Some("unknown".to_string()),
            bitrate: Some(1),
            frame_rate: Some(500.0),
            audio_codec: None,
            format: Some("weird".to_string()),
        };
        let result = analyze(&metadata, 1);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.level, SensitivityLevel::High);
    }

    #[test]
    fn medium_band_adds_manual_review_category() {
        // Stacks enough rule weights to land the score in (0.4, 0.7].
        let metadata = ProbedMetadata {
            duration_seconds: Some(200.0),
            resolution: Some(Resolution { width: 100, height: 100 }),
            codec: Some("h264".to_string()),
            bitrate: Some(20_000_000),
            frame_rate: Some(200.0),
            audio_codec: None,
            format: Some("ogv".to_string()),
        };
        let result = analyze(&metadata, 500_000_000);
        assert_eq!(result.status, SensitivityStatus::Flagged);
        assert!(result.categories.contains(&SensitivityCategory::ManualReviewRecommended));
    }

    #[test]
    fn analyze_error_is_safe_with_analysis_error_category() {
        let result = analyze_error();
        assert_eq!(result.status, SensitivityStatus::Safe);
        assert_eq!(result.score, 0.0);
        assert!(result.categories.contains(&SensitivityCategory::AnalysisError));
    }
}
