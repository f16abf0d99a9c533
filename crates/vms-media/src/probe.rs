//! FFprobe-based metadata extraction.
//!
//! Produces a [`ProbedMetadata`] straight from ffprobe's JSON output. Any
//! field ffprobe can't report (missing stream, corrupt container, unknown
//! codec) is left `None` rather than defaulted, so the sensitivity analyzer
//! can tell "absent" from "zero".

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use vms_models::video::{ProbedMetadata, Resolution};

use crate::error::{MediaError, MediaResult};

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    format_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe a video file and return whatever metadata ffprobe can extract.
///
/// A file that ffprobe can't open at all (missing, not a media file) is a
/// hard error. A file ffprobe opens but can't fully describe (no video
/// stream, unreadable frame rate) still returns `Ok` with the unresolved
/// fields left `None` — the caller decides what to do with a sparse result.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<ProbedMetadata> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "ffprobe exited with non-zero status".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;

    let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");
    let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

    let duration_seconds = probe.format.duration.as_deref().and_then(|d| d.parse().ok());

    let bitrate = probe
        .format
        .bit_rate
        .as_deref()
        .and_then(|b| b.parse().ok());

    let resolution = video_stream.and_then(|s| match (s.width, s.height) {
        (Some(width), Some(height)) => Some(Resolution { width, height }),
        _ => None,
    });

    let frame_rate = video_stream.and_then(|s| {
        s.avg_frame_rate
            .as_deref()
            .or(s.r_frame_rate.as_deref())
            .and_then(parse_frame_rate)
    });

    let codec = video_stream.and_then(|s| s.codec_name.clone());
    let audio_codec = audio_stream.and_then(|s| s.codec_name.clone());
    let format = probe.format.format_name.map(|f| {
        f.split(',').next().unwrap_or(&f).to_string()
    });

    Ok(ProbedMetadata {
        duration_seconds,
        resolution,
        codec,
        bitrate,
        frame_rate,
        audio_codec,
        format,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
    }
}
