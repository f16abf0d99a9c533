#![deny(unreachable_patterns)]
//! Media Adapter: the FFmpeg/FFprobe CLI wrapper used by the worker to
//! probe uploaded videos and generate thumbnails.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeout support via tokio
//! - ffprobe-based metadata extraction into [`vms_models::video::ProbedMetadata`]
//! - Single-frame thumbnail generation

pub mod command;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod thumbnail;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::probe_video;
pub use progress::{FfmpegProgress, ProgressCallback};
pub use thumbnail::generate_thumbnail;
