#![deny(unreachable_patterns)]
//! Video processing worker.
//!
//! Consumes `ProcessVideo` jobs from the Job Queue and runs each one through
//! the five-step pipeline: download, probe, thumbnail, sensitivity analysis,
//! complete. Reconciles stalled jobs left behind by crashed workers.

pub mod config;
pub mod error;
pub mod executor;
pub mod processor;
pub mod sensitivity;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use processor::{ProcessingContext, VideoProcessor};
