//! HTTP API for the video management service: spec.md §4, §6.
//!
//! Axum router exposing auth, video CRUD/upload, byte-range streaming and
//! the realtime progress hub described by the spec, backed by the
//! `vms-storage`/`vms-firestore`/`vms-queue` crates. Tenancy, role and
//! visibility checks live in [`access`]; token issuance/verification and
//! password hashing live in [`auth`].

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::StaleJobDetector;
pub use state::AppState;
