//! Shared domain models for the video management service.
//!
//! This crate has no I/O: it defines the wire/document shapes for
//! Organizations, Users, Videos, processing jobs, token claims and the
//! realtime event payloads, plus the few pure value types (visibility,
//! sensitivity) shared by every other crate in the workspace.

pub mod event;
pub mod job;
pub mod organization;
pub mod sensitivity;
pub mod token;
pub mod user;
pub mod video;

pub use event::{RealtimeEvent, Room};
pub use job::ProcessingJob;
pub use organization::{Organization, OrganizationId, OrganizationSettings};
pub use sensitivity::{Sensitivity, SensitivityCategory, SensitivityLevel, SensitivityStatus};
pub use token::{AccessClaims, RefreshClaims, TokenError, TokenKind};
pub use user::{Role, User, UserId, UserSummary};
pub use video::{
    ProbedMetadata, Resolution, Video, VideoId, VideoStatus, Visibility,
};
