//! Token claim shapes: spec.md §4.1.
//!
//! Signing and verification live in `vms-api::security::TokenService`, which
//! depends on `jsonwebtoken`; this crate only carries the claim shapes so
//! other crates (tests, the realtime hub) can reason about them without
//! pulling in a JWT library.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::organization::OrganizationId;
use crate::user::{Role, UserId};

/// Distinguishes the two token kinds so a verifier can reject a
/// well-signed token of the wrong kind (e.g. a refresh token presented as
/// an access token).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Short-lived credential carrying subject, role, and tenant claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user) id.
    pub sub: String,
    pub role: Role,
    /// Tenant (organization) id.
    pub tenant_id: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
    pub kind: TokenKind,
}

impl AccessClaims {
    pub fn subject_id(&self) -> UserId {
        UserId::from(self.sub.clone())
    }

    pub fn tenant_id(&self) -> OrganizationId {
        OrganizationId::from(self.tenant_id.clone())
    }
}

/// Long-lived credential used once to obtain a new access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub kind: TokenKind,
}

impl RefreshClaims {
    pub fn subject_id(&self) -> UserId {
        UserId::from(self.sub.clone())
    }
}

/// Verification outcome. Claims are never trusted without signature
/// verification, so this sum type is the only way to observe claims.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, JsonSchema)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("wrong token kind")]
    WrongKind,
}
