//! User accounts.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::organization::OrganizationId;

/// Unique identifier for a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Role within an organization. Ordered least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Editor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Editor => "editor",
            Role::Admin => "admin",
        }
    }

    pub fn can_upload(&self) -> bool {
        matches!(self, Role::Editor | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// { id, email, password_hash, name, role, organization_id, active,
/// last_login_at, refresh_token_current, created_at, updated_at }
///
/// Invariant: `organization_id` is never null and never changes after
/// creation. Password is stored only as a salted hash and is never
/// serialized back to clients (see `User::redacted`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct User {
    pub id: UserId,
    /// Unique, lowercased.
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub organization_id: OrganizationId,
    pub active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    /// One-slot current refresh token; compare-and-swap updated on refresh
    /// to detect replay of a stale refresh token.
    #[serde(skip_serializing)]
    pub refresh_token_current: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        password_hash: impl Into<String>,
        name: impl Into<String>,
        role: Role,
        organization_id: OrganizationId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email: email.into().to_lowercase(),
            password_hash: password_hash.into(),
            name: name.into(),
            role,
            organization_id,
            active: true,
            last_login_at: None,
            refresh_token_current: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A safe-to-serialize view of a user, omitting secrets.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub organization_id: OrganizationId,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            email: u.email.clone(),
            name: u.name.clone(),
            role: u.role,
            organization_id: u.organization_id.clone(),
            active: u.active,
            created_at: u.created_at,
        }
    }
}
