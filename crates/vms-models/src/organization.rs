//! Organization: the tenant-isolation boundary.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct OrganizationId(pub String);

impl OrganizationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OrganizationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrganizationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrganizationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-organization quotas and content policy.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OrganizationSettings {
    pub max_storage_gb: u64,
    pub max_video_size_mb: u64,
    pub allowed_formats: Vec<String>,
}

impl Default for OrganizationSettings {
    fn default() -> Self {
        Self {
            max_storage_gb: 100,
            max_video_size_mb: 2048,
            allowed_formats: vec![
                "mp4".to_string(),
                "mov".to_string(),
                "avi".to_string(),
                "mkv".to_string(),
                "webm".to_string(),
            ],
        }
    }
}

/// A tenant. Created at first-user registration; never deleted by the core.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    /// Unique, lowercased, hyphenated.
    pub slug: String,
    /// Filled once the owner's User row exists.
    pub owner_id: Option<String>,
    pub settings: OrganizationSettings,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let slug = slugify(&name);
        let now = Utc::now();
        Self {
            id: OrganizationId::new(),
            name,
            slug,
            owner_id: None,
            settings: OrganizationSettings::default(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lowercase, hyphenate, and strip everything but ascii alphanumerics/hyphens.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_hyphen = false;
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen && !out.is_empty() {
            out.push('-');
            last_was_hyphen = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Acme Corp"), "acme-corp");
        assert_eq!(slugify("  Acme   Corp!! "), "acme-corp");
        assert_eq!(slugify("Déjà Vu"), "d-j-vu");
    }

    #[test]
    fn new_organization_has_no_owner() {
        let org = Organization::new("Acme");
        assert!(org.owner_id.is_none());
        assert!(org.active);
        assert_eq!(org.slug, "acme");
    }
}
