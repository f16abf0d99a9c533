//! Input validation for the Upload Handler and the video-update handler:
//! spec.md §4.4. Pure functions returning a client-visible reason string on
//! failure, so handlers can map them straight into [`crate::error::ApiError::bad_request`].

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Non-empty, at most [`MAX_TITLE_LENGTH`] chars.
pub fn validate_title(title: &str) -> Result<(), &'static str> {
    if title.trim().is_empty() {
        return Err("title must not be empty");
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err("title exceeds 200 characters");
    }
    Ok(())
}

/// At most [`MAX_DESCRIPTION_LENGTH`] chars; empty is allowed.
pub fn validate_description(description: &str) -> Result<(), &'static str> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err("description exceeds 1000 characters");
    }
    Ok(())
}

/// Extracts a lowercased extension from a filename, used to check against
/// an organization's `allowed_formats`.
pub fn file_extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Content type against the organization's allowed formats, matched by
/// file extension rather than the client-supplied MIME type (which is
/// trivially spoofable and not authoritative for identifying a container
/// format).
pub fn validate_format(filename: &str, allowed_formats: &[String]) -> Result<String, &'static str> {
    let ext = file_extension(filename).ok_or("file has no extension")?;
    if allowed_formats.iter().any(|f| f.eq_ignore_ascii_case(&ext)) {
        Ok(ext)
    } else {
        Err("file format not allowed for this organization")
    }
}

/// Size against the organization's `max_video_size_mb`.
pub fn validate_size(file_size: u64, max_video_size_mb: u64) -> Result<(), &'static str> {
    let max_bytes = max_video_size_mb.saturating_mul(1024 * 1024);
    if file_size == 0 {
        return Err("uploaded file is empty");
    }
    if file_size > max_bytes {
        return Err("file exceeds the organization's maximum upload size");
    }
    Ok(())
}

/// Email shape check used at registration; deliberately permissive (full
/// RFC 5322 validation is not this handler's job, only obviously-malformed
/// input is rejected).
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let at_count = email.bytes().filter(|&b| b == b'@').count();
    if at_count != 1 {
        return Err("invalid email address");
    }
    let (local, domain) = email.split_once('@').unwrap();
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err("invalid email address");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_boundary_200_accepted_201_rejected() {
        assert!(validate_title(&"a".repeat(200)).is_ok());
        assert!(validate_title(&"a".repeat(201)).is_err());
    }

    #[test]
    fn empty_title_rejected() {
        assert!(validate_title("  ").is_err());
    }

    #[test]
    fn format_checked_by_extension_case_insensitively() {
        let allowed = vec!["mp4".to_string(), "mov".to_string()];
        assert_eq!(validate_format("clip.MP4", &allowed).unwrap(), "mp4");
        assert!(validate_format("clip.avi", &allowed).is_err());
        assert!(validate_format("clip", &allowed).is_err());
    }

    #[test]
    fn size_boundary_exact_max_accepted_over_rejected() {
        let max_mb = 1u64;
        assert!(validate_size(1024 * 1024, max_mb).is_ok());
        assert!(validate_size(1024 * 1024 + 1, max_mb).is_err());
        assert!(validate_size(0, max_mb).is_err());
    }

    #[test]
    fn email_rejects_missing_at_or_domain_dot() {
        assert!(validate_email("a@b.io").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("a@b").is_err());
    }
}
