//! Access Control: spec.md §4.3. Role guards are ordinary `if` checks at
//! the top of a handler (no route-decorator abstraction needed for a
//! three-role system); tenant and visibility guards are the two checks
//! every handler that names a Video id must run, in that order, so that a
//! video in another tenant returns 404 rather than leaking a 403 (spec.md
//! §7's cross-tenant-probing rule).

use vms_models::{Role, User, UserId, Video};

use crate::auth::AuthContext;
use crate::error::ApiError;

/// Rejects unless `ctx.role` is one of `allowed`.
pub fn require_role(ctx: &AuthContext, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&ctx.role) {
        Ok(())
    } else {
        Err(ApiError::forbidden("insufficient role"))
    }
}

/// Tenant guard: a Video outside the caller's tenant is reported as 404,
/// never 403, so a prober can't distinguish "doesn't exist" from "exists in
/// another org" (spec.md §7).
pub fn tenant_guard(ctx: &AuthContext, video: &Video) -> Result<(), ApiError> {
    if video.organization_id.as_str() == ctx.tenant_id.as_str() || ctx.is_admin() {
        Ok(())
    } else {
        Err(ApiError::not_found("video not found"))
    }
}

/// Visibility guard, applied after the tenant guard. `private` requires the
/// caller be the uploader, an admin, or in `allowed_user_ids`; `organization`
/// and `public` pass once the tenant guard (already run) has cleared.
pub fn visibility_guard(subject_id: &UserId, is_admin: bool, video: &Video) -> Result<(), ApiError> {
    if video.visible_to(subject_id, is_admin) {
        Ok(())
    } else {
        Err(ApiError::not_found("video not found"))
    }
}

/// Runs the tenant and visibility guards together, the shape every
/// Video-scoped handler needs.
pub fn authorize_video_read(ctx: &AuthContext, video: &Video) -> Result<(), ApiError> {
    tenant_guard(ctx, video)?;
    visibility_guard(&ctx.subject_id, ctx.is_admin(), video)
}

/// Mutation guard for update/delete: owner or admin only, within the
/// already-tenant-checked video.
pub fn authorize_video_write(ctx: &AuthContext, video: &Video) -> Result<(), ApiError> {
    tenant_guard(ctx, video)?;
    if ctx.is_admin() || video.uploaded_by == ctx.subject_id {
        Ok(())
    } else {
        Err(ApiError::forbidden("only the uploader or an admin may modify this video"))
    }
}

/// A public video may still be read by an anonymous caller; this mirrors
/// `authorize_video_read` but accepts `None` context as "unauthenticated".
pub fn authorize_video_read_optional(
    ctx: Option<&AuthContext>,
    video: &Video,
) -> Result<(), ApiError> {
    match ctx {
        Some(ctx) => authorize_video_read(ctx, video),
        None => {
            if video.visibility == vms_models::Visibility::Public {
                Ok(())
            } else {
                Err(ApiError::unauthorized("authentication required"))
            }
        }
    }
}

/// Loads the User referenced by an [`AuthContext`], used by handlers that
/// need fields beyond the token's claims (e.g. `name`, `email`).
pub async fn load_user(
    firestore: &vms_firestore::FirestoreClient,
    id: &UserId,
) -> Result<User, ApiError> {
    vms_firestore::UserRepository::new(firestore.clone())
        .get(id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("user no longer exists"))
}
