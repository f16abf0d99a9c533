//! Auth handlers: spec.md §4.1, §6. Register/login/refresh/logout/me.

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vms_models::{Organization, Role, User, UserSummary};

use crate::auth::{firestore_repos, AuthContext};
use crate::error::{ApiError, ApiResult};
use crate::security::validate_email;
use crate::state::AppState;

const REFRESH_COOKIE: &str = "refresh_token";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    /// Present only for the first user of a new organization; absent means
    /// "join an existing organization" is not supported by this endpoint
    /// (no invite flow exists yet, so registering without it is rejected).
    pub organization_name: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserSummary,
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub user: UserSummary,
}

/// `POST /api/auth/register`. The first user of an organization becomes its
/// admin; `organization_name` is required since there is no invite flow to
/// join an existing tenant.
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(CookieJar, Json<AuthResponse>)> {
    validate_email(&req.email).map_err(ApiError::bad_request)?;
    if req.password.len() < 8 {
        return Err(ApiError::bad_request("password must be at least 8 characters"));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }
    let Some(organization_name) = req.organization_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return Err(ApiError::bad_request("organizationName is required to register"));
    };

    let (org_repo, user_repo, _video_repo) = firestore_repos(&state.firestore);

    if user_repo.find_by_email(&req.email).await?.is_some() {
        return Err(ApiError::conflict("an account with this email already exists"));
    }

    let org = Organization::new(organization_name);
    if org_repo.find_by_slug(&org.slug).await?.is_some() {
        return Err(ApiError::conflict("an organization with this name already exists"));
    }
    org_repo.create(&org).await?;

    let password_hash = state.token_service.hash_password(&req.password)?;
    let role = req.role.unwrap_or(Role::Admin);
    let user = User::new(req.email.clone(), password_hash, req.name.clone(), role, org.id.clone());
    user_repo.create(&user).await?;
    org_repo.set_owner(&org.id, &user.id).await?;

    let access_token = state.token_service.issue_access(&user.id, user.role, &org.id);
    let refresh_token = state.token_service.issue_refresh(&user.id);
    user_repo.set_refresh_token(&user.id, &refresh_token).await?;

    info!(user_id = %user.id, organization_id = %org.id, "registered new tenant");

    let jar = jar.add(refresh_cookie(&state, refresh_token));
    Ok((
        jar,
        Json(AuthResponse {
            user: UserSummary::from(&user),
            access_token,
        }),
    ))
}

/// `POST /api/auth/login`.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<AuthResponse>)> {
    let (_org_repo, user_repo, _video_repo) = firestore_repos(&state.firestore);

    let user = user_repo
        .find_by_email(&req.email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("invalid email or password"))?;

    if !user.active {
        return Err(ApiError::unauthorized("account deactivated"));
    }
    if !state.token_service.verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::unauthorized("invalid email or password"));
    }

    let access_token = state.token_service.issue_access(&user.id, user.role, &user.organization_id);
    let refresh_token = state.token_service.issue_refresh(&user.id);
    user_repo.set_refresh_token(&user.id, &refresh_token).await?;
    user_repo.set_last_login(&user.id).await?;

    let jar = jar.add(refresh_cookie(&state, refresh_token));
    Ok((
        jar,
        Json(AuthResponse {
            user: UserSummary::from(&user),
            access_token,
        }),
    ))
}

/// `POST /api/auth/refresh`. The refresh token is read from the http-only
/// cookie, never from the body; a one-slot compare-and-swap on the User row
/// rejects replay of an already-rotated token (spec.md §4.1).
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<RefreshResponse>)> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| ApiError::unauthorized("missing refresh token"))?;

    let claims = state
        .token_service
        .verify_refresh(&token)
        .map_err(ApiError::from_token_error)?;

    let (_org_repo, user_repo, _video_repo) = firestore_repos(&state.firestore);
    let user = user_repo
        .get(&claims.subject_id())
        .await?
        .ok_or_else(|| ApiError::unauthorized("user no longer exists"))?;

    if !user.active {
        return Err(ApiError::unauthorized("account deactivated"));
    }

    let new_access = state.token_service.issue_access(&user.id, user.role, &user.organization_id);
    let new_refresh = state.token_service.issue_refresh(&user.id);

    user_repo
        .swap_refresh_token(&user.id, &token, &new_refresh)
        .await
        .map_err(|e| {
            warn!(user_id = %user.id, "refresh token reuse detected");
            ApiError::from(e)
        })?;

    let jar = jar.add(refresh_cookie(&state, new_refresh));
    Ok((
        jar,
        Json(RefreshResponse {
            access_token: new_access,
            user: UserSummary::from(&user),
        }),
    ))
}

/// `POST /api/auth/logout`. Clears the refresh cookie; the stored refresh
/// token slot is left alone (logging out on one device should not silently
/// invalidate a session active on another, and a stale refresh token is
/// already rotated out by its own CAS on next use).
pub async fn logout(jar: CookieJar) -> ApiResult<CookieJar> {
    Ok(jar.remove(Cookie::from(REFRESH_COOKIE)))
}

/// `GET /api/auth/me`.
pub async fn me(State(state): State<AppState>, ctx: AuthContext) -> ApiResult<Json<UserSummary>> {
    let user = crate::access::load_user(&state.firestore, &ctx.subject_id).await?;
    Ok(Json(UserSummary::from(&user)))
}

fn refresh_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let max_age = state.token_service.refresh_ttl();
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(state.config.is_production())
        .path("/")
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .build()
}
