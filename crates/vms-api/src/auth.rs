//! Token Service and Auth & Tenancy Middleware: spec.md §4.1, §4.2.
//!
//! Access and refresh tokens are both HS256-signed JWTs carrying the claim
//! shapes from [`vms_models::token`]; the two signing secrets are required
//! to differ (checked at construction) so a leaked refresh secret can't be
//! used to mint access tokens. Password hashing uses argon2, this
//! codebase's password-hashing crate of choice.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use vms_models::token::{AccessClaims, RefreshClaims, TokenError, TokenKind};
use vms_models::{OrganizationId, Role, UserId};

use crate::error::ApiError;
use crate::state::AppState;

/// Access tokens default to 15 minutes, refresh tokens to 7 days, matching
/// spec.md §4.1's defaults; both are overridable via [`crate::config::ApiConfig`].
#[derive(Debug, Clone)]
pub struct TokenService {
    access_secret: String,
    refresh_secret: String,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

impl TokenService {
    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
        access_ttl: chrono::Duration,
        refresh_ttl: chrono::Duration,
    ) -> Self {
        let access_secret = access_secret.into();
        let refresh_secret = refresh_secret.into();
        assert_ne!(
            access_secret, refresh_secret,
            "access and refresh token secrets must differ"
        );
        Self {
            access_secret,
            refresh_secret,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn issue_access(&self, subject: &UserId, role: Role, tenant: &OrganizationId) -> String {
        let now = chrono::Utc::now();
        let claims = AccessClaims {
            sub: subject.as_str().to_string(),
            role,
            tenant_id: tenant.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
            kind: TokenKind::Access,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.access_secret.as_bytes()),
        )
        .expect("HS256 encoding of well-formed claims cannot fail")
    }

    pub fn issue_refresh(&self, subject: &UserId) -> String {
        let now = chrono::Utc::now();
        let claims = RefreshClaims {
            sub: subject.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
            kind: TokenKind::Refresh,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.refresh_secret.as_bytes()),
        )
        .expect("HS256 encoding of well-formed claims cannot fail")
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let data = jsonwebtoken::decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.access_secret.as_bytes()),
            &validation(),
        )
        .map_err(map_jwt_error)?;
        if data.claims.kind != TokenKind::Access {
            return Err(TokenError::WrongKind);
        }
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let data = jsonwebtoken::decode::<RefreshClaims>(
            token,
            &DecodingKey::from_secret(self.refresh_secret.as_bytes()),
            &validation(),
        )
        .map_err(map_jwt_error)?;
        if data.claims.kind != TokenKind::Refresh {
            return Err(TokenError::WrongKind);
        }
        Ok(data.claims)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        self.refresh_ttl
    }

    /// Hash a plaintext password for storage on the User row.
    pub fn hash_password(&self, plaintext: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| ApiError::internal(format!("password hashing failed: {e}")))
    }

    /// Verify a plaintext password against a stored argon2 hash.
    pub fn verify_password(&self, plaintext: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

fn validation() -> Validation {
    let mut v = Validation::new(jsonwebtoken::Algorithm::HS256);
    v.validate_exp = true;
    v
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;
    match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        _ => TokenError::Malformed,
    }
}

/// {subject_id, role, tenant_id} attached to the request context after
/// successful token verification and the active-user check (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub subject_id: UserId,
    pub role: Role,
    pub tenant_id: OrganizationId,
    /// Access token expiry (unix seconds), kept so long-lived connections
    /// (the realtime hub) can close themselves when the token they were
    /// authenticated with has since expired.
    pub expires_at: i64,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() >= self.expires_at
    }
}

/// Resolve an access token from, in order: `Authorization: Bearer`, the
/// `access_token` cookie, then the `token` query parameter (needed for
/// range-streaming endpoints media elements hit without custom headers).
pub(crate) fn resolve_token(parts: &Parts) -> Option<String> {
    resolve_token_from(&parts.headers, &parts.uri)
}

/// Same resolution as [`resolve_token`], taking headers/uri directly for
/// callers (rate-limit middleware) that only have a request reference, not
/// an owned [`Parts`].
pub(crate) fn resolve_token_from(
    headers: &axum::http::HeaderMap,
    uri: &axum::http::Uri,
) -> Option<String> {
    if let Some(header) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(s) = header.to_str() {
            if let Some(tok) = s.strip_prefix("Bearer ") {
                return Some(tok.to_string());
            }
        }
    }

    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get("access_token") {
        return Some(cookie.value().to_string());
    }

    if let Some(query) = uri.query() {
        for pair in query.split('&') {
            if let Some(v) = pair.strip_prefix("token=") {
                return urlencoding::decode(v).ok().map(|c| c.into_owned());
            }
        }
    }

    None
}

/// Required-auth extractor; rejects with 401 (`code: TOKEN_EXPIRED` when
/// expiry is the cause) when no valid token resolves or the user is
/// inactive.
impl<S> FromRequestParts<S> for AuthContext
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let token = resolve_token(parts).ok_or_else(|| ApiError::unauthorized("missing token"))?;
        let claims = app_state
            .token_service
            .verify_access(&token)
            .map_err(ApiError::from_token_error)?;

        let user_id = claims.subject_id();
        let user = vms_firestore::UserRepository::new((*app_state.firestore).clone())
            .get(&user_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("user no longer exists"))?;

        if !user.active {
            return Err(ApiError::unauthorized("account deactivated"));
        }

        Ok(AuthContext {
            subject_id: claims.subject_id(),
            role: claims.role,
            tenant_id: claims.tenant_id(),
            expires_at: claims.exp,
        })
    }
}

/// Same resolution as [`AuthContext`], but proceeds with `None` instead of
/// rejecting when no token is present, used by routes that permit public
/// visibility.
#[derive(Debug, Clone)]
pub struct OptionalAuthContext(pub Option<AuthContext>);

impl<S> FromRequestParts<S> for OptionalAuthContext
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if resolve_token(parts).is_none() {
            return Ok(OptionalAuthContext(None));
        }
        match AuthContext::from_request_parts(parts, state).await {
            Ok(ctx) => Ok(OptionalAuthContext(Some(ctx))),
            Err(_) => Ok(OptionalAuthContext(None)),
        }
    }
}

pub fn firestore_repos(
    firestore: &Arc<vms_firestore::FirestoreClient>,
) -> (
    vms_firestore::OrganizationRepository,
    vms_firestore::UserRepository,
    vms_firestore::VideoRepository,
) {
    (
        vms_firestore::OrganizationRepository::new((**firestore).clone()),
        vms_firestore::UserRepository::new((**firestore).clone()),
        vms_firestore::VideoRepository::new((**firestore).clone()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(
            "access-secret-value",
            "refresh-secret-value",
            chrono::Duration::minutes(15),
            chrono::Duration::days(7),
        )
    }

    #[test]
    fn access_token_round_trips() {
        let svc = service();
        let sub = UserId::from("u1");
        let tenant = OrganizationId::from("org1");
        let token = svc.issue_access(&sub, Role::Editor, &tenant);
        let claims = svc.verify_access(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.tenant_id, "org1");
        assert_eq!(claims.role, Role::Editor);
    }

    #[test]
    fn refresh_token_rejected_as_access_token() {
        let svc = service();
        let sub = UserId::from("u1");
        let refresh = svc.issue_refresh(&sub);
        assert_eq!(svc.verify_access(&refresh).unwrap_err(), TokenError::WrongKind);
    }

    #[test]
    fn password_hash_round_trips_and_rejects_wrong_password() {
        let svc = service();
        let hash = svc.hash_password("correct horse battery staple").unwrap();
        assert!(svc.verify_password("correct horse battery staple", &hash));
        assert!(!svc.verify_password("wrong password", &hash));
    }
}
