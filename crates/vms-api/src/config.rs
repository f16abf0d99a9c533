//! API configuration: spec.md §6's Configuration list plus the ambient
//! rate-limit/CORS/body-size knobs every route in this codebase's family
//! takes from the environment.

use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origin — the frontend URL (spec.md §6 CORS section).
    pub frontend_origin: String,
    /// Global rate limit requests per second (per IP/subject).
    pub rate_limit_rps: u32,
    /// Rate limit burst
    pub rate_limit_burst: u32,
    /// Auth endpoints (login/register/refresh) rate limit: attempts per window.
    pub auth_rate_limit_attempts: u32,
    pub auth_rate_limit_window: Duration,
    /// Upload rate limit: uploads per subject per window.
    pub upload_rate_limit_count: u32,
    pub upload_rate_limit_window: Duration,
    /// Request timeout
    pub request_timeout: Duration,
    /// Max request body size, used as the hard cap before per-org
    /// `max_video_size_mb` is checked.
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,

    /// Token Service: spec.md §4.1. The two secrets must differ.
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,

    /// Upload Handler defaults applied when an organization has not set its
    /// own `settings.allowed_formats`/`max_video_size_mb` (spec.md §3).
    pub default_max_video_size_mb: u64,
    pub default_allowed_formats: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            frontend_origin: "http://localhost:3000".to_string(),
            rate_limit_rps: 10,
            rate_limit_burst: 20,
            auth_rate_limit_attempts: 5,
            auth_rate_limit_window: Duration::from_secs(15 * 60),
            upload_rate_limit_count: 20,
            upload_rate_limit_window: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(30),
            max_body_size: 2048 * 1024 * 1024, // 2 GiB, matches default org setting
            environment: "development".to_string(),
            access_token_secret: "dev-only-access-secret-change-me".to_string(),
            refresh_token_secret: "dev-only-refresh-secret-change-me".to_string(),
            access_token_ttl: chrono::Duration::minutes(15),
            refresh_token_ttl: chrono::Duration::days(7),
            default_max_video_size_mb: 2048,
            default_allowed_formats: vec![
                "mp4".to_string(),
                "mov".to_string(),
                "avi".to_string(),
                "mkv".to_string(),
                "webm".to_string(),
            ],
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            frontend_origin: std::env::var("FRONTEND_ORIGIN").unwrap_or(defaults.frontend_origin),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            auth_rate_limit_attempts: env_parse("AUTH_RATE_LIMIT_ATTEMPTS")
                .unwrap_or(defaults.auth_rate_limit_attempts),
            auth_rate_limit_window: env_secs("AUTH_RATE_LIMIT_WINDOW_SECS")
                .unwrap_or(defaults.auth_rate_limit_window),
            upload_rate_limit_count: env_parse("UPLOAD_RATE_LIMIT_COUNT")
                .unwrap_or(defaults.upload_rate_limit_count),
            upload_rate_limit_window: env_secs("UPLOAD_RATE_LIMIT_WINDOW_SECS")
                .unwrap_or(defaults.upload_rate_limit_window),
            request_timeout: env_secs("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.request_timeout),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            access_token_secret: std::env::var("ACCESS_TOKEN_SECRET")
                .unwrap_or(defaults.access_token_secret),
            refresh_token_secret: std::env::var("REFRESH_TOKEN_SECRET")
                .unwrap_or(defaults.refresh_token_secret),
            access_token_ttl: env_parse::<i64>("ACCESS_TOKEN_TTL_SECS")
                .map(chrono::Duration::seconds)
                .unwrap_or(defaults.access_token_ttl),
            refresh_token_ttl: env_parse::<i64>("REFRESH_TOKEN_TTL_SECS")
                .map(chrono::Duration::seconds)
                .unwrap_or(defaults.refresh_token_ttl),
            default_max_video_size_mb: env_parse("MAX_VIDEO_SIZE_MB")
                .unwrap_or(defaults.default_max_video_size_mb),
            default_allowed_formats: std::env::var("ALLOWED_VIDEO_FORMATS")
                .map(|s| s.split(',').map(|f| f.trim().to_lowercase()).collect())
                .unwrap_or(defaults.default_allowed_formats),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}
