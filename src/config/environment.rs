// ABOUTME: Environment-based configuration for the MyGuide server
// ABOUTME: Parses env vars into ServerConfig with development defaults and production checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # Configuration
//!
//! All configuration comes from environment variables. Every setting has a
//! development default except the secrets, which must be provided when
//! `MYGUIDE_ENV=production`.
//!
//! | Variable | Default |
//! |---|---|
//! | `HTTP_HOST` / `HTTP_PORT` | `0.0.0.0` / `8081` |
//! | `DATABASE_URL` | `sqlite:./data/myguide.db` |
//! | `MYGUIDE_ENCRYPTION_KEY` | random (base64, 32 bytes) |
//! | `JWT_SECRET` | random |
//! | `JWT_EXPIRY_HOURS` | `168` |
//! | `BCRYPT_COST` | `12` |
//! | `CORS_ALLOWED_ORIGINS` | `*` (comma separated) |
//! | `OPENFDA_BASE_URL` / `OPENFDA_API_KEY` | `https://api.fda.gov` / none |
//! | `GEMINI_API_KEY` / `GEMINI_MODEL` | none / `gemini-2.0-flash` |
//! | `RESEND_API_KEY` / `EMAIL_FROM` | none / `MyGuide <noreply@myguide.health>` |

use std::env;
use std::str::FromStr;

use base64::{engine::general_purpose, Engine};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants;
use crate::errors::{AppError, AppResult};

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse leniently; unknown values fall back to development
    #[must_use]
    pub fn from_str_or_default(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Whether this is a production deployment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Database settings
#[derive(Clone)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    pub url: String,
    /// AES-256-GCM key for field encryption and HMAC lookups
    pub encryption_key: [u8; 32],
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url)
            .field("encryption_key", &"[REDACTED]")
            .finish()
    }
}

/// Authentication settings
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 signing secret
    pub jwt_secret: String,
    /// Token lifetime
    pub jwt_expiry_hours: i64,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expiry_hours", &self.jwt_expiry_hours)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

/// Auth endpoint throttling
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Attempts allowed per window
    pub auth_max_attempts: u32,
    /// Window length in seconds
    pub auth_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth_max_attempts: constants::rate_limits::AUTH_MAX_ATTEMPTS,
            auth_window_secs: constants::rate_limits::AUTH_WINDOW_SECONDS,
        }
    }
}

/// Gemini / `MedGemma` settings
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key; AI features answer 502 when absent
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// API base URL
    pub base_url: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Third-party services
#[derive(Debug, Clone)]
pub struct ExternalServicesConfig {
    /// openFDA base URL
    pub openfda_base_url: String,
    /// Optional openFDA key (raises the upstream rate limit)
    pub openfda_api_key: Option<String>,
    /// LLM provider settings
    pub gemini: GeminiConfig,
    /// Resend API key; notifications are only logged when absent
    pub resend_api_key: Option<String>,
    /// Sender address for outgoing email
    pub email_from: String,
}

/// Response headers and CORS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityHeadersConfig {
    /// Allowed CORS origins; `*` allows any
    pub cors_allowed_origins: Vec<String>,
    /// Send `Strict-Transport-Security`
    pub hsts_enabled: bool,
    /// Mark auth cookies `Secure`
    pub secure_cookies: bool,
    /// Take the client address from `X-Forwarded-For`/`X-Real-IP`; only safe
    /// behind a proxy that overwrites them
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

/// Tunables for the care rules and the maintenance job
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CareConfig {
    /// Minutes each caregiver has to answer a shift offer
    pub offer_window_minutes: i64,
    /// Days an accepted consent stays valid
    pub consent_validity_days: i64,
    /// Minimum read time before consent acceptance counts
    pub consent_min_read_secs: u32,
    /// Days between a deletion request and the purge
    pub deletion_grace_days: i64,
    /// Days before a cached label is refetched
    pub label_max_age_days: i64,
    /// Seconds between maintenance runs
    pub maintenance_interval_secs: u64,
}

impl Default for CareConfig {
    fn default() -> Self {
        Self {
            offer_window_minutes: constants::shifts::DEFAULT_OFFER_WINDOW_MINUTES,
            consent_validity_days: constants::consent::VALIDITY_DAYS,
            consent_min_read_secs: constants::consent::MIN_READ_TIME_SECONDS,
            deletion_grace_days: constants::accounts::DELETION_GRACE_DAYS,
            label_max_age_days: constants::labels::MAX_AGE_DAYS,
            maintenance_interval_secs: 300,
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub http_host: String,
    /// HTTP port
    pub http_port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Database
    pub database: DatabaseConfig,
    /// Authentication
    pub auth: AuthConfig,
    /// Rate limits
    pub rate_limit: RateLimitConfig,
    /// Third-party services
    pub external: ExternalServicesConfig,
    /// Headers and CORS
    pub security: SecurityHeadersConfig,
    /// Care rule tunables
    pub care: CareConfig,
}

impl ServerConfig {
    /// Development defaults with freshly generated secrets
    #[must_use]
    pub fn development_defaults() -> Self {
        Self {
            http_host: "0.0.0.0".to_owned(),
            http_port: 8081,
            environment: Environment::Development,
            database: DatabaseConfig {
                url: "sqlite:./data/myguide.db".to_owned(),
                encryption_key: generate_key(),
            },
            auth: AuthConfig {
                jwt_secret: general_purpose::STANDARD.encode(generate_key()),
                jwt_expiry_hours: constants::auth::DEFAULT_JWT_EXPIRY_HOURS,
                bcrypt_cost: constants::auth::DEFAULT_BCRYPT_COST,
            },
            rate_limit: RateLimitConfig::default(),
            external: ExternalServicesConfig {
                openfda_base_url: "https://api.fda.gov".to_owned(),
                openfda_api_key: None,
                gemini: GeminiConfig {
                    api_key: None,
                    model: "gemini-2.0-flash".to_owned(),
                    base_url: "https://generativelanguage.googleapis.com/v1beta".to_owned(),
                },
                resend_api_key: None,
                email_from: "MyGuide <noreply@myguide.health>".to_owned(),
            },
            security: SecurityHeadersConfig {
                cors_allowed_origins: vec!["*".to_owned()],
                hsts_enabled: false,
                secure_cookies: false,
                trust_forwarded_headers: false,
            },
            care: CareConfig::default(),
        }
    }

    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns a config error if a variable is malformed, or if a secret is
    /// missing in production.
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::development_defaults();
        config.environment = Environment::from_str_or_default(
            &env::var("MYGUIDE_ENV").unwrap_or_else(|_| "development".to_owned()),
        );
        let production = config.environment.is_production();

        if let Ok(host) = env::var("HTTP_HOST") {
            config.http_host = host;
        }
        config.http_port = parse_var("HTTP_PORT", config.http_port)?;

        if let Ok(url) = env::var("DATABASE_URL") {
            config.database.url = url;
        }
        match env::var("MYGUIDE_ENCRYPTION_KEY") {
            Ok(encoded) => config.database.encryption_key = decode_key(&encoded)?,
            Err(_) if production => {
                return Err(AppError::config(
                    "MYGUIDE_ENCRYPTION_KEY is required in production",
                ))
            }
            Err(_) => warn!("MYGUIDE_ENCRYPTION_KEY not set; using an ephemeral key"),
        }

        match env::var("JWT_SECRET") {
            Ok(secret) if secret.len() >= 32 => config.auth.jwt_secret = secret,
            Ok(_) => return Err(AppError::config("JWT_SECRET must be at least 32 characters")),
            Err(_) if production => {
                return Err(AppError::config("JWT_SECRET is required in production"))
            }
            Err(_) => warn!("JWT_SECRET not set; sessions will not survive a restart"),
        }
        config.auth.jwt_expiry_hours = parse_var("JWT_EXPIRY_HOURS", config.auth.jwt_expiry_hours)?;
        config.auth.bcrypt_cost = parse_var("BCRYPT_COST", config.auth.bcrypt_cost)?;

        config.rate_limit.auth_max_attempts =
            parse_var("AUTH_RATE_LIMIT_ATTEMPTS", config.rate_limit.auth_max_attempts)?;
        config.rate_limit.auth_window_secs =
            parse_var("AUTH_RATE_LIMIT_WINDOW_SECS", config.rate_limit.auth_window_secs)?;

        if let Ok(url) = env::var("OPENFDA_BASE_URL") {
            config.external.openfda_base_url = url;
        }
        config.external.openfda_api_key = optional_var("OPENFDA_API_KEY");
        config.external.gemini.api_key = optional_var("GEMINI_API_KEY");
        if let Ok(model) = env::var("GEMINI_MODEL") {
            config.external.gemini.model = model;
        }
        if let Ok(url) = env::var("GEMINI_BASE_URL") {
            config.external.gemini.base_url = url;
        }
        config.external.resend_api_key = optional_var("RESEND_API_KEY");
        if let Ok(from) = env::var("EMAIL_FROM") {
            config.external.email_from = from;
        }

        if let Ok(origins) = env::var("CORS_ALLOWED_ORIGINS") {
            config.security.cors_allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_owned)
                .collect();
        }
        config.security.hsts_enabled = production;
        config.security.secure_cookies = production;
        config.security.trust_forwarded_headers = parse_var(
            "TRUST_PROXY_HEADERS",
            config.security.trust_forwarded_headers,
        )?;

        config.care.offer_window_minutes =
            parse_var("SHIFT_OFFER_WINDOW_MINUTES", config.care.offer_window_minutes)?;
        config.care.maintenance_interval_secs = parse_var(
            "MAINTENANCE_INTERVAL_SECS",
            config.care.maintenance_interval_secs,
        )?;

        Ok(config)
    }
}

/// Generate a random 32-byte key
#[must_use]
pub fn generate_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::thread_rng().fill(&mut key);
    key
}

/// Decode a base64 32-byte key
///
/// # Errors
///
/// Returns a config error if the value is not base64 or not 32 bytes long.
pub fn decode_key(encoded: &str) -> AppResult<[u8; 32]> {
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| AppError::config(format!("Encryption key is not valid base64: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| AppError::config("Encryption key must decode to exactly 32 bytes"))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> AppResult<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("{name} is invalid: {e}"))),
        Err(_) => Ok(default),
    }
}
