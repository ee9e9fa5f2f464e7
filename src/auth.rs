// ABOUTME: JWT session tokens and bcrypt password hashing
// ABOUTME: AuthManager issues and validates HS256 tokens and extracts them from bearer headers or cookies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # Authentication
//!
//! Sessions are stateless HS256 JWTs. A token is accepted from the
//! `Authorization: Bearer` header first and the `auth_token` cookie second.
//! Password hashing runs on the blocking pool since bcrypt is CPU bound.

use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::environment::AuthConfig;
use crate::constants::auth::{AUTH_COOKIE_NAME, JWT_ISSUER};
use crate::errors::{AppError, AppResult};
use crate::models::User;
use crate::security::cookies::get_cookie_value;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Email at issue time
    pub email: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

/// The caller of an authenticated request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// User id
    pub user_id: Uuid,
    /// Email from the token
    pub email: String,
}

/// Token issuance, validation and password hashing
#[derive(Clone)]
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_hours: i64,
    bcrypt_cost: u32,
}

impl AuthManager {
    /// Create from configuration
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            expiry_hours: config.jwt_expiry_hours,
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    /// Token lifetime in seconds
    #[must_use]
    pub const fn token_lifetime_secs(&self) -> i64 {
        self.expiry_hours * 3600
    }

    /// Issue a session token for `user`
    ///
    /// # Errors
    ///
    /// Returns an internal error if signing fails.
    pub fn generate_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.expiry_hours)).timestamp(),
            iss: JWT_ISSUER.to_owned(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign token: {e}")))
    }

    /// Validate a token and return its claims
    ///
    /// # Errors
    ///
    /// Returns `AuthExpired` for an expired token and `AuthInvalid` otherwise.
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[JWT_ISSUER]);
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::auth_expired("Session expired"),
                _ => {
                    debug!(error = %e, "Token validation failed");
                    AppError::auth_invalid("Invalid session token")
                }
            })
    }

    /// Authenticate a request from its headers
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` when no token is present, or the validation error.
    pub fn authenticate(&self, headers: &HeaderMap) -> AppResult<AuthenticatedUser> {
        let token = extract_token(headers)
            .ok_or_else(|| AppError::auth_required("Authentication required"))?;
        let claims = self.validate_token(&token)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::auth_invalid("Invalid session token"))?;
        Ok(AuthenticatedUser {
            user_id,
            email: claims.email,
        })
    }

    /// Hash a password with the configured cost
    ///
    /// # Errors
    ///
    /// Returns an internal error if hashing fails.
    pub async fn hash_password(&self, password: &str) -> AppResult<String> {
        let password = password.to_owned();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AppError::internal(format!("Password hashing task failed: {e}")))?
            .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))
    }

    /// Check a password against a stored hash
    ///
    /// # Errors
    ///
    /// Returns an internal error if the hash is malformed.
    pub async fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AppError::internal(format!("Password check task failed: {e}")))?
            .map_err(|e| AppError::internal(format!("Password check failed: {e}")))
    }
}

/// Token from `Authorization: Bearer` or the auth cookie
#[must_use]
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned);
    bearer.or_else(|| get_cookie_value(headers, AUTH_COOKIE_NAME).filter(|t| !t.is_empty()))
}
