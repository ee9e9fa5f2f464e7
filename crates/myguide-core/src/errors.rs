// ABOUTME: Unified error type with stable error codes and HTTP status mapping
// ABOUTME: AppError carries a code, a user-facing message and optional field-level validation errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # Error handling
//!
//! Every fallible operation in the server returns [`AppResult`]. Errors carry an
//! [`ErrorCode`] which decides the HTTP status, a message safe to show to the
//! caller, and (for validation failures) a list of per-field messages.
//!
//! With the `http-response` feature enabled, [`AppError`] converts directly into
//! an axum response with a `{ "error", "code", "errors"? }` JSON body.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result alias used throughout the workspace
pub type AppResult<T> = Result<T, AppError>;

/// Stable machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Authentication
    /// No credentials were supplied
    AuthRequired,
    /// Credentials were supplied but are invalid
    AuthInvalid,
    /// Token has expired
    AuthExpired,

    // Authorization
    /// Caller lacks permission for the resource
    PermissionDenied,
    /// AI or medical feature used without a valid consent record
    ConsentRequired,

    // Throttling
    /// Too many requests in the current window
    RateLimitExceeded,
    /// Subscription quota exhausted
    QuotaExceeded,

    // Validation
    /// Generic invalid input
    InvalidInput,
    /// Required field missing
    MissingRequiredField,
    /// Field present but malformed
    InvalidFormat,

    // Resources
    /// Resource does not exist
    ResourceNotFound,
    /// Resource already exists
    ResourceAlreadyExists,
    /// Operation not allowed from the resource's current state
    InvalidStateTransition,
    /// Subscription tier limit reached
    TierLimitReached,

    // Infrastructure
    /// Upstream service failed
    ExternalServiceError,
    /// Server misconfiguration
    ConfigError,
    /// Database failure
    DatabaseError,
    /// Unexpected failure
    InternalError,
}

impl ErrorCode {
    /// HTTP status code for this error
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidInput | Self::MissingRequiredField | Self::InvalidFormat => 400,
            Self::AuthRequired | Self::AuthInvalid | Self::AuthExpired => 401,
            Self::PermissionDenied | Self::ConsentRequired | Self::TierLimitReached => 403,
            Self::ResourceNotFound => 404,
            Self::ResourceAlreadyExists | Self::InvalidStateTransition => 409,
            Self::RateLimitExceeded | Self::QuotaExceeded => 429,
            Self::ExternalServiceError => 502,
            Self::ConfigError | Self::DatabaseError | Self::InternalError => 500,
        }
    }

    /// Snake-case code string used in response bodies
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthRequired => "auth_required",
            Self::AuthInvalid => "auth_invalid",
            Self::AuthExpired => "auth_expired",
            Self::PermissionDenied => "permission_denied",
            Self::ConsentRequired => "consent_required",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::QuotaExceeded => "quota_exceeded",
            Self::InvalidInput => "invalid_input",
            Self::MissingRequiredField => "missing_required_field",
            Self::InvalidFormat => "invalid_format",
            Self::ResourceNotFound => "resource_not_found",
            Self::ResourceAlreadyExists => "resource_already_exists",
            Self::InvalidStateTransition => "invalid_state_transition",
            Self::TierLimitReached => "tier_limit_reached",
            Self::ExternalServiceError => "external_service_error",
            Self::ConfigError => "config_error",
            Self::DatabaseError => "database_error",
            Self::InternalError => "internal_error",
        }
    }

    /// Whether the message may leak internals and must be masked in responses
    #[must_use]
    pub const fn is_server_error(self) -> bool {
        self.http_status() >= 500
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Request field name (camelCase, as sent by the client)
    pub field: String,
    /// Human-readable message
    pub message: String,
}

impl FieldError {
    /// Create a field error
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Application error
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Message (masked for server errors when rendered over HTTP)
    pub message: String,
    /// Per-field validation failures
    pub field_errors: Vec<FieldError>,
    /// Seconds until the caller may retry (rate limiting)
    pub retry_after_secs: Option<u64>,
}

impl AppError {
    /// Create an error with an explicit code
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field_errors: Vec::new(),
            retry_after_secs: None,
        }
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Validation failure with per-field details
    #[must_use]
    pub fn validation(field_errors: Vec<FieldError>) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: "Validation failed".to_owned(),
            field_errors,
            retry_after_secs: None,
        }
    }

    /// Missing credentials
    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthRequired, message)
    }

    /// Invalid credentials
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthInvalid, message)
    }

    /// Expired credentials
    pub fn auth_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthExpired, message)
    }

    /// Permission denied
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    /// Consent gate denied the request
    pub fn consent_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConsentRequired, message)
    }

    /// Rate limited, with a retry hint
    pub fn rate_limited(message: impl Into<String>, retry_after_secs: u64) -> Self {
        Self {
            retry_after_secs: Some(retry_after_secs),
            ..Self::new(ErrorCode::RateLimitExceeded, message)
        }
    }

    /// Quota exhausted
    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::QuotaExceeded, message)
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self::new(ErrorCode::ResourceNotFound, format!("{resource} not found"))
    }

    /// Resource already exists
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceAlreadyExists, message)
    }

    /// Operation not allowed from the current state
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidStateTransition, message)
    }

    /// Subscription tier limit reached
    pub fn tier_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TierLimitReached, message)
    }

    /// Upstream service failure
    pub fn external_service(service: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::ExternalServiceError, format!("{service}: {message}"))
    }

    /// Configuration failure
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Database failure
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Unexpected failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// HTTP status code
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Message suitable for the response body
    #[must_use]
    pub fn public_message(&self) -> &str {
        if self.code.is_server_error() && self.code != ErrorCode::ExternalServiceError {
            "An unexpected error occurred"
        } else {
            &self.message
        }
    }

    /// JSON body for this error
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "error": self.public_message(),
            "code": self.code.as_str(),
        });
        if !self.field_errors.is_empty() {
            body["errors"] = serde_json::json!(self.field_errors);
        }
        body
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::internal(format!("JSON serialization failed: {error}"))
    }
}

impl From<uuid::Error> for AppError {
    fn from(error: uuid::Error) -> Self {
        Self::new(ErrorCode::InvalidFormat, format!("Invalid identifier: {error}"))
    }
}

#[cfg(feature = "http-response")]
mod http_response {
    use axum::{
        extract::rejection::{JsonRejection, PathRejection, QueryRejection},
        http::{header, HeaderValue, StatusCode},
        response::{IntoResponse, Response},
        Json,
    };

    use super::AppError;

    impl From<JsonRejection> for AppError {
        fn from(rejection: JsonRejection) -> Self {
            Self::invalid_input(format!("Invalid request body: {}", rejection.body_text()))
        }
    }

    impl From<QueryRejection> for AppError {
        fn from(rejection: QueryRejection) -> Self {
            Self::invalid_input(format!("Invalid query string: {}", rejection.body_text()))
        }
    }

    impl From<PathRejection> for AppError {
        fn from(rejection: PathRejection) -> Self {
            Self::invalid_input(format!("Invalid path: {}", rejection.body_text()))
        }
    }

    impl IntoResponse for AppError {
        fn into_response(self) -> Response {
            let status =
                StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

            if self.code.is_server_error() {
                tracing::error!(code = %self.code, error = %self.message, "Request failed");
            } else {
                tracing::debug!(code = %self.code, error = %self.message, "Request rejected");
            }

            let mut response = (status, Json(self.to_json())).into_response();
            if let Some(retry_after) = self.retry_after_secs {
                if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
            }
            response
        }
    }
}
