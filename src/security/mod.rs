// ABOUTME: HTTP security hardening, session cookies, audit logging and invite codes
// ABOUTME: Response security headers are derived from the environment and SecurityHeadersConfig
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # Security Module
//!
//! - Response security headers applied to every route
//! - Session cookies for the JWT
//! - Security audit logging
//! - Group invite-code generation

/// Security audit logging
pub mod audit;
/// Secure HTTP cookie utilities
pub mod cookies;
/// Group invite codes
pub mod invite_codes;

/// Security header configuration
pub mod headers {
    use axum::http::{HeaderName, HeaderValue};
    use tracing::warn;

    use crate::config::{Environment, SecurityHeadersConfig};

    const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

    /// Headers to attach to every response
    #[derive(Debug, Clone)]
    pub struct SecurityHeaders {
        headers: Vec<(HeaderName, HeaderValue)>,
    }

    impl SecurityHeaders {
        /// Build the header set for an environment
        ///
        /// HSTS is sent in production, or anywhere `hsts_enabled` is set.
        #[must_use]
        pub fn new(environment: Environment, config: &SecurityHeadersConfig) -> Self {
            let csp = if environment.is_production() {
                "default-src 'none'; frame-ancestors 'none'"
            } else {
                "default-src 'self'; frame-ancestors 'none'"
            };
            let referrer = if environment.is_production() {
                "strict-origin"
            } else {
                "strict-origin-when-cross-origin"
            };

            let mut pairs = vec![
                ("content-security-policy", csp.to_owned()),
                ("x-frame-options", "DENY".to_owned()),
                ("x-content-type-options", "nosniff".to_owned()),
                ("x-xss-protection", "1; mode=block".to_owned()),
                ("referrer-policy", referrer.to_owned()),
                (
                    "permissions-policy",
                    "camera=(), microphone=(), geolocation=()".to_owned(),
                ),
            ];
            if environment.is_production() || config.hsts_enabled {
                pairs.push((
                    "strict-transport-security",
                    format!("max-age={SECONDS_PER_YEAR}; includeSubDomains"),
                ));
            }

            let headers = pairs
                .into_iter()
                .filter_map(|(name, value)| match HeaderValue::from_str(&value) {
                    Ok(value) => Some((HeaderName::from_static(name), value)),
                    Err(e) => {
                        warn!(header = name, error = %e, "Skipping invalid security header");
                        None
                    }
                })
                .collect();
            Self { headers }
        }

        /// Header name/value pairs
        #[must_use]
        pub fn iter(&self) -> impl Iterator<Item = &(HeaderName, HeaderValue)> {
            self.headers.iter()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn names(headers: &SecurityHeaders) -> Vec<&str> {
            headers.iter().map(|(name, _)| name.as_str()).collect()
        }

        #[test]
        fn hsts_only_in_production() {
            let config = SecurityHeadersConfig {
                cors_allowed_origins: vec!["*".to_owned()],
                hsts_enabled: false,
                secure_cookies: false,
                trust_forwarded_headers: false,
            };
            let dev = SecurityHeaders::new(Environment::Development, &config);
            assert!(!names(&dev).contains(&"strict-transport-security"));
            assert!(names(&dev).contains(&"x-frame-options"));

            let prod = SecurityHeaders::new(Environment::Production, &config);
            assert!(names(&prod).contains(&"strict-transport-security"));
        }
    }
}
