// ABOUTME: Session cookie helpers for the JWT auth cookie
// ABOUTME: Builds HttpOnly SameSite=Lax cookies, clears them on logout and reads them back from requests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use std::fmt::Write;

use axum::http::{header, HeaderMap, HeaderValue};

use crate::constants::auth::AUTH_COOKIE_NAME;

/// `SameSite` cookie policy
#[derive(Debug, Clone, Copy)]
pub enum SameSitePolicy {
    /// Only sent in first-party context
    Strict,
    /// Sent on top-level navigation
    Lax,
}

/// A `Set-Cookie` value under construction
#[derive(Debug, Clone)]
pub struct SessionCookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Max-Age in seconds
    pub max_age_secs: i64,
    /// HTTPS only
    pub secure: bool,
    /// `SameSite` policy
    pub same_site: SameSitePolicy,
}

impl SessionCookie {
    /// An HttpOnly Lax cookie scoped to `/`
    #[must_use]
    pub fn new(name: &str, value: &str, max_age_secs: i64, secure: bool) -> Self {
        Self {
            name: name.to_owned(),
            value: value.to_owned(),
            max_age_secs,
            secure,
            same_site: SameSitePolicy::Lax,
        }
    }

    /// Render the header value
    #[must_use]
    pub fn build(&self) -> String {
        let mut cookie = format!("{}={}", self.name, self.value);
        let _ = write!(cookie, "; Max-Age={}; Path=/; HttpOnly", self.max_age_secs);
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str(match self.same_site {
            SameSitePolicy::Strict => "; SameSite=Strict",
            SameSitePolicy::Lax => "; SameSite=Lax",
        });
        cookie
    }
}

/// Attach the auth cookie carrying `token`
pub fn set_auth_cookie(headers: &mut HeaderMap, token: &str, max_age_secs: i64, secure: bool) {
    let cookie = SessionCookie::new(AUTH_COOKIE_NAME, token, max_age_secs, secure);
    if let Ok(value) = HeaderValue::from_str(&cookie.build()) {
        headers.append(header::SET_COOKIE, value);
    }
}

/// Expire the auth cookie
pub fn clear_auth_cookie(headers: &mut HeaderMap, secure: bool) {
    set_auth_cookie(headers, "", 0, secure);
}

/// Read a cookie from request headers
#[must_use]
pub fn get_cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name.trim() == cookie_name).then(|| value.trim().to_owned())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_secure_cookie() {
        let cookie = SessionCookie::new("auth_token", "abc", 60, true).build();
        assert_eq!(
            cookie,
            "auth_token=abc; Max-Age=60; Path=/; HttpOnly; Secure; SameSite=Lax"
        );
    }

    #[test]
    fn reads_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; auth_token=xyz; lang=en"),
        );
        assert_eq!(get_cookie_value(&headers, "auth_token").as_deref(), Some("xyz"));
        assert_eq!(get_cookie_value(&headers, "missing"), None);
    }
}
