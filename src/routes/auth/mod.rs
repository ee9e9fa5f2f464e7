// ABOUTME: Authentication route handlers for signup, login, logout, session and password change
// ABOUTME: Signup and login are throttled per client address and audited
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! Authentication routes
//!
//! Tokens are returned in the body and set as an `HttpOnly` cookie. Signup and
//! login share one sliding window per client address; a full window answers
//! 429 with `Retry-After`.

/// Request and response types
pub mod types;

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::{AppError, AppResult};
use crate::models::{AuditEventType, User};
use crate::routes::extract::{ClientIp, Json};
use crate::routes::{authenticate, created, ok};
use crate::security::cookies::{clear_auth_cookie, set_auth_cookie};
use crate::server::ServerResources;
use crate::validation::Validator;

pub use types::{
    AgencyMembershipInfo, AuthResponse, ChangePasswordRequest, GroupMembershipInfo, LoginRequest,
    SessionResponse, SignupRequest,
};

/// Authentication routes
pub struct AuthRoutes;

impl AuthRoutes {
    /// Create all authentication routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/auth/signup", post(Self::handle_signup))
            .route("/api/auth/login", post(Self::handle_login))
            .route("/api/auth/logout", post(Self::handle_logout))
            .route("/api/auth/me", get(Self::handle_me))
            .route("/api/auth/password", put(Self::handle_change_password))
            .with_state(resources)
    }

    /// Count an attempt from the caller and reject a full window
    async fn enforce_rate_limit(
        resources: &ServerResources,
        ip: &str,
        endpoint: &str,
    ) -> AppResult<()> {
        let status = resources
            .auth_rate_limiter
            .check_and_record(&format!("auth:{ip}"), Utc::now());
        if status.is_limited {
            resources.auditor.log_rate_limited(ip, endpoint).await;
            return Err(AppError::rate_limited(
                "Too many attempts. Please try again later.",
                status.retry_after_seconds.unwrap_or(1),
            ));
        }
        Ok(())
    }

    fn issue_token(
        resources: &ServerResources,
        user: User,
        respond: fn(AuthResponse) -> Response,
    ) -> AppResult<Response> {
        let token = resources.auth_manager.generate_token(&user)?;
        let lifetime = resources.auth_manager.token_lifetime_secs();
        let mut response = respond(AuthResponse {
            token: token.clone(),
            expires_at: Utc::now() + Duration::seconds(lifetime),
            user,
        });
        set_auth_cookie(
            response.headers_mut(),
            &token,
            lifetime,
            resources.config.security.secure_cookies,
        );
        Ok(response)
    }

    #[instrument(skip(resources, request), fields(route = "signup"))]
    async fn handle_signup(
        State(resources): State<Arc<ServerResources>>,
        ClientIp(ip): ClientIp,
        Json(request): Json<SignupRequest>,
    ) -> Result<Response, AppError> {
        Self::enforce_rate_limit(&resources, &ip, "/api/auth/signup").await?;

        let mut validator = Validator::new();
        validator
            .email("email", &request.email)
            .password("password", &request.password);
        let display_name = validator.name("displayName", &request.display_name);
        let phone = validator.phone("phoneNumber", request.phone_number.as_deref());
        validator.finish()?;
        let display_name = display_name.ok_or_else(|| AppError::invalid_input("Invalid name"))?;

        let password_hash = resources
            .auth_manager
            .hash_password(&request.password)
            .await?;
        let user = User::new(&request.email, password_hash, display_name, phone);
        resources.database.create_user(&user).await?;

        resources
            .auditor
            .log_authentication(AuditEventType::UserSignup, user.id, &ip)
            .await;
        info!(user_id = %user.id, "User registered");

        Self::issue_token(&resources, user, created)
    }

    #[instrument(skip(resources, request), fields(route = "login"))]
    async fn handle_login(
        State(resources): State<Arc<ServerResources>>,
        ClientIp(ip): ClientIp,
        Json(request): Json<LoginRequest>,
    ) -> Result<Response, AppError> {
        Self::enforce_rate_limit(&resources, &ip, "/api/auth/login").await?;

        let email = request.email.trim().to_lowercase();
        let Some(user) = resources.database.get_user_by_email(&email).await? else {
            resources
                .auditor
                .log_authentication_failure(&email, None, &ip, "unknown email")
                .await;
            return Err(AppError::auth_invalid("Invalid email or password"));
        };

        let verified = resources
            .auth_manager
            .verify_password(&request.password, &user.password_hash)
            .await?;
        if !verified || !user.status.can_login() {
            resources
                .auditor
                .log_authentication_failure(&email, Some(user.id), &ip, "wrong password")
                .await;
            return Err(AppError::auth_invalid("Invalid email or password"));
        }

        resources
            .database
            .touch_user_last_active(user.id, Utc::now())
            .await?;
        resources
            .auditor
            .log_authentication(AuditEventType::UserLogin, user.id, &ip)
            .await;

        Self::issue_token(&resources, user, ok)
    }

    async fn handle_logout(
        State(resources): State<Arc<ServerResources>>,
        ClientIp(ip): ClientIp,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        if let Ok(auth) = authenticate(&resources, &headers) {
            resources
                .auditor
                .log_authentication(AuditEventType::UserLogout, auth.user_id, &ip)
                .await;
        }
        let mut response = ok(json!({ "message": "Logged out successfully" }));
        clear_auth_cookie(
            response.headers_mut(),
            resources.config.security.secure_cookies,
        );
        Ok(response)
    }

    async fn handle_me(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let user = resources
            .database
            .get_user(auth.user_id)
            .await?
            .ok_or_else(|| AppError::auth_invalid("Account no longer exists"))?;

        let groups = resources
            .database
            .list_groups_for_user(user.id)
            .await?
            .into_iter()
            .map(|(group, member)| GroupMembershipInfo {
                group_id: group.id,
                name: group.name,
                role: member.role,
                permission: member.permission,
            })
            .collect();
        let agencies = resources
            .database
            .list_agencies_for_user(user.id)
            .await?
            .into_iter()
            .map(|(agency, member)| AgencyMembershipInfo {
                agency_id: agency.id,
                name: agency.name,
                role: member.role,
            })
            .collect();

        Ok(ok(SessionResponse {
            user,
            groups,
            agencies,
        }))
    }

    #[instrument(skip(resources, headers, request), fields(route = "change_password"))]
    async fn handle_change_password(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<ChangePasswordRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let user = resources
            .database
            .get_user(auth.user_id)
            .await?
            .ok_or_else(|| AppError::auth_invalid("Account no longer exists"))?;

        if !resources
            .auth_manager
            .verify_password(&request.current_password, &user.password_hash)
            .await?
        {
            return Err(AppError::auth_invalid("Current password is incorrect"));
        }

        let mut validator = Validator::new();
        validator.password("newPassword", &request.new_password);
        validator.finish()?;

        let hash = resources
            .auth_manager
            .hash_password(&request.new_password)
            .await?;
        resources.database.update_user_password(user.id, &hash).await?;
        resources
            .auditor
            .log_user_event(AuditEventType::PasswordChanged, user.id, "Password changed")
            .await;

        Ok(ok(json!({ "message": "Password updated" })))
    }
}
