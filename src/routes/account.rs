// ABOUTME: Account route handlers for profile updates, deferred deletion and data export
// ABOUTME: Deletion marks the account pending and the maintenance job purges it after the grace period
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, put};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::care::deletion;
use crate::errors::{AppError, AppResult};
use crate::export;
use crate::models::{
    AuditEventType, NotificationPriority, NotificationType, User, UserNotification, UserStatus,
};
use crate::routes::extract::Json;
use crate::routes::{authenticate, created, ok};
use crate::server::ServerResources;
use crate::validation::Validator;

/// Profile update
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    /// New display name
    pub display_name: String,
    /// New phone number; absent or blank clears it
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Account routes
pub struct AccountRoutes;

impl AccountRoutes {
    /// Create all account routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/account/profile", put(Self::handle_update_profile))
            .route(
                "/api/account/deletion",
                get(Self::handle_deletion_status)
                    .post(Self::handle_request_deletion)
                    .delete(Self::handle_cancel_deletion),
            )
            .route("/api/account/export", get(Self::handle_export))
            .with_state(resources)
    }

    async fn current_user(resources: &ServerResources, headers: &HeaderMap) -> AppResult<User> {
        let auth = authenticate(resources, headers)?;
        resources
            .database
            .get_user(auth.user_id)
            .await?
            .ok_or_else(|| AppError::auth_invalid("Account no longer exists"))
    }

    async fn handle_update_profile(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<UpdateProfileRequest>,
    ) -> Result<Response, AppError> {
        let user = Self::current_user(&resources, &headers).await?;

        let mut validator = Validator::new();
        let display_name = validator.name("displayName", &request.display_name);
        let phone = validator.phone("phoneNumber", request.phone_number.as_deref());
        validator.finish()?;
        let display_name = display_name.ok_or_else(|| AppError::invalid_input("Invalid name"))?;

        resources
            .database
            .update_user_profile(user.id, &display_name, phone.as_deref())
            .await?;
        let updated = resources
            .database
            .get_user(user.id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        Ok(ok(updated))
    }

    async fn handle_deletion_status(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let user = Self::current_user(&resources, &headers).await?;
        let status = resources
            .database
            .get_account_deletion(user.id)
            .await?
            .filter(|d| d.is_active())
            .map(|d| deletion::status(&d, Utc::now()));
        Ok(ok(status))
    }

    #[instrument(skip(resources, headers), fields(route = "request_deletion"))]
    async fn handle_request_deletion(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let user = Self::current_user(&resources, &headers).await?;
        let now = Utc::now();
        let existing = resources.database.get_account_deletion(user.id).await?;
        let request = deletion::request(
            user.id,
            existing.as_ref(),
            now,
            resources.config.care.deletion_grace_days,
        )?;

        resources.database.schedule_account_deletion(&request).await?;
        resources
            .database
            .set_user_status(user.id, UserStatus::PendingDeletion)
            .await?;
        resources
            .auditor
            .log_user_event(
                AuditEventType::DeletionRequested,
                user.id,
                format!("Deletion scheduled for {}", request.scheduled_for),
            )
            .await;

        let status = deletion::status(&request, now);
        resources
            .notifications
            .notify(
                UserNotification::new(
                    user.id,
                    NotificationType::AccountDeletion,
                    NotificationPriority::High,
                    "Account deletion scheduled",
                    format!(
                        "Your account and its data will be deleted in {} days. You can cancel before then.",
                        status.days_remaining
                    ),
                )
                .with_action_url("/settings/account")
                .expiring_at(request.scheduled_for),
            )
            .await?;
        info!(user_id = %user.id, "Account deletion requested");

        Ok(created(status))
    }

    #[instrument(skip(resources, headers), fields(route = "cancel_deletion"))]
    async fn handle_cancel_deletion(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let user = Self::current_user(&resources, &headers).await?;
        let now = Utc::now();
        let existing = resources.database.get_account_deletion(user.id).await?;
        deletion::ensure_cancellable(existing.as_ref(), now)?;

        resources.database.cancel_account_deletion(user.id, now).await?;
        resources
            .database
            .set_user_status(user.id, UserStatus::Active)
            .await?;
        resources
            .auditor
            .log_user_event(AuditEventType::DeletionCancelled, user.id, "Deletion cancelled")
            .await;

        Ok(ok(serde_json::json!({ "status": UserStatus::Active })))
    }

    async fn handle_export(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let user = Self::current_user(&resources, &headers).await?;
        let document = export::build(&resources.database, user.id, Utc::now()).await?;
        resources
            .auditor
            .log_user_event(AuditEventType::DataExported, user.id, "Data export generated")
            .await;
        Ok(ok(document))
    }
}
