// ABOUTME: Notification inbox route handlers: listing, unread count, read and dismiss
// ABOUTME: Callers only ever see and change their own notifications
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::routes::extract::{Path, Query};
use crate::routes::{authenticate, ok};
use crate::server::ServerResources;

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 200;

/// Inbox query
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    /// Only unread entries
    #[serde(default)]
    pub unread_only: bool,
    /// Page size
    pub limit: Option<u32>,
}

/// Notification routes
pub struct NotificationRoutes;

impl NotificationRoutes {
    /// Create all notification routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/notifications", get(Self::handle_list))
            .route("/api/notifications/unread-count", get(Self::handle_unread_count))
            .route("/api/notifications/read-all", post(Self::handle_read_all))
            .route("/api/notifications/:notification_id/read", post(Self::handle_read))
            .route(
                "/api/notifications/:notification_id/dismiss",
                post(Self::handle_dismiss),
            )
            .with_state(resources)
    }

    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<NotificationQuery>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let notifications = resources
            .database
            .list_notifications(auth.user_id, query.unread_only, Utc::now(), limit)
            .await?;
        Ok(ok(notifications))
    }

    async fn handle_unread_count(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let unread = resources
            .database
            .count_unread_notifications(auth.user_id, Utc::now())
            .await?;
        Ok(ok(json!({ "unread": unread })))
    }

    async fn handle_read(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(notification_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        resources
            .database
            .mark_notification_read(auth.user_id, notification_id)
            .await?;
        Ok(ok(json!({ "id": notification_id, "isRead": true })))
    }

    async fn handle_dismiss(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(notification_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        resources
            .database
            .dismiss_notification(auth.user_id, notification_id)
            .await?;
        Ok(ok(json!({ "id": notification_id, "dismissed": true })))
    }

    async fn handle_read_all(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let updated = resources
            .database
            .mark_all_notifications_read(auth.user_id)
            .await?;
        Ok(ok(json!({ "updated": updated })))
    }
}
