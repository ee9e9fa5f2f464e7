// ABOUTME: Database operations for in-app user notifications
// ABOUTME: Listing hides dismissed and expired rows and orders by priority then recency
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{parse_id, parse_opt_ts, parse_stored, parse_ts, ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{NotificationPriority, UserNotification};

const COLUMNS: &str = "id, user_id, notification_type, priority, title, message, action_url, is_read, dismissed, created_at, expires_at";

/// Orders priorities by rank inside SQL
const PRIORITY_RANK_SQL: &str =
    "CASE priority WHEN 'urgent' THEN 3 WHEN 'high' THEN 2 WHEN 'medium' THEN 1 ELSE 0 END";

fn row_to_notification(row: &SqliteRow) -> AppResult<UserNotification> {
    Ok(UserNotification {
        id: parse_id(&row.get::<String, _>("id"))?,
        user_id: parse_id(&row.get::<String, _>("user_id"))?,
        notification_type: parse_stored(&row.get::<String, _>("notification_type"))?,
        priority: parse_stored::<NotificationPriority>(&row.get::<String, _>("priority"))?,
        title: row.get("title"),
        message: row.get("message"),
        action_url: row.get("action_url"),
        read: row.get::<i64, _>("is_read") != 0,
        dismissed: row.get::<i64, _>("dismissed") != 0,
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
        expires_at: parse_opt_ts(row.get("expires_at"))?,
    })
}

impl Database {
    /// Store a notification
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_notification(&self, notification: &UserNotification) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO user_notifications (id, user_id, notification_type, priority, title, message, action_url, is_read, dismissed, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(notification.id.to_string())
        .bind(notification.user_id.to_string())
        .bind(notification.notification_type.as_str())
        .bind(notification.priority.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.action_url)
        .bind(i64::from(notification.read))
        .bind(i64::from(notification.dismissed))
        .bind(ts(notification.created_at))
        .bind(notification.expires_at.map(ts))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to create notification: {e}")))?;
        Ok(())
    }

    /// Visible notifications, most urgent first, then newest
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        now: DateTime<Utc>,
        limit: u32,
    ) -> AppResult<Vec<UserNotification>> {
        let read_filter = if unread_only { "AND is_read = 0" } else { "" };
        let rows = sqlx::query(&format!(
            r"
            SELECT {COLUMNS} FROM user_notifications
            WHERE user_id = ?1 AND dismissed = 0 AND (expires_at IS NULL OR expires_at > ?2) {read_filter}
            ORDER BY {PRIORITY_RANK_SQL} DESC, created_at DESC
            LIMIT ?3
            "
        ))
        .bind(user_id.to_string())
        .bind(ts(now))
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list notifications: {e}")))?;
        rows.iter().map(row_to_notification).collect()
    }

    /// Count of visible unread notifications
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_unread_notifications(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM user_notifications
            WHERE user_id = ?1 AND is_read = 0 AND dismissed = 0 AND (expires_at IS NULL OR expires_at > ?2)
            ",
        )
        .bind(user_id.to_string())
        .bind(ts(now))
        .fetch_one(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to count notifications: {e}")))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Mark one of the user's notifications read
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if it is not the user's notification.
    pub async fn mark_notification_read(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<()> {
        self.set_notification_flag(user_id, notification_id, "is_read")
            .await
    }

    /// Dismiss one of the user's notifications
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if it is not the user's notification.
    pub async fn dismiss_notification(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<()> {
        self.set_notification_flag(user_id, notification_id, "dismissed")
            .await
    }

    /// Mark all of the user's notifications read
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn mark_all_notifications_read(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("UPDATE user_notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0")
            .bind(user_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to mark notifications read: {e}")))?;
        Ok(result.rows_affected())
    }

    /// Remove notifications past their expiry
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_expired_notifications(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM user_notifications WHERE expires_at IS NOT NULL AND expires_at <= ?1",
        )
        .bind(ts(now))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to delete expired notifications: {e}")))?;
        Ok(result.rows_affected())
    }

    async fn set_notification_flag(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
        column: &'static str,
    ) -> AppResult<()> {
        let result = sqlx::query(&format!(
            "UPDATE user_notifications SET {column} = 1 WHERE id = ?1 AND user_id = ?2"
        ))
        .bind(notification_id.to_string())
        .bind(user_id.to_string())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update notification: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Notification"));
        }
        Ok(())
    }
}
