// ABOUTME: Database operations for user accounts and deferred account deletion
// ABOUTME: Create/lookup users, profile and password updates, deletion scheduling and purge
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use super::{is_unique_violation, parse_id, parse_opt_ts, parse_stored, parse_ts, ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{AccountDeletion, User, UserStatus};

const USER_COLUMNS: &str =
    "id, email, display_name, phone_number, password_hash, status, created_at, last_active";

fn row_to_user(row: &SqliteRow) -> AppResult<User> {
    Ok(User {
        id: parse_id(&row.get::<String, _>("id"))?,
        email: row.get("email"),
        display_name: row.get("display_name"),
        phone_number: row.get("phone_number"),
        password_hash: row.get("password_hash"),
        status: parse_stored(&row.get::<String, _>("status"))?,
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
        last_active: parse_ts(&row.get::<String, _>("last_active"))?,
    })
}

fn row_to_deletion(row: &SqliteRow) -> AppResult<AccountDeletion> {
    Ok(AccountDeletion {
        user_id: parse_id(&row.get::<String, _>("user_id"))?,
        requested_at: parse_ts(&row.get::<String, _>("requested_at"))?,
        scheduled_for: parse_ts(&row.get::<String, _>("scheduled_for"))?,
        cancelled_at: parse_opt_ts(row.get("cancelled_at"))?,
    })
}

impl Database {
    /// Insert a new user
    ///
    /// # Errors
    ///
    /// Returns `ResourceAlreadyExists` if the email is taken, or a database error.
    pub async fn create_user(&self, user: &User) -> AppResult<Uuid> {
        sqlx::query(
            r"
            INSERT INTO users (id, email, display_name, phone_number, password_hash, status, created_at, last_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.phone_number)
        .bind(&user.password_hash)
        .bind(user.status.as_str())
        .bind(ts(user.created_at))
        .bind(ts(user.last_active))
        .execute(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::already_exists("An account with this email already exists")
            } else {
                AppError::database(format!("Failed to create user: {e}"))
            }
        })?;

        Ok(user.id)
    }

    /// Fetch a user by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(user_id.to_string())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to get user: {e}")))?;
        row.as_ref().map(row_to_user).transpose()
    }

    /// Fetch a user by email (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))
            .bind(email.trim().to_lowercase())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to get user by email: {e}")))?;
        row.as_ref().map(row_to_user).transpose()
    }

    /// Update display name and phone number
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the user does not exist.
    pub async fn update_user_profile(
        &self,
        user_id: Uuid,
        display_name: &str,
        phone_number: Option<&str>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET display_name = ?1, phone_number = ?2 WHERE id = ?3",
        )
        .bind(display_name)
        .bind(phone_number)
        .bind(user_id.to_string())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update profile: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User"));
        }
        Ok(())
    }

    /// Replace the password hash
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the user does not exist.
    pub async fn update_user_password(&self, user_id: Uuid, password_hash: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
            .bind(password_hash)
            .bind(user_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to update password: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User"));
        }
        Ok(())
    }

    /// Record authenticated activity
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn touch_user_last_active(&self, user_id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_active = ?1 WHERE id = ?2")
            .bind(ts(at))
            .bind(user_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to update last_active: {e}")))?;
        Ok(())
    }

    /// Set the account status
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn set_user_status(&self, user_id: Uuid, status: UserStatus) -> AppResult<()> {
        sqlx::query("UPDATE users SET status = ?1 WHERE id = ?2")
            .bind(status.as_str())
            .bind(user_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to update user status: {e}")))?;
        Ok(())
    }

    /// Store (or replace) a deletion request and mark the user pending
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn schedule_account_deletion(&self, deletion: &AccountDeletion) -> AppResult<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO account_deletions (user_id, requested_at, scheduled_for, cancelled_at)
            VALUES (?1, ?2, ?3, NULL)
            ON CONFLICT(user_id) DO UPDATE SET
                requested_at = excluded.requested_at,
                scheduled_for = excluded.scheduled_for,
                cancelled_at = NULL
            ",
        )
        .bind(deletion.user_id.to_string())
        .bind(ts(deletion.requested_at))
        .bind(ts(deletion.scheduled_for))
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to schedule deletion: {e}")))?;

        sqlx::query("UPDATE users SET status = ?1 WHERE id = ?2")
            .bind(UserStatus::PendingDeletion.as_str())
            .bind(deletion.user_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to update user status: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit deletion request: {e}")))
    }

    /// The user's deletion request, cancelled or not
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_account_deletion(&self, user_id: Uuid) -> AppResult<Option<AccountDeletion>> {
        let row = sqlx::query(
            "SELECT user_id, requested_at, scheduled_for, cancelled_at FROM account_deletions WHERE user_id = ?1",
        )
        .bind(user_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get deletion request: {e}")))?;
        row.as_ref().map(row_to_deletion).transpose()
    }

    /// Mark an active deletion request cancelled and restore the account
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn cancel_account_deletion(
        &self,
        user_id: Uuid,
        cancelled_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        sqlx::query(
            "UPDATE account_deletions SET cancelled_at = ?1 WHERE user_id = ?2 AND cancelled_at IS NULL",
        )
        .bind(ts(cancelled_at))
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to cancel deletion: {e}")))?;

        sqlx::query("UPDATE users SET status = ?1 WHERE id = ?2")
            .bind(UserStatus::Active.as_str())
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to update user status: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit cancellation: {e}")))
    }

    /// Users whose grace period ended at or before `now`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_due_account_deletions(&self, now: DateTime<Utc>) -> AppResult<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT user_id FROM account_deletions WHERE cancelled_at IS NULL AND scheduled_for <= ?1",
        )
        .bind(ts(now))
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list due deletions: {e}")))?;

        rows.iter()
            .map(|row| parse_id(&row.get::<String, _>("user_id")))
            .collect()
    }

    /// Hard-delete a user; owned groups, agencies and their records cascade
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_user(&self, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(user_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to delete user: {e}")))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(user_id = %user_id, "User account purged");
        }
        Ok(deleted)
    }
}
