// ABOUTME: Per-user, per-day AI request counters backing the subscription quota
// ABOUTME: Increment is a single upsert so concurrent requests count correctly
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::NaiveDate;
use uuid::Uuid;

use super::Database;
use crate::errors::{AppError, AppResult};

impl Database {
    /// Add one request to the user's counter for `day` and return the new total
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn increment_ai_usage(&self, user_id: Uuid, day: NaiveDate) -> AppResult<u32> {
        let count: i64 = sqlx::query_scalar(
            r"
            INSERT INTO ai_usage (user_id, usage_date, request_count) VALUES (?1, ?2, 1)
            ON CONFLICT(user_id, usage_date) DO UPDATE SET request_count = request_count + 1
            RETURNING request_count
            ",
        )
        .bind(user_id.to_string())
        .bind(day.to_string())
        .fetch_one(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to record AI usage: {e}")))?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Requests made by the user on `day`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_ai_usage(&self, user_id: Uuid, day: NaiveDate) -> AppResult<u32> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT request_count FROM ai_usage WHERE user_id = ?1 AND usage_date = ?2",
        )
        .bind(user_id.to_string())
        .bind(day.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to read AI usage: {e}")))?;
        Ok(count.map_or(0, |c| u32::try_from(c).unwrap_or(u32::MAX)))
    }
}
