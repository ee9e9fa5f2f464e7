// ABOUTME: Database operations for unified AI consent records
// ABOUTME: The newest record per user is authoritative; reminders are tracked per record
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{parse_id, parse_opt_ts, parse_ts, ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{ConsentAcceptance, UnifiedAiConsent};

const COLUMNS: &str = "id, user_id, terms_accepted, medical_disclaimer_accepted, data_usage_accepted, limitations_acknowledged, read_time_seconds, accepted_at, expires_at, revoked_at";

fn row_to_consent(row: &SqliteRow) -> AppResult<UnifiedAiConsent> {
    Ok(UnifiedAiConsent {
        id: parse_id(&row.get::<String, _>("id"))?,
        user_id: parse_id(&row.get::<String, _>("user_id"))?,
        acceptance: ConsentAcceptance {
            terms_accepted: row.get::<i64, _>("terms_accepted") != 0,
            medical_disclaimer_accepted: row.get::<i64, _>("medical_disclaimer_accepted") != 0,
            data_usage_accepted: row.get::<i64, _>("data_usage_accepted") != 0,
            limitations_acknowledged: row.get::<i64, _>("limitations_acknowledged") != 0,
        },
        read_time_seconds: row.get::<i64, _>("read_time_seconds") as u32,
        accepted_at: parse_ts(&row.get::<String, _>("accepted_at"))?,
        expires_at: parse_ts(&row.get::<String, _>("expires_at"))?,
        revoked_at: parse_opt_ts(row.get("revoked_at"))?,
    })
}

impl Database {
    /// Store a consent record
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_consent(&self, consent: &UnifiedAiConsent) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO ai_consents (id, user_id, terms_accepted, medical_disclaimer_accepted, data_usage_accepted, limitations_acknowledged, read_time_seconds, accepted_at, expires_at, revoked_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(consent.id.to_string())
        .bind(consent.user_id.to_string())
        .bind(i64::from(consent.acceptance.terms_accepted))
        .bind(i64::from(consent.acceptance.medical_disclaimer_accepted))
        .bind(i64::from(consent.acceptance.data_usage_accepted))
        .bind(i64::from(consent.acceptance.limitations_acknowledged))
        .bind(i64::from(consent.read_time_seconds))
        .bind(ts(consent.accepted_at))
        .bind(ts(consent.expires_at))
        .bind(consent.revoked_at.map(ts))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to store consent: {e}")))?;
        Ok(())
    }

    /// The user's most recent consent record
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_latest_consent(&self, user_id: Uuid) -> AppResult<Option<UnifiedAiConsent>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM ai_consents WHERE user_id = ?1 ORDER BY accepted_at DESC LIMIT 1"
        ))
        .bind(user_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get consent: {e}")))?;
        row.as_ref().map(row_to_consent).transpose()
    }

    /// Revoke every unrevoked consent of the user
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn revoke_consents(&self, user_id: Uuid, revoked_at: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE ai_consents SET revoked_at = ?1 WHERE user_id = ?2 AND revoked_at IS NULL",
        )
        .bind(ts(revoked_at))
        .bind(user_id.to_string())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to revoke consent: {e}")))?;
        Ok(result.rows_affected())
    }

    /// Unrevoked, unreminded consents expiring in `(now, until]`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_consents_expiring(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<UnifiedAiConsent>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {COLUMNS} FROM ai_consents
            WHERE revoked_at IS NULL AND reminder_sent_at IS NULL
              AND expires_at > ?1 AND expires_at <= ?2
            "
        ))
        .bind(ts(now))
        .bind(ts(until))
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list expiring consents: {e}")))?;
        rows.iter().map(row_to_consent).collect()
    }

    /// Remember that the expiry reminder for a consent went out
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn mark_consent_reminded(&self, consent_id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE ai_consents SET reminder_sent_at = ?1 WHERE id = ?2")
            .bind(ts(at))
            .bind(consent_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to mark consent reminded: {e}")))?;
        Ok(())
    }
}
