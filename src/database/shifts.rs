// ABOUTME: Database operations for scheduled shifts and shift-offer cascades
// ABOUTME: Status writes are compare-and-set on the previous status so concurrent transitions lose cleanly
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{
    format_time, parse_date, parse_id, parse_opt_id, parse_opt_ts, parse_stored, parse_time,
    parse_ts, ts, Database,
};
use crate::errors::{AppError, AppResult};
use crate::models::{OfferStatus, ScheduledShift, ShiftOffer, ShiftStatus};

const SHIFT_COLUMNS: &str = "id, agency_id, elder_id, caregiver_id, shift_date, start_time, end_time, status, notification_id, notes, created_by, created_at, updated_at";
const OFFER_COLUMNS: &str =
    "id, shift_id, caregiver_id, position, status, offered_at, expires_at, responded_at";

fn row_to_shift(row: &SqliteRow) -> AppResult<ScheduledShift> {
    Ok(ScheduledShift {
        id: parse_id(&row.get::<String, _>("id"))?,
        agency_id: parse_id(&row.get::<String, _>("agency_id"))?,
        elder_id: parse_id(&row.get::<String, _>("elder_id"))?,
        caregiver_id: parse_opt_id(row.get("caregiver_id"))?,
        date: parse_date(&row.get::<String, _>("shift_date"))?,
        start_time: parse_time(&row.get::<String, _>("start_time"))?,
        end_time: parse_time(&row.get::<String, _>("end_time"))?,
        status: parse_stored(&row.get::<String, _>("status"))?,
        notification_id: parse_opt_id(row.get("notification_id"))?,
        notes: row.get("notes"),
        created_by: parse_id(&row.get::<String, _>("created_by"))?,
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
        updated_at: parse_ts(&row.get::<String, _>("updated_at"))?,
    })
}

fn row_to_offer(row: &SqliteRow) -> AppResult<ShiftOffer> {
    Ok(ShiftOffer {
        id: parse_id(&row.get::<String, _>("id"))?,
        shift_id: parse_id(&row.get::<String, _>("shift_id"))?,
        caregiver_id: parse_id(&row.get::<String, _>("caregiver_id"))?,
        position: row.get::<i64, _>("position") as u32,
        status: parse_stored(&row.get::<String, _>("status"))?,
        offered_at: parse_opt_ts(row.get("offered_at"))?,
        expires_at: parse_opt_ts(row.get("expires_at"))?,
        responded_at: parse_opt_ts(row.get("responded_at"))?,
    })
}

impl Database {
    /// Insert a shift
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_shift(&self, shift: &ScheduledShift) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO scheduled_shifts (id, agency_id, elder_id, caregiver_id, shift_date, start_time, end_time, status, notification_id, notes, created_by, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ",
        )
        .bind(shift.id.to_string())
        .bind(shift.agency_id.to_string())
        .bind(shift.elder_id.to_string())
        .bind(shift.caregiver_id.map(|id| id.to_string()))
        .bind(shift.date.to_string())
        .bind(format_time(shift.start_time))
        .bind(format_time(shift.end_time))
        .bind(shift.status.as_str())
        .bind(shift.notification_id.map(|id| id.to_string()))
        .bind(&shift.notes)
        .bind(shift.created_by.to_string())
        .bind(ts(shift.created_at))
        .bind(ts(shift.updated_at))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to create shift: {e}")))?;
        Ok(())
    }

    /// Fetch a shift
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_shift(&self, shift_id: Uuid) -> AppResult<Option<ScheduledShift>> {
        let row = sqlx::query(&format!(
            "SELECT {SHIFT_COLUMNS} FROM scheduled_shifts WHERE id = ?1"
        ))
        .bind(shift_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get shift: {e}")))?;
        row.as_ref().map(row_to_shift).transpose()
    }

    /// Agency shifts dated within `[from, to]`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_agency_shifts(
        &self,
        agency_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<ScheduledShift>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {SHIFT_COLUMNS} FROM scheduled_shifts
            WHERE agency_id = ?1 AND shift_date >= ?2 AND shift_date <= ?3
            ORDER BY shift_date, start_time
            "
        ))
        .bind(agency_id.to_string())
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list shifts: {e}")))?;
        rows.iter().map(row_to_shift).collect()
    }

    /// Shifts assigned to a caregiver from `from` onwards
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_caregiver_shifts(
        &self,
        caregiver_id: Uuid,
        from: NaiveDate,
    ) -> AppResult<Vec<ScheduledShift>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {SHIFT_COLUMNS} FROM scheduled_shifts
            WHERE caregiver_id = ?1 AND shift_date >= ?2
            ORDER BY shift_date, start_time
            "
        ))
        .bind(caregiver_id.to_string())
        .bind(from.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list caregiver shifts: {e}")))?;
        rows.iter().map(row_to_shift).collect()
    }

    /// Persist a transitioned shift if it is still in `expected` status
    ///
    /// Returns `false` when another writer changed the status first.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_shift_if_status(
        &self,
        shift: &ScheduledShift,
        expected: ShiftStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE scheduled_shifts
            SET caregiver_id = ?1, status = ?2, notification_id = ?3, notes = ?4, updated_at = ?5
            WHERE id = ?6 AND status = ?7
            ",
        )
        .bind(shift.caregiver_id.map(|id| id.to_string()))
        .bind(shift.status.as_str())
        .bind(shift.notification_id.map(|id| id.to_string()))
        .bind(&shift.notes)
        .bind(ts(shift.updated_at))
        .bind(shift.id.to_string())
        .bind(expected.as_str())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update shift: {e}")))?;
        Ok(result.rows_affected() == 1)
    }

    /// Record the last notification sent about a shift
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn set_shift_notification(&self, shift_id: Uuid, notification_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE scheduled_shifts SET notification_id = ?1 WHERE id = ?2")
            .bind(notification_id.to_string())
            .bind(shift_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to update shift notification: {e}")))?;
        Ok(())
    }

    /// Replace any previous cascade of the shift with `offers`
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn replace_shift_offers(&self, shift_id: Uuid, offers: &[ShiftOffer]) -> AppResult<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        sqlx::query("DELETE FROM shift_offers WHERE shift_id = ?1")
            .bind(shift_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to clear offers: {e}")))?;

        for offer in offers {
            sqlx::query(
                r"
                INSERT INTO shift_offers (id, shift_id, caregiver_id, position, status, offered_at, expires_at, responded_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
            )
            .bind(offer.id.to_string())
            .bind(offer.shift_id.to_string())
            .bind(offer.caregiver_id.to_string())
            .bind(i64::from(offer.position))
            .bind(offer.status.as_str())
            .bind(offer.offered_at.map(ts))
            .bind(offer.expires_at.map(ts))
            .bind(offer.responded_at.map(ts))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to create offer: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit offers: {e}")))
    }

    /// Fetch an offer
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_shift_offer(&self, offer_id: Uuid) -> AppResult<Option<ShiftOffer>> {
        let row = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM shift_offers WHERE id = ?1"
        ))
        .bind(offer_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get offer: {e}")))?;
        row.as_ref().map(row_to_offer).transpose()
    }

    /// Offers of a shift in cascade order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_shift_offers(&self, shift_id: Uuid) -> AppResult<Vec<ShiftOffer>> {
        let rows = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM shift_offers WHERE shift_id = ?1 ORDER BY position"
        ))
        .bind(shift_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list offers: {e}")))?;
        rows.iter().map(row_to_offer).collect()
    }

    /// Persist an offer if it is still in `expected` status
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_offer_if_status(
        &self,
        offer: &ShiftOffer,
        expected: OfferStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE shift_offers
            SET status = ?1, offered_at = ?2, expires_at = ?3, responded_at = ?4
            WHERE id = ?5 AND status = ?6
            ",
        )
        .bind(offer.status.as_str())
        .bind(offer.offered_at.map(ts))
        .bind(offer.expires_at.map(ts))
        .bind(offer.responded_at.map(ts))
        .bind(offer.id.to_string())
        .bind(expected.as_str())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update offer: {e}")))?;
        Ok(result.rows_affected() == 1)
    }

    /// Pending offers whose window closed at or before `now`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_lapsed_offers(&self, now: DateTime<Utc>) -> AppResult<Vec<ShiftOffer>> {
        let rows = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM shift_offers WHERE status = ?1 AND expires_at <= ?2 ORDER BY expires_at"
        ))
        .bind(OfferStatus::Pending.as_str())
        .bind(ts(now))
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list lapsed offers: {e}")))?;
        rows.iter().map(row_to_offer).collect()
    }
}
