// ABOUTME: Database operations for medications, supplements and dose logs
// ABOUTME: Frequencies persist as a JSON array of HH:MM strings; one log per scheduled dose
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{
    format_time, parse_date, parse_id, parse_opt_date, parse_stored, parse_time, parse_ts, ts,
    Database,
};
use crate::errors::{AppError, AppResult};
use crate::models::{DoseLog, RegimenItem, RegimenKind};

const ITEM_COLUMNS: &str = "id, elder_id, kind, name, dosage, frequency, start_date, end_date, instructions, created_by, created_at";
const LOG_COLUMNS: &str =
    "id, item_id, elder_id, scheduled_for, status, logged_at, logged_by, notes";

fn row_to_item(row: &SqliteRow) -> AppResult<RegimenItem> {
    let frequency_json: String = row.get("frequency");
    let raw_times: Vec<String> = serde_json::from_str(&frequency_json)
        .map_err(|e| AppError::database(format!("Invalid stored frequency: {e}")))?;
    let frequency = raw_times
        .iter()
        .map(|raw| parse_time(raw))
        .collect::<AppResult<Vec<_>>>()?;

    Ok(RegimenItem {
        id: parse_id(&row.get::<String, _>("id"))?,
        elder_id: parse_id(&row.get::<String, _>("elder_id"))?,
        kind: parse_stored(&row.get::<String, _>("kind"))?,
        name: row.get("name"),
        dosage: row.get("dosage"),
        frequency,
        start_date: parse_date(&row.get::<String, _>("start_date"))?,
        end_date: parse_opt_date(row.get("end_date"))?,
        instructions: row.get("instructions"),
        created_by: parse_id(&row.get::<String, _>("created_by"))?,
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
    })
}

fn row_to_log(row: &SqliteRow) -> AppResult<DoseLog> {
    Ok(DoseLog {
        id: parse_id(&row.get::<String, _>("id"))?,
        item_id: parse_id(&row.get::<String, _>("item_id"))?,
        elder_id: parse_id(&row.get::<String, _>("elder_id"))?,
        scheduled_for: parse_ts(&row.get::<String, _>("scheduled_for"))?,
        status: parse_stored(&row.get::<String, _>("status"))?,
        logged_at: parse_ts(&row.get::<String, _>("logged_at"))?,
        logged_by: parse_id(&row.get::<String, _>("logged_by"))?,
        notes: row.get("notes"),
    })
}

fn frequency_json(item: &RegimenItem) -> AppResult<String> {
    let times: Vec<String> = item.frequency.iter().copied().map(format_time).collect();
    Ok(serde_json::to_string(&times)?)
}

impl Database {
    /// Insert a medication or supplement
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_regimen_item(&self, item: &RegimenItem) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO regimen_items (id, elder_id, kind, name, dosage, frequency, start_date, end_date, instructions, created_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(item.id.to_string())
        .bind(item.elder_id.to_string())
        .bind(item.kind.as_str())
        .bind(&item.name)
        .bind(&item.dosage)
        .bind(frequency_json(item)?)
        .bind(item.start_date.to_string())
        .bind(item.end_date.map(|d| d.to_string()))
        .bind(&item.instructions)
        .bind(item.created_by.to_string())
        .bind(ts(item.created_at))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to create regimen item: {e}")))?;
        Ok(())
    }

    /// Fetch a regimen item
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_regimen_item(&self, item_id: Uuid) -> AppResult<Option<RegimenItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM regimen_items WHERE id = ?1"
        ))
        .bind(item_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get regimen item: {e}")))?;
        row.as_ref().map(row_to_item).transpose()
    }

    /// Regimen of an elder, optionally limited to one kind
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_regimen_items(
        &self,
        elder_id: Uuid,
        kind: Option<RegimenKind>,
    ) -> AppResult<Vec<RegimenItem>> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query(&format!(
                    "SELECT {ITEM_COLUMNS} FROM regimen_items WHERE elder_id = ?1 AND kind = ?2 ORDER BY name"
                ))
                .bind(elder_id.to_string())
                .bind(kind.as_str())
                .fetch_all(self.pool())
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {ITEM_COLUMNS} FROM regimen_items WHERE elder_id = ?1 ORDER BY kind, name"
                ))
                .bind(elder_id.to_string())
                .fetch_all(self.pool())
                .await
            }
        }
        .map_err(|e| AppError::database(format!("Failed to list regimen items: {e}")))?;

        rows.iter().map(row_to_item).collect()
    }

    /// Overwrite a regimen item's mutable fields
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the item does not exist.
    pub async fn update_regimen_item(&self, item: &RegimenItem) -> AppResult<()> {
        let result = sqlx::query(
            r"
            UPDATE regimen_items
            SET name = ?1, dosage = ?2, frequency = ?3, start_date = ?4, end_date = ?5, instructions = ?6
            WHERE id = ?7
            ",
        )
        .bind(&item.name)
        .bind(&item.dosage)
        .bind(frequency_json(item)?)
        .bind(item.start_date.to_string())
        .bind(item.end_date.map(|d| d.to_string()))
        .bind(&item.instructions)
        .bind(item.id.to_string())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update regimen item: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Regimen item"));
        }
        Ok(())
    }

    /// Delete a regimen item and its logs
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the item does not exist.
    pub async fn delete_regimen_item(&self, item_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM regimen_items WHERE id = ?1")
            .bind(item_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to delete regimen item: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Regimen item"));
        }
        Ok(())
    }

    /// Insert a dose log, replacing any earlier log of the same scheduled dose
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn upsert_dose_log(&self, log: &DoseLog) -> AppResult<DoseLog> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO dose_logs (id, item_id, elder_id, scheduled_for, status, logged_at, logged_by, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(item_id, scheduled_for) DO UPDATE SET
                status = excluded.status,
                logged_at = excluded.logged_at,
                logged_by = excluded.logged_by,
                notes = excluded.notes
            RETURNING {LOG_COLUMNS}
            "
        ))
        .bind(log.id.to_string())
        .bind(log.item_id.to_string())
        .bind(log.elder_id.to_string())
        .bind(ts(log.scheduled_for))
        .bind(log.status.as_str())
        .bind(ts(log.logged_at))
        .bind(log.logged_by.to_string())
        .bind(&log.notes)
        .fetch_one(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to store dose log: {e}")))?;

        row_to_log(&row)
    }

    /// Logs of an elder's doses scheduled in `[from, to)`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_dose_logs(
        &self,
        elder_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<DoseLog>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {LOG_COLUMNS} FROM dose_logs
            WHERE elder_id = ?1 AND scheduled_for >= ?2 AND scheduled_for < ?3
            ORDER BY scheduled_for
            "
        ))
        .bind(elder_id.to_string())
        .bind(ts(from))
        .bind(ts(to))
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list dose logs: {e}")))?;

        rows.iter().map(row_to_log).collect()
    }
}
