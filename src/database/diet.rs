// ABOUTME: Database operations for diet entries and their nutrition analysis
// ABOUTME: Analysis is stored as a JSON document alongside the entry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{parse_id, parse_stored, parse_ts, ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{DietEntry, NutritionAnalysis};

const ENTRY_COLUMNS: &str =
    "id, elder_id, meal_type, description, eaten_at, logged_by, analysis, created_at";

fn row_to_entry(row: &SqliteRow) -> AppResult<DietEntry> {
    let analysis: Option<String> = row.get("analysis");
    let analysis = analysis
        .as_deref()
        .map(serde_json::from_str::<NutritionAnalysis>)
        .transpose()
        .map_err(|e| AppError::database(format!("Invalid stored analysis: {e}")))?;

    Ok(DietEntry {
        id: parse_id(&row.get::<String, _>("id"))?,
        elder_id: parse_id(&row.get::<String, _>("elder_id"))?,
        meal_type: parse_stored(&row.get::<String, _>("meal_type"))?,
        description: row.get("description"),
        eaten_at: parse_ts(&row.get::<String, _>("eaten_at"))?,
        logged_by: parse_id(&row.get::<String, _>("logged_by"))?,
        analysis,
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
    })
}

impl Database {
    /// Insert a diet entry
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_diet_entry(&self, entry: &DietEntry) -> AppResult<()> {
        let analysis = entry
            .analysis
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r"
            INSERT INTO diet_entries (id, elder_id, meal_type, description, eaten_at, logged_by, analysis, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(entry.id.to_string())
        .bind(entry.elder_id.to_string())
        .bind(entry.meal_type.as_str())
        .bind(&entry.description)
        .bind(ts(entry.eaten_at))
        .bind(entry.logged_by.to_string())
        .bind(analysis)
        .bind(ts(entry.created_at))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to create diet entry: {e}")))?;
        Ok(())
    }

    /// Fetch a diet entry
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_diet_entry(&self, entry_id: Uuid) -> AppResult<Option<DietEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM diet_entries WHERE id = ?1"
        ))
        .bind(entry_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get diet entry: {e}")))?;
        row.as_ref().map(row_to_entry).transpose()
    }

    /// Entries eaten in `[from, to)`, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_diet_entries(
        &self,
        elder_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<DietEntry>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {ENTRY_COLUMNS} FROM diet_entries
            WHERE elder_id = ?1 AND eaten_at >= ?2 AND eaten_at < ?3
            ORDER BY eaten_at
            "
        ))
        .bind(elder_id.to_string())
        .bind(ts(from))
        .bind(ts(to))
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list diet entries: {e}")))?;
        rows.iter().map(row_to_entry).collect()
    }

    /// Attach a nutrition analysis to an entry
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the entry does not exist.
    pub async fn set_diet_analysis(
        &self,
        entry_id: Uuid,
        analysis: &NutritionAnalysis,
    ) -> AppResult<()> {
        let result = sqlx::query("UPDATE diet_entries SET analysis = ?1 WHERE id = ?2")
            .bind(serde_json::to_string(analysis)?)
            .bind(entry_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to store analysis: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Diet entry"));
        }
        Ok(())
    }
}
