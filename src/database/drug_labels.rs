// ABOUTME: Database cache of openFDA drug label sections
// ABOUTME: Keyed by lowercased medication name; refreshed when stale
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{parse_ts, ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::FdaDrugLabel;

const COLUMNS: &str = "medication_key, brand_name, generic_name, boxed_warning, warnings, contraindications, drug_interactions, source_id, fetched_at";

fn row_to_label(row: &SqliteRow) -> AppResult<FdaDrugLabel> {
    Ok(FdaDrugLabel {
        medication_key: row.get("medication_key"),
        brand_name: row.get("brand_name"),
        generic_name: row.get("generic_name"),
        boxed_warning: row.get("boxed_warning"),
        warnings: row.get("warnings"),
        contraindications: row.get("contraindications"),
        drug_interactions: row.get("drug_interactions"),
        source_id: row.get("source_id"),
        fetched_at: parse_ts(&row.get::<String, _>("fetched_at"))?,
    })
}

impl Database {
    /// Insert or refresh a cached label
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn upsert_drug_label(&self, label: &FdaDrugLabel) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO fda_drug_labels (medication_key, brand_name, generic_name, boxed_warning, warnings, contraindications, drug_interactions, source_id, fetched_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(medication_key) DO UPDATE SET
                brand_name = excluded.brand_name,
                generic_name = excluded.generic_name,
                boxed_warning = excluded.boxed_warning,
                warnings = excluded.warnings,
                contraindications = excluded.contraindications,
                drug_interactions = excluded.drug_interactions,
                source_id = excluded.source_id,
                fetched_at = excluded.fetched_at
            ",
        )
        .bind(&label.medication_key)
        .bind(&label.brand_name)
        .bind(&label.generic_name)
        .bind(&label.boxed_warning)
        .bind(&label.warnings)
        .bind(&label.contraindications)
        .bind(&label.drug_interactions)
        .bind(&label.source_id)
        .bind(ts(label.fetched_at))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to store drug label: {e}")))?;
        Ok(())
    }

    /// Cached label for a medication name
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_drug_label(&self, name: &str) -> AppResult<Option<FdaDrugLabel>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM fda_drug_labels WHERE medication_key = ?1"
        ))
        .bind(FdaDrugLabel::key_for(name))
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get drug label: {e}")))?;
        row.as_ref().map(row_to_label).transpose()
    }

    /// Keys of labels fetched before `cutoff`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_stale_label_keys(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<String>> {
        sqlx::query_scalar("SELECT medication_key FROM fda_drug_labels WHERE fetched_at < ?1")
            .bind(ts(cutoff))
            .fetch_all(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to list stale labels: {e}")))
    }
}
