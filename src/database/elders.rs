// ABOUTME: Database operations for elders and their allergies and health conditions
// ABOUTME: Elder deletion cascades to regimen, logs, diet entries and shifts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{parse_date, parse_id, parse_opt_date, parse_stored, parse_ts, ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{Allergy, Elder, HealthCondition};

const ELDER_COLUMNS: &str =
    "id, group_id, name, date_of_birth, utc_offset_minutes, notes, created_at";

fn row_to_elder(row: &SqliteRow) -> AppResult<Elder> {
    Ok(Elder {
        id: parse_id(&row.get::<String, _>("id"))?,
        group_id: parse_id(&row.get::<String, _>("group_id"))?,
        name: row.get("name"),
        date_of_birth: parse_opt_date(row.get("date_of_birth"))?,
        utc_offset_minutes: row.get::<i64, _>("utc_offset_minutes") as i32,
        notes: row.get("notes"),
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
    })
}

fn row_to_allergy(row: &SqliteRow) -> AppResult<Allergy> {
    Ok(Allergy {
        id: parse_id(&row.get::<String, _>("id"))?,
        elder_id: parse_id(&row.get::<String, _>("elder_id"))?,
        allergen: row.get("allergen"),
        reaction: row.get("reaction"),
        severity: parse_stored(&row.get::<String, _>("severity"))?,
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
    })
}

fn row_to_condition(row: &SqliteRow) -> AppResult<HealthCondition> {
    let diagnosed_on: Option<String> = row.get("diagnosed_on");
    Ok(HealthCondition {
        id: parse_id(&row.get::<String, _>("id"))?,
        elder_id: parse_id(&row.get::<String, _>("elder_id"))?,
        name: row.get("name"),
        diagnosed_on: diagnosed_on.as_deref().map(parse_date).transpose()?,
        notes: row.get("notes"),
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
    })
}

impl Database {
    /// Insert an elder
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_elder(&self, elder: &Elder) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO elders (id, group_id, name, date_of_birth, utc_offset_minutes, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(elder.id.to_string())
        .bind(elder.group_id.to_string())
        .bind(&elder.name)
        .bind(elder.date_of_birth.map(|d| d.to_string()))
        .bind(i64::from(elder.utc_offset_minutes))
        .bind(&elder.notes)
        .bind(ts(elder.created_at))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to create elder: {e}")))?;
        Ok(())
    }

    /// Fetch an elder
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_elder(&self, elder_id: Uuid) -> AppResult<Option<Elder>> {
        let row = sqlx::query(&format!("SELECT {ELDER_COLUMNS} FROM elders WHERE id = ?1"))
            .bind(elder_id.to_string())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to get elder: {e}")))?;
        row.as_ref().map(row_to_elder).transpose()
    }

    /// Elders of a group
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_elders(&self, group_id: Uuid) -> AppResult<Vec<Elder>> {
        let rows = sqlx::query(&format!(
            "SELECT {ELDER_COLUMNS} FROM elders WHERE group_id = ?1 ORDER BY created_at"
        ))
        .bind(group_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list elders: {e}")))?;
        rows.iter().map(row_to_elder).collect()
    }

    /// Number of elders in a group
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_elders(&self, group_id: Uuid) -> AppResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM elders WHERE group_id = ?1")
            .bind(group_id.to_string())
            .fetch_one(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to count elders: {e}")))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Overwrite an elder's mutable fields
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the elder does not exist.
    pub async fn update_elder(&self, elder: &Elder) -> AppResult<()> {
        let result = sqlx::query(
            r"
            UPDATE elders SET name = ?1, date_of_birth = ?2, utc_offset_minutes = ?3, notes = ?4
            WHERE id = ?5
            ",
        )
        .bind(&elder.name)
        .bind(elder.date_of_birth.map(|d| d.to_string()))
        .bind(i64::from(elder.utc_offset_minutes))
        .bind(&elder.notes)
        .bind(elder.id.to_string())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update elder: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Elder"));
        }
        Ok(())
    }

    /// Delete an elder and everything recorded about them
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the elder does not exist.
    pub async fn delete_elder(&self, elder_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM elders WHERE id = ?1")
            .bind(elder_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to delete elder: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Elder"));
        }
        Ok(())
    }

    /// Record an allergy
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn add_allergy(&self, allergy: &Allergy) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO elder_allergies (id, elder_id, allergen, reaction, severity, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(allergy.id.to_string())
        .bind(allergy.elder_id.to_string())
        .bind(&allergy.allergen)
        .bind(&allergy.reaction)
        .bind(allergy.severity.as_str())
        .bind(ts(allergy.created_at))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to add allergy: {e}")))?;
        Ok(())
    }

    /// Allergies of an elder
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_allergies(&self, elder_id: Uuid) -> AppResult<Vec<Allergy>> {
        let rows = sqlx::query(
            "SELECT id, elder_id, allergen, reaction, severity, created_at FROM elder_allergies WHERE elder_id = ?1 ORDER BY created_at",
        )
        .bind(elder_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list allergies: {e}")))?;
        rows.iter().map(row_to_allergy).collect()
    }

    /// Record a health condition
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn add_health_condition(&self, condition: &HealthCondition) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO elder_conditions (id, elder_id, name, diagnosed_on, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(condition.id.to_string())
        .bind(condition.elder_id.to_string())
        .bind(&condition.name)
        .bind(condition.diagnosed_on.map(|d| d.to_string()))
        .bind(&condition.notes)
        .bind(ts(condition.created_at))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to add condition: {e}")))?;
        Ok(())
    }

    /// Health conditions of an elder
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_health_conditions(&self, elder_id: Uuid) -> AppResult<Vec<HealthCondition>> {
        let rows = sqlx::query(
            "SELECT id, elder_id, name, diagnosed_on, notes, created_at FROM elder_conditions WHERE elder_id = ?1 ORDER BY created_at",
        )
        .bind(elder_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list conditions: {e}")))?;
        rows.iter().map(row_to_condition).collect()
    }
}
