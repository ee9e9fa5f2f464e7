// ABOUTME: Database operations for care agencies and their staff
// ABOUTME: Agency creation inserts the owner membership in the same transaction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{is_unique_violation, parse_id, parse_stored, parse_ts, ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{Agency, AgencyMember, AgencyRole};

const MEMBER_SELECT: &str = r"
    SELECT am.agency_id, am.user_id, u.display_name, u.email, am.role, am.joined_at
    FROM agency_members am
    JOIN users u ON u.id = am.user_id
";

fn row_to_agency(row: &SqliteRow) -> AppResult<Agency> {
    Ok(Agency {
        id: parse_id(&row.get::<String, _>("id"))?,
        name: row.get("name"),
        owner_id: parse_id(&row.get::<String, _>("owner_id"))?,
        subscription_tier: parse_stored(&row.get::<String, _>("subscription_tier"))?,
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
    })
}

fn row_to_member(row: &SqliteRow) -> AppResult<AgencyMember> {
    Ok(AgencyMember {
        agency_id: parse_id(&row.get::<String, _>("agency_id"))?,
        user_id: parse_id(&row.get::<String, _>("user_id"))?,
        display_name: row.get("display_name"),
        email: row.get("email"),
        role: parse_stored(&row.get::<String, _>("role"))?,
        joined_at: parse_ts(&row.get::<String, _>("joined_at"))?,
    })
}

impl Database {
    /// Insert an agency and its owner membership
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn create_agency(&self, agency: &Agency) -> AppResult<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO agencies (id, name, owner_id, subscription_tier, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(agency.id.to_string())
        .bind(&agency.name)
        .bind(agency.owner_id.to_string())
        .bind(agency.subscription_tier.as_str())
        .bind(ts(agency.created_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to create agency: {e}")))?;

        sqlx::query(
            "INSERT INTO agency_members (agency_id, user_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(agency.id.to_string())
        .bind(agency.owner_id.to_string())
        .bind(AgencyRole::Owner.as_str())
        .bind(ts(agency.created_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to add agency owner: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit agency: {e}")))
    }

    /// Fetch an agency
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_agency(&self, agency_id: Uuid) -> AppResult<Option<Agency>> {
        let row = sqlx::query(
            "SELECT id, name, owner_id, subscription_tier, created_at FROM agencies WHERE id = ?1",
        )
        .bind(agency_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get agency: {e}")))?;
        row.as_ref().map(row_to_agency).transpose()
    }

    /// Agencies the user belongs to, with the user's membership
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_agencies_for_user(
        &self,
        user_id: Uuid,
    ) -> AppResult<Vec<(Agency, AgencyMember)>> {
        let rows = sqlx::query(
            r"
            SELECT a.id, a.name, a.owner_id, a.subscription_tier, a.created_at,
                   am.agency_id, am.user_id, u.display_name, u.email, am.role, am.joined_at
            FROM agencies a
            JOIN agency_members am ON am.agency_id = a.id
            JOIN users u ON u.id = am.user_id
            WHERE am.user_id = ?1
            ORDER BY a.created_at
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list agencies: {e}")))?;

        rows.iter()
            .map(|row| Ok((row_to_agency(row)?, row_to_member(row)?)))
            .collect()
    }

    /// One agency membership
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_agency_member(
        &self,
        agency_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<AgencyMember>> {
        let row = sqlx::query(&format!(
            "{MEMBER_SELECT} WHERE am.agency_id = ?1 AND am.user_id = ?2"
        ))
        .bind(agency_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get agency member: {e}")))?;
        row.as_ref().map(row_to_member).transpose()
    }

    /// Staff of an agency
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_agency_members(&self, agency_id: Uuid) -> AppResult<Vec<AgencyMember>> {
        let rows = sqlx::query(&format!(
            "{MEMBER_SELECT} WHERE am.agency_id = ?1 ORDER BY am.joined_at"
        ))
        .bind(agency_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list agency members: {e}")))?;
        rows.iter().map(row_to_member).collect()
    }

    /// Add a staff member
    ///
    /// # Errors
    ///
    /// Returns `ResourceAlreadyExists` if the user is already on staff.
    pub async fn add_agency_member(
        &self,
        agency_id: Uuid,
        user_id: Uuid,
        role: AgencyRole,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO agency_members (agency_id, user_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(agency_id.to_string())
        .bind(user_id.to_string())
        .bind(role.as_str())
        .bind(ts(Utc::now()))
        .execute(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::already_exists("User is already a member of this agency")
            } else {
                AppError::database(format!("Failed to add agency member: {e}"))
            }
        })?;
        Ok(())
    }
}
