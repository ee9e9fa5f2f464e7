// ABOUTME: Database operations for caregiving groups, membership and invite codes
// ABOUTME: Invite codes are stored AES-GCM encrypted with an HMAC lookup hash for joins
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{is_unique_violation, parse_id, parse_opt_id, parse_stored, parse_ts, ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{Group, GroupMember, GroupRole, MemberPermission};

const MEMBER_SELECT: &str = r"
    SELECT gm.group_id, gm.user_id, u.display_name, u.email, gm.role, gm.permission, gm.joined_at
    FROM group_members gm
    JOIN users u ON u.id = gm.user_id
";

fn row_to_group(row: &SqliteRow) -> AppResult<Group> {
    Ok(Group {
        id: parse_id(&row.get::<String, _>("id"))?,
        name: row.get("name"),
        owner_id: parse_id(&row.get::<String, _>("owner_id"))?,
        agency_id: parse_opt_id(row.get("agency_id"))?,
        subscription_tier: parse_stored(&row.get::<String, _>("subscription_tier"))?,
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
    })
}

fn row_to_member(row: &SqliteRow) -> AppResult<GroupMember> {
    Ok(GroupMember {
        group_id: parse_id(&row.get::<String, _>("group_id"))?,
        user_id: parse_id(&row.get::<String, _>("user_id"))?,
        display_name: row.get("display_name"),
        email: row.get("email"),
        role: parse_stored(&row.get::<String, _>("role"))?,
        permission: parse_stored(&row.get::<String, _>("permission"))?,
        joined_at: parse_ts(&row.get::<String, _>("joined_at"))?,
    })
}

fn invite_aad(group_id: Uuid) -> String {
    format!("care_groups|{group_id}|invite_code")
}

impl Database {
    /// Insert a group and its owner as admin member
    ///
    /// `invite_code` must already be normalized to upper case.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the transaction fails.
    pub async fn create_group(&self, group: &Group, invite_code: &str) -> AppResult<()> {
        let encrypted = self.encrypt_data(invite_code, &invite_aad(group.id))?;
        let lookup = self.hash_for_lookup(invite_code);

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO care_groups (id, name, owner_id, agency_id, subscription_tier, invite_code_encrypted, invite_code_hash, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(group.id.to_string())
        .bind(&group.name)
        .bind(group.owner_id.to_string())
        .bind(group.agency_id.map(|id| id.to_string()))
        .bind(group.subscription_tier.as_str())
        .bind(encrypted)
        .bind(lookup)
        .bind(ts(group.created_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::already_exists("Invite code collision")
            } else {
                AppError::database(format!("Failed to create group: {e}"))
            }
        })?;

        sqlx::query(
            r"
            INSERT INTO group_members (group_id, user_id, role, permission, joined_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(group.id.to_string())
        .bind(group.owner_id.to_string())
        .bind(GroupRole::Admin.as_str())
        .bind(MemberPermission::Write.as_str())
        .bind(ts(group.created_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to add group owner: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit group: {e}")))
    }

    /// Fetch a group
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_group(&self, group_id: Uuid) -> AppResult<Option<Group>> {
        let row = sqlx::query(
            "SELECT id, name, owner_id, agency_id, subscription_tier, created_at FROM care_groups WHERE id = ?1",
        )
        .bind(group_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get group: {e}")))?;
        row.as_ref().map(row_to_group).transpose()
    }

    /// Groups the user belongs to, with the user's membership
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_groups_for_user(&self, user_id: Uuid) -> AppResult<Vec<(Group, GroupMember)>> {
        let rows = sqlx::query(
            r"
            SELECT g.id, g.name, g.owner_id, g.agency_id, g.subscription_tier, g.created_at,
                   gm.group_id, gm.user_id, u.display_name, u.email, gm.role, gm.permission, gm.joined_at
            FROM care_groups g
            JOIN group_members gm ON gm.group_id = g.id
            JOIN users u ON u.id = gm.user_id
            WHERE gm.user_id = ?1
            ORDER BY g.created_at
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list groups: {e}")))?;

        rows.iter()
            .map(|row| Ok((row_to_group(row)?, row_to_member(row)?)))
            .collect()
    }

    /// Groups attached to an agency
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_agency_groups(&self, agency_id: Uuid) -> AppResult<Vec<Group>> {
        let rows = sqlx::query(
            "SELECT id, name, owner_id, agency_id, subscription_tier, created_at FROM care_groups WHERE agency_id = ?1 ORDER BY created_at",
        )
        .bind(agency_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list agency groups: {e}")))?;
        rows.iter().map(row_to_group).collect()
    }

    /// Decrypt the current invite code
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown group, or an error if decryption fails.
    pub async fn get_group_invite_code(&self, group_id: Uuid) -> AppResult<String> {
        let row = sqlx::query("SELECT invite_code_encrypted FROM care_groups WHERE id = ?1")
            .bind(group_id.to_string())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to get invite code: {e}")))?
            .ok_or_else(|| AppError::not_found("Group"))?;

        let encrypted: String = row.get("invite_code_encrypted");
        self.decrypt_data(&encrypted, &invite_aad(group_id))
    }

    /// Replace the invite code; the previous code stops working
    ///
    /// # Errors
    ///
    /// Returns `ResourceAlreadyExists` on a lookup-hash collision, so the caller can retry.
    pub async fn set_group_invite_code(&self, group_id: Uuid, invite_code: &str) -> AppResult<()> {
        let encrypted = self.encrypt_data(invite_code, &invite_aad(group_id))?;
        let lookup = self.hash_for_lookup(invite_code);

        let result = sqlx::query(
            "UPDATE care_groups SET invite_code_encrypted = ?1, invite_code_hash = ?2 WHERE id = ?3",
        )
        .bind(encrypted)
        .bind(lookup)
        .bind(group_id.to_string())
        .execute(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::already_exists("Invite code collision")
            } else {
                AppError::database(format!("Failed to update invite code: {e}"))
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Group"));
        }
        Ok(())
    }

    /// Resolve a normalized invite code to its group
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_group_by_invite_code(&self, invite_code: &str) -> AppResult<Option<Group>> {
        let row = sqlx::query(
            "SELECT id, name, owner_id, agency_id, subscription_tier, created_at FROM care_groups WHERE invite_code_hash = ?1",
        )
        .bind(self.hash_for_lookup(invite_code))
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to look up invite code: {e}")))?;
        row.as_ref().map(row_to_group).transpose()
    }

    /// Members of a group, admins first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_group_members(&self, group_id: Uuid) -> AppResult<Vec<GroupMember>> {
        let rows = sqlx::query(&format!(
            "{MEMBER_SELECT} WHERE gm.group_id = ?1 ORDER BY gm.role = 'admin' DESC, gm.joined_at"
        ))
        .bind(group_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list members: {e}")))?;
        rows.iter().map(row_to_member).collect()
    }

    /// One membership
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_group_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<GroupMember>> {
        let row = sqlx::query(&format!(
            "{MEMBER_SELECT} WHERE gm.group_id = ?1 AND gm.user_id = ?2"
        ))
        .bind(group_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get member: {e}")))?;
        row.as_ref().map(row_to_member).transpose()
    }

    /// Add a member
    ///
    /// # Errors
    ///
    /// Returns `ResourceAlreadyExists` if the user is already a member.
    pub async fn add_group_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        role: GroupRole,
        permission: MemberPermission,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO group_members (group_id, user_id, role, permission, joined_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(group_id.to_string())
        .bind(user_id.to_string())
        .bind(role.as_str())
        .bind(permission.as_str())
        .bind(ts(Utc::now()))
        .execute(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::already_exists("Already a member of this group")
            } else {
                AppError::database(format!("Failed to add member: {e}"))
            }
        })?;
        Ok(())
    }

    /// Change a member's permission
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the membership does not exist.
    pub async fn update_group_member_permission(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        permission: MemberPermission,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE group_members SET permission = ?1 WHERE group_id = ?2 AND user_id = ?3",
        )
        .bind(permission.as_str())
        .bind(group_id.to_string())
        .bind(user_id.to_string())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update permission: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Group member"));
        }
        Ok(())
    }

    /// Remove a member
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the membership does not exist.
    pub async fn remove_group_member(&self, group_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2")
            .bind(group_id.to_string())
            .bind(user_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to remove member: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Group member"));
        }
        Ok(())
    }

    /// Number of members in a group
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_group_members(&self, group_id: Uuid) -> AppResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM group_members WHERE group_id = ?1")
            .bind(group_id.to_string())
            .fetch_one(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to count members: {e}")))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
