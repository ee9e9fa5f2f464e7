// ABOUTME: Per-user data export assembled from every table that holds the user's data
// ABOUTME: Elder care records are included for groups the user administers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    AccountDeletion, Agency, AgencyMember, Allergy, AuditEvent, Elder, Group, GroupMember,
    GroupRole, HealthCondition, RegimenItem, UnifiedAiConsent, User, UserNotification,
};

const EXPORT_FORMAT_VERSION: u32 = 1;
const MAX_EXPORTED_NOTIFICATIONS: u32 = 1000;
const MAX_EXPORTED_AUDIT_EVENTS: u32 = 1000;

/// A group and the user's place in it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedGroup {
    /// Group
    pub group: Group,
    /// The user's membership
    pub membership: GroupMember,
    /// Elders with their records, present for groups the user administers
    pub elders: Vec<ExportedElder>,
}

/// An elder with child records
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedElder {
    /// Profile
    pub elder: Elder,
    /// Allergies
    pub allergies: Vec<Allergy>,
    /// Conditions
    pub conditions: Vec<HealthCondition>,
    /// Medications and supplements
    pub regimen: Vec<RegimenItem>,
}

/// An agency and the user's staff record
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedAgency {
    /// Agency
    pub agency: Agency,
    /// The user's staff record
    pub membership: AgencyMember,
}

/// Everything stored about one user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataExport {
    /// Export layout version
    pub format_version: u32,
    /// When the export was generated
    pub exported_at: DateTime<Utc>,
    /// Account profile
    pub profile: User,
    /// Group memberships
    pub groups: Vec<ExportedGroup>,
    /// Agency memberships
    pub agencies: Vec<ExportedAgency>,
    /// Latest AI consent
    pub consent: Option<UnifiedAiConsent>,
    /// Pending or past deletion request
    pub deletion: Option<AccountDeletion>,
    /// Notifications, newest first
    pub notifications: Vec<UserNotification>,
    /// Security events about the account
    pub audit_events: Vec<AuditEvent>,
}

async fn export_elder(database: &Database, elder: Elder) -> AppResult<ExportedElder> {
    Ok(ExportedElder {
        allergies: database.list_allergies(elder.id).await?,
        conditions: database.list_health_conditions(elder.id).await?,
        regimen: database.list_regimen_items(elder.id, None).await?,
        elder,
    })
}

/// Build the export document for `user_id`
///
/// # Errors
///
/// Returns `ResourceNotFound` for an unknown user, or a database error.
pub async fn build(
    database: &Database,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<UserDataExport> {
    let profile = database
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let mut groups = Vec::new();
    for (group, membership) in database.list_groups_for_user(user_id).await? {
        let mut elders = Vec::new();
        if membership.role == GroupRole::Admin {
            for elder in database.list_elders(group.id).await? {
                elders.push(export_elder(database, elder).await?);
            }
        }
        groups.push(ExportedGroup {
            group,
            membership,
            elders,
        });
    }

    let agencies = database
        .list_agencies_for_user(user_id)
        .await?
        .into_iter()
        .map(|(agency, membership)| ExportedAgency { agency, membership })
        .collect();

    Ok(UserDataExport {
        format_version: EXPORT_FORMAT_VERSION,
        exported_at: now,
        groups,
        agencies,
        consent: database.get_latest_consent(user_id).await?,
        deletion: database.get_account_deletion(user_id).await?,
        notifications: database
            .list_notifications(
                user_id,
                false,
                DateTime::<Utc>::MIN_UTC,
                MAX_EXPORTED_NOTIFICATIONS,
            )
            .await?,
        audit_events: database
            .list_audit_events_for_user(user_id, MAX_EXPORTED_AUDIT_EVENTS)
            .await?,
        profile,
    })
}
