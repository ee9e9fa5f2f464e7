// ABOUTME: User account model and deferred account-deletion record
// ABOUTME: Users authenticate with email/password; deletion is scheduled 30 days out
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    /// Account lifecycle status
    pub enum UserStatus {
        /// Normal account
        Active => "active",
        /// Deletion requested; account is removed when the grace period ends
        PendingDeletion => "pending_deletion",
    }
}

impl UserStatus {
    /// Whether the user may sign in
    ///
    /// Users with a pending deletion can still sign in so they can cancel it.
    #[must_use]
    pub const fn can_login(self) -> bool {
        matches!(self, Self::Active | Self::PendingDeletion)
    }
}

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier
    pub id: Uuid,
    /// Lowercased email address
    pub email: String,
    /// Display name
    pub display_name: String,
    /// Optional phone number for SMS notifications
    pub phone_number: Option<String>,
    /// bcrypt hash, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Account status
    pub status: UserStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last authenticated activity
    pub last_active: DateTime<Utc>,
}

impl User {
    /// Create a new active user
    #[must_use]
    pub fn new(
        email: &str,
        password_hash: String,
        display_name: String,
        phone_number: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            display_name,
            phone_number,
            password_hash,
            status: UserStatus::Active,
            created_at: now,
            last_active: now,
        }
    }
}

/// A scheduled account deletion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDeletion {
    /// User being deleted
    pub user_id: Uuid,
    /// When the request was made
    pub requested_at: DateTime<Utc>,
    /// When the account will be removed
    pub scheduled_for: DateTime<Utc>,
    /// Set when the user cancels inside the grace period
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl AccountDeletion {
    /// Create a deletion request with the given grace period
    #[must_use]
    pub fn schedule(user_id: Uuid, requested_at: DateTime<Utc>, grace_days: i64) -> Self {
        Self {
            user_id,
            requested_at,
            scheduled_for: requested_at + Duration::days(grace_days),
            cancelled_at: None,
        }
    }

    /// Whether the deletion is still pending
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.cancelled_at.is_none()
    }
}
