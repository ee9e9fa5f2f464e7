// ABOUTME: Typed, priority-ranked in-app notifications
// ABOUTME: Notifications carry read/dismissed flags and an optional expiry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    /// What the notification is about
    pub enum NotificationType {
        /// A shift was offered to the caregiver
        ShiftOffer => "shift_offer",
        /// A shift was assigned to the caregiver
        ShiftAssigned => "shift_assigned",
        /// A shift was confirmed
        ShiftConfirmed => "shift_confirmed",
        /// A caregiver declined a shift
        ShiftDeclined => "shift_declined",
        /// A shift was cancelled
        ShiftCancelled => "shift_cancelled",
        /// An offer cascade ended with nobody accepting
        ShiftUnfilled => "shift_unfilled",
        /// A scheduled dose was missed
        MissedDose => "missed_dose",
        /// Interaction flags were found for an elder's regimen
        DrugInteraction => "drug_interaction",
        /// AI consent is about to expire
        ConsentExpiring => "consent_expiring",
        /// Account deletion scheduled or cancelled
        AccountDeletion => "account_deletion",
        /// Someone joined a group
        GroupMemberJoined => "group_member_joined",
        /// Anything else
        System => "system",
    }
}

string_enum! {
    /// Priority, lowest first
    pub enum NotificationPriority {
        /// Informational
        Low => "low",
        /// Worth reading today
        Medium => "medium",
        /// Needs attention soon
        High => "high",
        /// Needs attention now
        Urgent => "urgent",
    }
}

impl NotificationPriority {
    /// Numeric rank; higher is more urgent
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Urgent => 3,
        }
    }
}

/// A message shown to one user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNotification {
    /// Unique identifier
    pub id: Uuid,
    /// Recipient
    pub user_id: Uuid,
    /// Type
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Priority
    pub priority: NotificationPriority,
    /// Short title
    pub title: String,
    /// Body text
    pub message: String,
    /// Deep link into the app
    pub action_url: Option<String>,
    /// Whether the user opened it
    pub read: bool,
    /// Whether the user dismissed it
    pub dismissed: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// After this instant the notification is no longer shown
    pub expires_at: Option<DateTime<Utc>>,
}

impl UserNotification {
    /// Create an unread notification
    #[must_use]
    pub fn new(
        user_id: Uuid,
        notification_type: NotificationType,
        priority: NotificationPriority,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            notification_type,
            priority,
            title: title.into(),
            message: message.into(),
            action_url: None,
            read: false,
            dismissed: false,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Attach a deep link
    #[must_use]
    pub fn with_action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }

    /// Attach an expiry
    #[must_use]
    pub const fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the notification should still be shown
    #[must_use]
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        !self.dismissed && self.expires_at.map_or(true, |expiry| now < expiry)
    }
}
