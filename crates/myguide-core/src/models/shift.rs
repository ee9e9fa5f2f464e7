// ABOUTME: Caregiver shift assignments and sequential shift offers
// ABOUTME: Status values mirror the confirmation workflow; offers cascade through candidates in order
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    /// Shift lifecycle status
    pub enum ShiftStatus {
        /// No caregiver assigned
        Open => "open",
        /// Caregiver assigned by a recurring schedule, not yet confirmed
        Scheduled => "scheduled",
        /// Caregiver assigned and asked to confirm
        PendingConfirmation => "pending_confirmation",
        /// Caregiver confirmed
        Confirmed => "confirmed",
        /// Agency owner/admin confirmed on the caregiver's behalf
        OwnerConfirmed => "owner_confirmed",
        /// Shift worked
        Completed => "completed",
        /// Shift cancelled
        Cancelled => "cancelled",
    }
}

impl ShiftStatus {
    /// Whether no further transitions are possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether the shift is waiting on a confirmation
    #[must_use]
    pub const fn awaits_confirmation(self) -> bool {
        matches!(self, Self::PendingConfirmation | Self::Scheduled)
    }
}

/// A caregiver-to-elder work assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledShift {
    /// Unique identifier
    pub id: Uuid,
    /// Agency running the shift
    pub agency_id: Uuid,
    /// Elder receiving care
    pub elder_id: Uuid,
    /// Assigned caregiver
    pub caregiver_id: Option<Uuid>,
    /// Shift date (elder-local)
    pub date: NaiveDate,
    /// Start time (elder-local)
    pub start_time: NaiveTime,
    /// End time (elder-local)
    pub end_time: NaiveTime,
    /// Status
    pub status: ShiftStatus,
    /// Last notification sent about this shift
    pub notification_id: Option<Uuid>,
    /// Optional instructions for the caregiver
    pub notes: Option<String>,
    /// Who created the shift
    pub created_by: Uuid,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

string_enum! {
    /// Status of one offer in a cascade
    pub enum OfferStatus {
        /// Waiting for earlier candidates
        Queued => "queued",
        /// Currently offered to this caregiver
        Pending => "pending",
        /// Caregiver accepted the shift
        Accepted => "accepted",
        /// Caregiver declined
        Declined => "declined",
        /// Offer window elapsed without a response
        Expired => "expired",
        /// Cascade ended before this offer was answered
        Withdrawn => "withdrawn",
    }
}

impl OfferStatus {
    /// Whether the offer has been settled
    #[must_use]
    pub const fn is_settled(self) -> bool {
        !matches!(self, Self::Queued | Self::Pending)
    }
}

/// One caregiver's place in a shift-offer cascade
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftOffer {
    /// Unique identifier
    pub id: Uuid,
    /// Shift being offered
    pub shift_id: Uuid,
    /// Candidate caregiver
    pub caregiver_id: Uuid,
    /// Position in the cascade (0 = first)
    pub position: u32,
    /// Status
    pub status: OfferStatus,
    /// When the offer became pending
    pub offered_at: Option<DateTime<Utc>>,
    /// When the pending offer lapses
    pub expires_at: Option<DateTime<Utc>>,
    /// When the caregiver answered
    pub responded_at: Option<DateTime<Utc>>,
}
