// ABOUTME: Shift confirmation state machine and the sequential offer cascade rules
// ABOUTME: Transitions outside the allowed set are rejected as invalid state transitions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # Shift workflow rules
//!
//! | Action | From | To |
//! |---|---|---|
//! | assign | `open` | `pending_confirmation` |
//! | caregiver confirm | `pending_confirmation`, `scheduled` | `confirmed` |
//! | owner confirm | `pending_confirmation`, `scheduled` | `owner_confirmed` |
//! | caregiver decline | `pending_confirmation`, `scheduled` | `open` |
//! | complete | `confirmed`, `owner_confirmed` | `completed` |
//! | cancel | any non-terminal | `cancelled` |
//!
//! A shift created with a caregiver starts as `scheduled`; without one it
//! starts `open`.
//!
//! The offer cascade keeps exactly one `pending` offer per shift at a time;
//! the rest wait as `queued` in position order.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::constants::shifts::MAX_OFFER_CANDIDATES;
use crate::errors::{AppError, AppResult};
use crate::models::{OfferStatus, ScheduledShift, ShiftOffer, ShiftStatus};

/// A requested change to a shift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftAction {
    /// Give an open shift to a caregiver
    Assign {
        /// Caregiver receiving the shift
        caregiver_id: Uuid,
    },
    /// Assigned caregiver accepts
    CaregiverConfirm,
    /// Agency owner or admin confirms on the caregiver's behalf
    OwnerConfirm,
    /// Assigned caregiver turns the shift down
    CaregiverDecline,
    /// Shift was worked
    Complete,
    /// Shift will not happen
    Cancel,
}

impl ShiftAction {
    /// Short name used in logs and error messages
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Assign { .. } => "assign",
            Self::CaregiverConfirm => "confirm",
            Self::OwnerConfirm => "owner_confirm",
            Self::CaregiverDecline => "decline",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }
}

/// Target status for `action` from `current`
///
/// # Errors
///
/// Returns `InvalidStateTransition` when the action is not allowed from `current`.
pub fn next_status(current: ShiftStatus, action: ShiftAction) -> AppResult<ShiftStatus> {
    let next = match (action, current) {
        (ShiftAction::Assign { .. }, ShiftStatus::Open) => Some(ShiftStatus::PendingConfirmation),
        (ShiftAction::CaregiverConfirm, s) if s.awaits_confirmation() => {
            Some(ShiftStatus::Confirmed)
        }
        (ShiftAction::OwnerConfirm, s) if s.awaits_confirmation() => {
            Some(ShiftStatus::OwnerConfirmed)
        }
        (ShiftAction::CaregiverDecline, s) if s.awaits_confirmation() => Some(ShiftStatus::Open),
        (ShiftAction::Complete, ShiftStatus::Confirmed | ShiftStatus::OwnerConfirmed) => {
            Some(ShiftStatus::Completed)
        }
        (ShiftAction::Cancel, s) if !s.is_terminal() => Some(ShiftStatus::Cancelled),
        _ => None,
    };
    next.ok_or_else(|| {
        AppError::invalid_state(format!(
            "Cannot {} a shift that is {current}",
            action.name()
        ))
    })
}

/// The shift after applying `action`
///
/// Assignment sets the caregiver and a decline clears it.
///
/// # Errors
///
/// Returns `InvalidStateTransition` when the action is not allowed.
pub fn apply(
    shift: &ScheduledShift,
    action: ShiftAction,
    now: DateTime<Utc>,
) -> AppResult<ScheduledShift> {
    let status = next_status(shift.status, action)?;
    let mut updated = shift.clone();
    updated.status = status;
    updated.updated_at = now;
    match action {
        ShiftAction::Assign { caregiver_id } => updated.caregiver_id = Some(caregiver_id),
        ShiftAction::CaregiverDecline => updated.caregiver_id = None,
        _ => {}
    }
    Ok(updated)
}

/// Build the offers for a new cascade
///
/// Duplicate candidates keep their first position. Position 0 is `pending`
/// and expires after `window`; every other offer is `queued`.
///
/// # Errors
///
/// Returns `InvalidInput` for an empty or oversized candidate list.
pub fn plan_offers(
    shift_id: Uuid,
    candidates: &[Uuid],
    now: DateTime<Utc>,
    window: Duration,
) -> AppResult<Vec<ShiftOffer>> {
    let mut seen = HashSet::new();
    let ordered: Vec<Uuid> = candidates
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();

    if ordered.is_empty() {
        return Err(AppError::invalid_input("At least one caregiver is required"));
    }
    if ordered.len() > MAX_OFFER_CANDIDATES {
        return Err(AppError::invalid_input(format!(
            "At most {MAX_OFFER_CANDIDATES} caregivers can be offered a shift"
        )));
    }

    Ok(ordered
        .into_iter()
        .zip(0u32..)
        .map(|(caregiver_id, position)| {
            let offer = ShiftOffer {
                id: Uuid::new_v4(),
                shift_id,
                caregiver_id,
                position,
                status: OfferStatus::Queued,
                offered_at: None,
                expires_at: None,
                responded_at: None,
            };
            if position == 0 {
                activate(&offer, now, window)
            } else {
                offer
            }
        })
        .collect())
}

/// The queued offer with the lowest position
#[must_use]
pub fn next_queued(offers: &[ShiftOffer]) -> Option<&ShiftOffer> {
    offers
        .iter()
        .filter(|offer| offer.status == OfferStatus::Queued)
        .min_by_key(|offer| offer.position)
}

/// `offer` as the live pending offer
#[must_use]
pub fn activate(offer: &ShiftOffer, now: DateTime<Utc>, window: Duration) -> ShiftOffer {
    ShiftOffer {
        status: OfferStatus::Pending,
        offered_at: Some(now),
        expires_at: Some(now + window),
        ..offer.clone()
    }
}

/// `offer` closed with `status`
#[must_use]
pub fn settle(offer: &ShiftOffer, status: OfferStatus, now: DateTime<Utc>) -> ShiftOffer {
    ShiftOffer {
        status,
        responded_at: Some(now),
        ..offer.clone()
    }
}

/// Check that `caregiver_id` may answer `offer` at `now`
///
/// # Errors
///
/// Returns `PermissionDenied` for another caregiver's offer and
/// `InvalidStateTransition` when the offer is not pending or has lapsed.
pub fn ensure_answerable(
    offer: &ShiftOffer,
    caregiver_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if offer.caregiver_id != caregiver_id {
        return Err(AppError::permission_denied("This offer belongs to another caregiver"));
    }
    if offer.status != OfferStatus::Pending {
        return Err(AppError::invalid_state(format!(
            "Offer is {} and can no longer be answered",
            offer.status
        )));
    }
    if offer.expires_at.is_some_and(|expiry| expiry <= now) {
        return Err(AppError::invalid_state("Offer has expired"));
    }
    Ok(())
}
