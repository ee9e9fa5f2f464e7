// ABOUTME: Deferred account deletion rules: request, cancel inside the grace period, purge when due
// ABOUTME: A request moves the user to pending_deletion; cancelling restores active
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::AccountDeletion;

/// Deletion status returned to the client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionStatus {
    /// When the request was made
    pub requested_at: DateTime<Utc>,
    /// When the account will be purged
    pub scheduled_for: DateTime<Utc>,
    /// Whole days left to cancel
    pub days_remaining: i64,
}

/// Create a deletion request for `user_id`
///
/// # Errors
///
/// Returns `ResourceAlreadyExists` when a request is already pending.
pub fn request(
    user_id: Uuid,
    existing: Option<&AccountDeletion>,
    now: DateTime<Utc>,
    grace_days: i64,
) -> AppResult<AccountDeletion> {
    if existing.is_some_and(AccountDeletion::is_active) {
        return Err(AppError::already_exists("Account deletion is already scheduled"));
    }
    Ok(AccountDeletion::schedule(user_id, now, grace_days))
}

/// Check that a pending request can still be cancelled
///
/// # Errors
///
/// Returns `ResourceNotFound` without a pending request and
/// `InvalidStateTransition` once the grace period has ended.
pub fn ensure_cancellable(existing: Option<&AccountDeletion>, now: DateTime<Utc>) -> AppResult<()> {
    let deletion = existing
        .filter(|deletion| deletion.is_active())
        .ok_or_else(|| AppError::not_found("Pending account deletion"))?;
    if is_due(deletion, now) {
        return Err(AppError::invalid_state("The grace period has ended"));
    }
    Ok(())
}

/// Whether the purge may run
#[must_use]
pub fn is_due(deletion: &AccountDeletion, now: DateTime<Utc>) -> bool {
    deletion.is_active() && deletion.scheduled_for <= now
}

/// Client-facing summary
#[must_use]
pub fn status(deletion: &AccountDeletion, now: DateTime<Utc>) -> DeletionStatus {
    DeletionStatus {
        requested_at: deletion.requested_at,
        scheduled_for: deletion.scheduled_for,
        days_remaining: (deletion.scheduled_for - now).num_days().max(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use chrono::Duration;

    #[test]
    fn request_schedules_thirty_days_out() {
        let now = Utc::now();
        let deletion = request(Uuid::new_v4(), None, now, 30).unwrap();
        assert_eq!(deletion.scheduled_for, now + Duration::days(30));
        assert_eq!(status(&deletion, now).days_remaining, 30);

        let err = request(deletion.user_id, Some(&deletion), now, 30).unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceAlreadyExists);

        let mut cancelled = deletion.clone();
        cancelled.cancelled_at = Some(now);
        assert!(request(deletion.user_id, Some(&cancelled), now, 30).is_ok());
    }

    #[test]
    fn cancel_only_inside_the_window() {
        let now = Utc::now();
        let deletion = AccountDeletion::schedule(Uuid::new_v4(), now, 30);
        assert!(ensure_cancellable(Some(&deletion), now + Duration::days(29)).is_ok());
        assert!(is_due(&deletion, now + Duration::days(30)));
        assert_eq!(
            ensure_cancellable(Some(&deletion), now + Duration::days(31)).unwrap_err().code,
            ErrorCode::InvalidStateTransition
        );
        assert_eq!(
            ensure_cancellable(None, now).unwrap_err().code,
            ErrorCode::ResourceNotFound
        );
    }
}
