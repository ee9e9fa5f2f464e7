// ABOUTME: AI consent gate: validity evaluation, acceptance validation and reminder timing
// ABOUTME: A consent is valid iff all four flags are set, it is not revoked, and it has not expired
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::constants::messages::CONSENT_REQUIRED;
use crate::errors::{AppError, AppResult, FieldError};
use crate::models::{ConsentAcceptance, UnifiedAiConsent};

/// State of a user's latest consent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentState {
    /// Never accepted
    Missing,
    /// A flag is unset
    Incomplete,
    /// Withdrawn by the user
    Revoked,
    /// Past its expiry
    Expired,
    /// Usable
    Active,
}

/// Consent status returned to the client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentStatus {
    /// Evaluated state
    pub state: ConsentState,
    /// Whether AI features are unlocked
    pub valid: bool,
    /// Acceptance time of the latest record
    pub accepted_at: Option<DateTime<Utc>>,
    /// Expiry of the latest record
    pub expires_at: Option<DateTime<Utc>>,
    /// Whole days until expiry for an active consent
    pub days_remaining: Option<i64>,
}

/// Evaluate the latest consent record at `now`
#[must_use]
pub fn evaluate(consent: Option<&UnifiedAiConsent>, now: DateTime<Utc>) -> ConsentState {
    match consent {
        None => ConsentState::Missing,
        Some(c) if c.revoked_at.is_some() => ConsentState::Revoked,
        Some(c) if !c.acceptance.all_accepted() => ConsentState::Incomplete,
        Some(c) if now >= c.expires_at => ConsentState::Expired,
        Some(_) => ConsentState::Active,
    }
}

/// Whether the gate lets the user through
#[must_use]
pub fn is_valid(consent: Option<&UnifiedAiConsent>, now: DateTime<Utc>) -> bool {
    evaluate(consent, now) == ConsentState::Active
}

/// Gate an AI or medical-check request
///
/// # Errors
///
/// Returns `ConsentRequired` (403) unless the consent is active.
pub fn require(consent: Option<&UnifiedAiConsent>, now: DateTime<Utc>) -> AppResult<()> {
    if is_valid(consent, now) {
        Ok(())
    } else {
        Err(AppError::consent_required(CONSENT_REQUIRED))
    }
}

/// Summarize the latest consent for the status endpoint
#[must_use]
pub fn status(consent: Option<&UnifiedAiConsent>, now: DateTime<Utc>) -> ConsentStatus {
    let state = evaluate(consent, now);
    let valid = state == ConsentState::Active;
    ConsentStatus {
        state,
        valid,
        accepted_at: consent.map(|c| c.accepted_at),
        expires_at: consent.map(|c| c.expires_at),
        days_remaining: consent
            .filter(|_| valid)
            .map(|c| (c.expires_at - now).num_days()),
    }
}

/// Check a new acceptance before it is stored
///
/// # Errors
///
/// Returns a validation error naming each unset flag, and `readTimeSeconds`
/// when the terms were open for less than `min_read_secs`.
pub fn validate_acceptance(
    acceptance: &ConsentAcceptance,
    read_time_seconds: u32,
    min_read_secs: u32,
) -> AppResult<()> {
    let mut errors: Vec<FieldError> = acceptance
        .missing()
        .into_iter()
        .map(|field| FieldError::new(field, "Must be accepted"))
        .collect();
    if read_time_seconds < min_read_secs {
        errors.push(FieldError::new(
            "readTimeSeconds",
            format!("Please read the terms for at least {min_read_secs} seconds"),
        ));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(errors))
    }
}

/// Whether an active consent expires within `lead_days`
#[must_use]
pub fn needs_reminder(consent: &UnifiedAiConsent, now: DateTime<Utc>, lead_days: i64) -> bool {
    is_valid(Some(consent), now) && consent.expires_at - now <= Duration::days(lead_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use uuid::Uuid;

    const ALL: ConsentAcceptance = ConsentAcceptance {
        terms_accepted: true,
        medical_disclaimer_accepted: true,
        data_usage_accepted: true,
        limitations_acknowledged: true,
    };

    fn consent(acceptance: ConsentAcceptance, accepted_at: DateTime<Utc>) -> UnifiedAiConsent {
        UnifiedAiConsent::new(Uuid::new_v4(), acceptance, 45, accepted_at, 90)
    }

    #[test]
    fn valid_only_when_complete_unrevoked_and_unexpired() {
        let now = Utc::now();
        let active = consent(ALL, now - Duration::days(10));
        assert!(is_valid(Some(&active), now));

        let mut revoked = active.clone();
        revoked.revoked_at = Some(now);
        assert_eq!(evaluate(Some(&revoked), now), ConsentState::Revoked);

        let partial = consent(
            ConsentAcceptance {
                data_usage_accepted: false,
                ..ALL
            },
            now,
        );
        assert_eq!(evaluate(Some(&partial), now), ConsentState::Incomplete);

        let old = consent(ALL, now - Duration::days(90));
        assert_eq!(evaluate(Some(&old), now), ConsentState::Expired);
        assert_eq!(evaluate(None, now), ConsentState::Missing);
    }

    #[test]
    fn gate_returns_consent_required() {
        let err = require(None, Utc::now()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConsentRequired);
        assert_eq!(err.http_status(), 403);
    }

    #[test]
    fn acceptance_requires_flags_and_read_time() {
        assert!(validate_acceptance(&ALL, 30, 30).is_ok());
        let err = validate_acceptance(&ConsentAcceptance::default(), 5, 30).unwrap_err();
        assert_eq!(err.field_errors.len(), 5);
        assert!(err.field_errors.iter().any(|e| e.field == "readTimeSeconds"));
    }

    #[test]
    fn reminder_window() {
        let now = Utc::now();
        let expiring = consent(ALL, now - Duration::days(85));
        assert!(needs_reminder(&expiring, now, 7));
        let fresh = consent(ALL, now - Duration::days(10));
        assert!(!needs_reminder(&fresh, now, 7));
        assert_eq!(status(Some(&fresh), now).days_remaining, Some(80));
    }
}
