// ABOUTME: Time-boxed AI/medical consent record with four acceptance flags
// ABOUTME: Records expire 90 days after acceptance and may be revoked early
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four acceptance flags submitted by the consent dialog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentAcceptance {
    /// AI terms of use accepted
    pub terms_accepted: bool,
    /// Medical disclaimer accepted
    pub medical_disclaimer_accepted: bool,
    /// Processing of health data by the AI provider accepted
    pub data_usage_accepted: bool,
    /// Limitations of AI output acknowledged
    pub limitations_acknowledged: bool,
}

impl ConsentAcceptance {
    /// Whether all four flags are set
    #[must_use]
    pub const fn all_accepted(&self) -> bool {
        self.terms_accepted
            && self.medical_disclaimer_accepted
            && self.data_usage_accepted
            && self.limitations_acknowledged
    }

    /// Request field names of the flags that are not set
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (self.terms_accepted, "termsAccepted"),
            (self.medical_disclaimer_accepted, "medicalDisclaimerAccepted"),
            (self.data_usage_accepted, "dataUsageAccepted"),
            (self.limitations_acknowledged, "limitationsAcknowledged"),
        ]
        .into_iter()
        .filter_map(|(accepted, name)| (!accepted).then_some(name))
        .collect()
    }
}

/// A user's consent to AI and medical features
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedAiConsent {
    /// Unique identifier
    pub id: Uuid,
    /// Consenting user
    pub user_id: Uuid,
    /// Acceptance flags
    #[serde(flatten)]
    pub acceptance: ConsentAcceptance,
    /// Seconds the user spent on the terms before accepting
    pub read_time_seconds: u32,
    /// When consent was given
    pub accepted_at: DateTime<Utc>,
    /// When consent lapses
    pub expires_at: DateTime<Utc>,
    /// When the user revoked consent
    pub revoked_at: Option<DateTime<Utc>>,
}

impl UnifiedAiConsent {
    /// Create a consent record valid for `validity_days`
    #[must_use]
    pub fn new(
        user_id: Uuid,
        acceptance: ConsentAcceptance,
        read_time_seconds: u32,
        accepted_at: DateTime<Utc>,
        validity_days: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            acceptance,
            read_time_seconds,
            accepted_at,
            expires_at: accepted_at + Duration::days(validity_days),
            revoked_at: None,
        }
    }
}
