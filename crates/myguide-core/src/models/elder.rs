// ABOUTME: Care recipient profile with allergies and health conditions
// ABOUTME: Dose times are local to the elder, expressed via a fixed UTC offset
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The care recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Elder {
    /// Unique identifier
    pub id: Uuid,
    /// Owning group
    pub group_id: Uuid,
    /// Full name
    pub name: String,
    /// Date of birth
    pub date_of_birth: Option<NaiveDate>,
    /// Offset of the elder's local time from UTC, in minutes
    pub utc_offset_minutes: i32,
    /// Free-form notes
    pub notes: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Elder {
    /// The elder's local offset, falling back to UTC for out-of-range values
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Age in whole years on the given date
    #[must_use]
    pub fn age_on(&self, date: NaiveDate) -> Option<u32> {
        self.date_of_birth.and_then(|dob| date.years_since(dob))
    }
}

string_enum! {
    /// Severity of a recorded allergy
    pub enum AllergySeverity {
        /// Mild reaction
        Mild => "mild",
        /// Moderate reaction
        Moderate => "moderate",
        /// Severe or anaphylactic reaction
        Severe => "severe",
    }
}

/// A recorded allergy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allergy {
    /// Unique identifier
    pub id: Uuid,
    /// Elder
    pub elder_id: Uuid,
    /// Allergen (e.g. "penicillin")
    pub allergen: String,
    /// Observed reaction
    pub reaction: Option<String>,
    /// Severity
    pub severity: AllergySeverity,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// A diagnosed health condition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCondition {
    /// Unique identifier
    pub id: Uuid,
    /// Elder
    pub elder_id: Uuid,
    /// Condition name
    pub name: String,
    /// Diagnosis date
    pub diagnosed_on: Option<NaiveDate>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}
