// ABOUTME: Medication and supplement regimen items with their dose logs
// ABOUTME: Frequency is a list of elder-local times; each scheduled dose may receive one log
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    /// Whether an item is a prescribed medication or a supplement
    pub enum RegimenKind {
        /// Prescribed or over-the-counter medication
        Medication => "medication",
        /// Vitamin, mineral or other supplement
        Supplement => "supplement",
    }
}

/// A medication or supplement on an elder's schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimenItem {
    /// Unique identifier
    pub id: Uuid,
    /// Elder taking the item
    pub elder_id: Uuid,
    /// Medication or supplement
    pub kind: RegimenKind,
    /// Product name (e.g. "Lisinopril")
    pub name: String,
    /// Dosage (e.g. "10mg")
    pub dosage: String,
    /// Elder-local times of day the item is due
    pub frequency: Vec<NaiveTime>,
    /// First day of the regimen
    pub start_date: NaiveDate,
    /// Last day of the regimen, open-ended when absent
    pub end_date: Option<NaiveDate>,
    /// Free-form instructions
    pub instructions: Option<String>,
    /// Who created the item
    pub created_by: Uuid,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl RegimenItem {
    /// Whether the item is scheduled on the given elder-local date
    #[must_use]
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && self.end_date.map_or(true, |end| date <= end)
    }
}

string_enum! {
    /// Outcome recorded for a scheduled dose
    pub enum DoseStatus {
        /// Taken within the on-time window
        Taken => "taken",
        /// Taken after the on-time window
        Late => "late",
        /// Not taken
        Missed => "missed",
        /// Deliberately skipped (e.g. on clinician advice)
        Skipped => "skipped",
    }
}

impl DoseStatus {
    /// Whether the dose counts as taken for adherence
    #[must_use]
    pub const fn counts_as_taken(self) -> bool {
        matches!(self, Self::Taken | Self::Late)
    }
}

/// A log entry for one scheduled dose
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseLog {
    /// Unique identifier
    pub id: Uuid,
    /// Regimen item
    pub item_id: Uuid,
    /// Elder
    pub elder_id: Uuid,
    /// UTC instant of the scheduled dose
    pub scheduled_for: DateTime<Utc>,
    /// Outcome
    pub status: DoseStatus,
    /// When the log was written
    pub logged_at: DateTime<Utc>,
    /// Who wrote the log
    pub logged_by: Uuid,
    /// Free-form notes
    pub notes: Option<String>,
}
