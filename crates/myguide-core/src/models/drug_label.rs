// ABOUTME: Verbatim openFDA drug label sections cached per medication name
// ABOUTME: Labels are considered stale once older than the refresh window
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    /// Label sections searched for co-mentions
    pub enum LabelSection {
        /// Boxed ("black box") warning
        BoxedWarning => "boxed_warning",
        /// Warnings and precautions
        Warnings => "warnings",
        /// Contraindications
        Contraindications => "contraindications",
        /// Drug interactions
        DrugInteractions => "drug_interactions",
    }
}

/// A cached FDA label
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FdaDrugLabel {
    /// Lowercased medication name used as cache key
    pub medication_key: String,
    /// Brand name(s) reported by openFDA
    pub brand_name: Option<String>,
    /// Generic name reported by openFDA
    pub generic_name: Option<String>,
    /// Boxed warning text
    pub boxed_warning: Option<String>,
    /// Warnings text
    pub warnings: Option<String>,
    /// Contraindications text
    pub contraindications: Option<String>,
    /// Drug interactions text
    pub drug_interactions: Option<String>,
    /// openFDA set id of the label
    pub source_id: Option<String>,
    /// When the label was fetched
    pub fetched_at: DateTime<Utc>,
}

impl FdaDrugLabel {
    /// Normalize a medication name into a cache key
    #[must_use]
    pub fn key_for(name: &str) -> String {
        name.trim().to_lowercase()
    }

    /// Text of one section
    #[must_use]
    pub fn section(&self, section: LabelSection) -> Option<&str> {
        match section {
            LabelSection::BoxedWarning => self.boxed_warning.as_deref(),
            LabelSection::Warnings => self.warnings.as_deref(),
            LabelSection::Contraindications => self.contraindications.as_deref(),
            LabelSection::DrugInteractions => self.drug_interactions.as_deref(),
        }
    }

    /// Whether the label is older than `max_age_days`
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_days: i64) -> bool {
        now - self.fetched_at >= Duration::days(max_age_days)
    }
}
