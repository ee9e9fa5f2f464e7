// ABOUTME: Flags textual co-mentions between medications in cached FDA label sections
// ABOUTME: Also flags medications whose names contain a recorded allergen; never interprets results
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # Interaction flagging
//!
//! For every ordered pair of medications `(a, b)` with `a != b`, the check
//! looks for `b`'s name or generic name as a whole word inside `a`'s label
//! sections. A hit is reported with the section and a verbatim excerpt. The
//! check is a text search and makes no clinical judgement.
//!
//! Health conditions are searched the same way, but only in the
//! contraindication and boxed warning sections.

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::constants::labels::EXCERPT_CONTEXT_CHARS;
use crate::constants::messages::INTERACTION_DISCLAIMER;
use crate::models::{Allergy, AllergySeverity, FdaDrugLabel, LabelSection};

/// Shortest search term considered; shorter names match too much prose
const MIN_TERM_CHARS: usize = 3;

/// A medication under check and its cached label, if one was found
#[derive(Debug, Clone)]
pub struct CheckedMedication {
    /// Name as entered by the caregiver
    pub name: String,
    /// Cached label
    pub label: Option<FdaDrugLabel>,
}

/// One medication's name found in another's label
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionFlag {
    /// Medication whose label mentions the other
    pub medication: String,
    /// Medication that is mentioned
    pub mentioned: String,
    /// Term that matched (name or generic name)
    pub matched_term: String,
    /// Label section containing the mention
    pub section: LabelSection,
    /// Verbatim text around the mention
    pub excerpt: String,
}

/// A medication whose name contains a recorded allergen
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllergyConflict {
    /// Medication name
    pub medication: String,
    /// Recorded allergen
    pub allergen: String,
    /// Recorded severity
    pub severity: AllergySeverity,
}

/// A health condition named in a medication's contraindications or boxed warning
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionMention {
    /// Medication whose label names the condition
    pub medication: String,
    /// Condition as recorded
    pub condition: String,
    /// Label section containing the mention
    pub section: LabelSection,
    /// Verbatim text around the mention
    pub excerpt: String,
}

/// Full result of an interaction check
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionReport {
    /// `no_interactions_flagged` or `review_recommended`
    pub status: &'static str,
    /// Medication names checked
    pub medications_checked: Vec<String>,
    /// Medications without a cached label (not searchable)
    pub labels_unavailable: Vec<String>,
    /// Label co-mentions
    pub flags: Vec<InteractionFlag>,
    /// Allergy matches
    pub allergy_conflicts: Vec<AllergyConflict>,
    /// Conditions named in contraindications or boxed warnings
    pub condition_mentions: Vec<ConditionMention>,
    /// One-sentence overview of the findings
    pub summary: String,
    /// Fixed disclaimer
    pub disclaimer: &'static str,
}

fn word_pattern(term: &str) -> Option<Regex> {
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(term)))
        .case_insensitive(true)
        .build()
        .ok()
}

fn search_terms(medication: &CheckedMedication) -> Vec<String> {
    let mut terms = vec![medication.name.trim().to_owned()];
    if let Some(generic) = medication
        .label
        .as_ref()
        .and_then(|label| label.generic_name.as_deref())
    {
        let generic = generic.trim();
        if !terms.iter().any(|t| t.eq_ignore_ascii_case(generic)) {
            terms.push(generic.to_owned());
        }
    }
    terms.retain(|term| term.chars().count() >= MIN_TERM_CHARS);
    terms
}

/// Text around `start..end`, widened to char boundaries, with ellipses when cut
#[must_use]
pub fn excerpt(text: &str, start: usize, end: usize, context: usize) -> String {
    let before = text[..start]
        .char_indices()
        .rev()
        .nth(context.saturating_sub(1))
        .map_or(0, |(i, _)| i);
    let after = text[end..]
        .char_indices()
        .nth(context)
        .map_or(text.len(), |(i, _)| end + i);

    let mut out = String::new();
    if before > 0 {
        out.push_str("...");
    }
    out.push_str(text[before..after].trim());
    if after < text.len() {
        out.push_str("...");
    }
    out
}

/// Label co-mentions for every ordered pair of distinct medications
#[must_use]
pub fn find_interactions(medications: &[CheckedMedication]) -> Vec<InteractionFlag> {
    let patterns: Vec<Vec<(String, Regex)>> = medications
        .iter()
        .map(|medication| {
            search_terms(medication)
                .into_iter()
                .filter_map(|term| word_pattern(&term).map(|pattern| (term, pattern)))
                .collect()
        })
        .collect();

    let mut flags = Vec::new();
    for (i, a) in medications.iter().enumerate() {
        let Some(label) = &a.label else { continue };
        for (j, b) in medications.iter().enumerate() {
            if i == j || a.name.trim().eq_ignore_ascii_case(b.name.trim()) {
                continue;
            }
            for section in LabelSection::ALL {
                let Some(text) = label.section(*section) else { continue };
                let hit = patterns[j]
                    .iter()
                    .find_map(|(term, pattern)| pattern.find(text).map(|m| (term, m)));
                if let Some((term, found)) = hit {
                    flags.push(InteractionFlag {
                        medication: a.name.clone(),
                        mentioned: b.name.clone(),
                        matched_term: term.clone(),
                        section: *section,
                        excerpt: excerpt(text, found.start(), found.end(), EXCERPT_CONTEXT_CHARS),
                    });
                }
            }
        }
    }
    flags
}

/// Medications whose name or generic name contains a recorded allergen
#[must_use]
pub fn find_allergy_conflicts(
    medications: &[CheckedMedication],
    allergies: &[Allergy],
) -> Vec<AllergyConflict> {
    let mut conflicts = Vec::new();
    for allergy in allergies {
        let allergen = allergy.allergen.trim();
        if allergen.chars().count() < MIN_TERM_CHARS {
            continue;
        }
        let Some(pattern) = word_pattern(allergen) else { continue };
        for medication in medications {
            let generic = medication
                .label
                .as_ref()
                .and_then(|label| label.generic_name.as_deref())
                .unwrap_or_default();
            let contains_allergen = medication
                .name
                .to_lowercase()
                .contains(&allergen.to_lowercase())
                || pattern.is_match(generic);
            if contains_allergen {
                conflicts.push(AllergyConflict {
                    medication: medication.name.clone(),
                    allergen: allergy.allergen.clone(),
                    severity: allergy.severity,
                });
            }
        }
    }
    conflicts
}

/// Conditions named in the contraindications or boxed warning of each label
#[must_use]
pub fn find_condition_mentions(
    medications: &[CheckedMedication],
    conditions: &[String],
) -> Vec<ConditionMention> {
    let patterns: Vec<(&str, Regex)> = conditions
        .iter()
        .map(|condition| condition.trim())
        .filter(|condition| condition.chars().count() >= MIN_TERM_CHARS)
        .filter_map(|condition| word_pattern(condition).map(|pattern| (condition, pattern)))
        .collect();

    let mut mentions = Vec::new();
    for medication in medications {
        let Some(label) = &medication.label else { continue };
        for (condition, pattern) in &patterns {
            let hit = [LabelSection::Contraindications, LabelSection::BoxedWarning]
                .into_iter()
                .find_map(|section| {
                    let text = label.section(section)?;
                    pattern.find(text).map(|found| (section, text, found))
                });
            if let Some((section, text, found)) = hit {
                mentions.push(ConditionMention {
                    medication: medication.name.clone(),
                    condition: (*condition).to_owned(),
                    section,
                    excerpt: excerpt(text, found.start(), found.end(), EXCERPT_CONTEXT_CHARS),
                });
            }
        }
    }
    mentions
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else if noun.ends_with("ch") {
        format!("{count} {noun}es")
    } else {
        format!("{count} {noun}s")
    }
}

/// Plain-language overview of a report's findings
#[must_use]
pub fn summarize(
    checked: usize,
    flags: usize,
    allergy_conflicts: usize,
    condition_mentions: usize,
    labels_unavailable: &[String],
) -> String {
    let mut findings = Vec::new();
    if flags > 0 {
        findings.push(plural(flags, "label co-mention"));
    }
    if allergy_conflicts > 0 {
        findings.push(plural(allergy_conflicts, "allergy match"));
    }
    if condition_mentions > 0 {
        findings.push(plural(condition_mentions, "condition warning"));
    }

    let overview = if findings.is_empty() {
        format!("Nothing flagged across {}.", plural(checked, "medication"))
    } else {
        format!(
            "Found {} across {}. Review them with a pharmacist or prescriber.",
            findings.join(" and "),
            plural(checked, "medication")
        )
    };
    if labels_unavailable.is_empty() {
        overview
    } else {
        format!(
            "{overview} No FDA label was available for {}.",
            labels_unavailable.join(", ")
        )
    }
}

/// Run every check and wrap the result with the disclaimer
#[must_use]
pub fn check(
    medications: &[CheckedMedication],
    allergies: &[Allergy],
    conditions: &[String],
) -> InteractionReport {
    let flags = find_interactions(medications);
    let allergy_conflicts = find_allergy_conflicts(medications, allergies);
    let condition_mentions = find_condition_mentions(medications, conditions);
    let clear = flags.is_empty() && allergy_conflicts.is_empty() && condition_mentions.is_empty();
    let status = if clear {
        "no_interactions_flagged"
    } else {
        "review_recommended"
    };
    let labels_unavailable: Vec<String> = medications
        .iter()
        .filter(|m| m.label.is_none())
        .map(|m| m.name.clone())
        .collect();
    let summary = summarize(
        medications.len(),
        flags.len(),
        allergy_conflicts.len(),
        condition_mentions.len(),
        &labels_unavailable,
    );
    InteractionReport {
        status,
        medications_checked: medications.iter().map(|m| m.name.clone()).collect(),
        labels_unavailable,
        flags,
        allergy_conflicts,
        condition_mentions,
        summary,
        disclaimer: INTERACTION_DISCLAIMER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn label(generic: &str, interactions: &str) -> FdaDrugLabel {
        FdaDrugLabel {
            medication_key: generic.to_lowercase(),
            brand_name: None,
            generic_name: Some(generic.to_owned()),
            boxed_warning: None,
            warnings: None,
            contraindications: None,
            drug_interactions: Some(interactions.to_owned()),
            source_id: None,
            fetched_at: Utc::now(),
        }
    }

    fn med(name: &str, label: Option<FdaDrugLabel>) -> CheckedMedication {
        CheckedMedication {
            name: name.to_owned(),
            label,
        }
    }

    #[test]
    fn co_mention_is_flagged_with_excerpt() {
        let meds = [
            med(
                "Coumadin",
                Some(label(
                    "warfarin",
                    "Concomitant use with aspirin may increase the risk of bleeding.",
                )),
            ),
            med("Aspirin", None),
        ];
        let flags = find_interactions(&meds);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].medication, "Coumadin");
        assert_eq!(flags[0].mentioned, "Aspirin");
        assert_eq!(flags[0].section, LabelSection::DrugInteractions);
        assert!(flags[0].excerpt.contains("aspirin may increase"));
    }

    #[test]
    fn generic_name_matches_and_substrings_do_not() {
        let meds = [
            med(
                "Zestril",
                Some(label("lisinopril", "Avoid combining with nonaspirinate products.")),
            ),
            med("Aspirin", None),
            med("Glucophage", Some(label("metformin", "Lisinopril may alter glucose control."))),
        ];
        let flags = find_interactions(&meds);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].medication, "Glucophage");
        assert_eq!(flags[0].mentioned, "Zestril");
        assert_eq!(flags[0].matched_term, "lisinopril");
    }

    #[test]
    fn no_mention_means_no_flag() {
        let meds = [
            med("Tylenol", Some(label("acetaminophen", "Alcohol may increase liver risk."))),
            med("Vitamin D", None),
        ];
        let report = check(&meds, &[], &[]);
        assert!(report.flags.is_empty());
        assert_eq!(report.status, "no_interactions_flagged");
        assert_eq!(report.labels_unavailable, vec!["Vitamin D".to_owned()]);
        assert_eq!(
            report.summary,
            "Nothing flagged across 2 medications. No FDA label was available for Vitamin D."
        );
        assert!(!report.disclaimer.is_empty());
    }

    #[test]
    fn allergen_in_medication_name() {
        let allergy = Allergy {
            id: Uuid::new_v4(),
            elder_id: Uuid::new_v4(),
            allergen: "Penicillin".to_owned(),
            reaction: Some("hives".to_owned()),
            severity: AllergySeverity::Severe,
            created_at: Utc::now(),
        };
        let meds = [med("Penicillin VK", None), med("Ibuprofen", None)];
        let report = check(&meds, &[allergy], &[]);
        assert_eq!(report.allergy_conflicts.len(), 1);
        assert_eq!(report.allergy_conflicts[0].medication, "Penicillin VK");
        assert_eq!(report.status, "review_recommended");
        assert!(report.summary.starts_with("Found 1 allergy match across 2 medications."));
    }

    #[test]
    fn conditions_only_match_contraindications_and_boxed_warnings() {
        let mut metformin = label("metformin", "Kidney disease may raise metformin levels.");
        metformin.contraindications =
            Some("Contraindicated in patients with severe renal impairment.".to_owned());
        let meds = [med("Glucophage", Some(metformin))];
        let conditions = ["Renal impairment".to_owned(), "Kidney disease".to_owned()];

        let mentions = find_condition_mentions(&meds, &conditions);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].condition, "Renal impairment");
        assert_eq!(mentions[0].section, LabelSection::Contraindications);

        let report = check(&meds, &[], &conditions);
        assert_eq!(report.status, "review_recommended");
        assert!(report.summary.contains("1 condition warning"));
    }

    #[test]
    fn excerpt_marks_truncation() {
        let text = "aaaa bbbb TARGET cccc dddd";
        let start = text.find("TARGET").unwrap();
        let out = excerpt(text, start, start + 6, 5);
        assert_eq!(out, "...bbbb TARGET cccc...");
    }
}
