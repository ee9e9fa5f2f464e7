// ABOUTME: Summary prompts, previews and confidence for documents on an elder's record
// ABOUTME: Each document type asks the model for the facts that matter for that kind of paper
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::constants::documents::{
    HIGH_CONFIDENCE_MIN_CHARS, MAX_PROMPT_TEXT_CHARS, PREVIEW_CHARS, SUPPORTED_EXTENSIONS,
};
use crate::errors::{AppError, AppResult};
use crate::models::{DocumentSummary, DocumentType, SummaryConfidence};

/// First `max` characters of `text`
fn leading_chars(text: &str, max: usize) -> &str {
    text.char_indices()
        .nth(max)
        .map_or(text, |(index, _)| &text[..index])
}

/// Check an uploaded file name against the extractable formats
///
/// # Errors
///
/// Returns `InvalidInput` for a missing or unsupported extension.
pub fn check_file_name(file_name: &str) -> AppResult<()> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(AppError::invalid_input(format!(
            "Unsupported file format: {file_name}. Supported formats are {}",
            SUPPORTED_EXTENSIONS.join(", ")
        )))
    }
}

/// Prompt for summarizing `text` as a `document_type`
#[must_use]
pub fn summary_prompt(document_type: DocumentType, text: &str) -> String {
    let asks = match document_type {
        DocumentType::Certification => {
            "Analyze this certification document and extract: \
             1. Certification type and issuing organization \
             2. Issue date and expiration date \
             3. Certification number \
             4. Key qualifications granted \
             5. Any restrictions or limitations"
        }
        DocumentType::BackgroundCheck => {
            "Analyze this background check document and extract: \
             1. Type of background check performed \
             2. Date of check \
             3. Overall result (pass/fail/pending) \
             4. Any flags or concerns mentioned \
             5. Verification reference number"
        }
        DocumentType::Identification => {
            "Analyze this ID document and extract: \
             1. Type of ID (driver's license, passport, etc.) \
             2. Issuing authority \
             3. Expiration date \
             4. Any relevant endorsements"
        }
        DocumentType::MedicalRecord | DocumentType::Other => {
            "Summarize the key information from this document"
        }
    };
    format!(
        "{asks}\n\nText: {}",
        leading_chars(text, MAX_PROMPT_TEXT_CHARS)
    )
}

/// Confidence earned by the amount of text
#[must_use]
pub fn confidence(text: &str) -> SummaryConfidence {
    if text.chars().count() > HIGH_CONFIDENCE_MIN_CHARS {
        SummaryConfidence::High
    } else {
        SummaryConfidence::Low
    }
}

/// Build the stored summary from a model reply
///
/// # Errors
///
/// Returns an external-service error for an empty reply.
pub fn summarize(reply: &str, text: &str, now: DateTime<Utc>) -> AppResult<DocumentSummary> {
    let summary = reply.trim();
    if summary.is_empty() {
        return Err(AppError::external_service(
            "document summary",
            "Model returned an empty summary",
        ));
    }
    Ok(DocumentSummary {
        summary: summary.to_owned(),
        confidence: confidence(text),
        preview: leading_chars(text, PREVIEW_CHARS).to_owned(),
        text_length: text.chars().count(),
        summarized_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_depends_on_type_and_caps_text() {
        let text = "é".repeat(MAX_PROMPT_TEXT_CHARS + 50);
        let prompt = summary_prompt(DocumentType::Certification, &text);
        assert!(prompt.starts_with("Analyze this certification document"));
        assert!(prompt.contains("Certification number"));
        assert_eq!(prompt.matches('é').count(), MAX_PROMPT_TEXT_CHARS);

        let check = summary_prompt(DocumentType::BackgroundCheck, "Cleared");
        assert!(check.contains("Overall result (pass/fail/pending)"));
        assert!(check.ends_with("Text: Cleared"));

        let id = summary_prompt(DocumentType::Identification, "Passport");
        assert!(id.contains("Issuing authority"));

        let letter = summary_prompt(DocumentType::MedicalRecord, "Discharged home");
        assert!(letter.starts_with("Summarize the key information"));
    }

    #[test]
    fn confidence_follows_text_length() {
        assert_eq!(confidence(&"a".repeat(100)), SummaryConfidence::Low);
        assert_eq!(confidence(&"a".repeat(101)), SummaryConfidence::High);
    }

    #[test]
    fn summary_keeps_a_preview_and_rejects_empty_replies() {
        let text = "x".repeat(1200);
        let reply = "  Valid CPR certificate until 2027.\n";
        let summary = summarize(reply, &text, Utc::now()).unwrap();
        assert_eq!(summary.summary, "Valid CPR certificate until 2027.");
        assert_eq!(summary.preview.len(), PREVIEW_CHARS);
        assert_eq!(summary.text_length, 1200);
        assert_eq!(summary.confidence, SummaryConfidence::High);

        assert!(summarize("   ", &text, Utc::now()).is_err());
    }

    #[test]
    fn only_extractable_file_types_are_accepted() {
        assert!(check_file_name("cpr-card.PDF").is_ok());
        assert!(check_file_name("license.jpeg").is_ok());
        assert!(check_file_name("notes.docx").is_err());
        assert!(check_file_name("scan").is_err());
    }
}
