// ABOUTME: Documents filed on an elder's record and their AI summaries
// ABOUTME: Content text is kept out of this type; it is stored encrypted and loaded separately
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    /// Kind of document, which selects the summary prompt
    pub enum DocumentType {
        /// Caregiver certification or training record
        Certification => "certification",
        /// Background check result
        BackgroundCheck => "background_check",
        /// Identity document
        Identification => "identification",
        /// Discharge letter, test result or similar
        MedicalRecord => "medical_record",
        /// Anything else
        Other => "other",
    }
}

string_enum! {
    /// Where a document is in the summary pipeline
    pub enum ProcessingStatus {
        /// Uploaded, not yet summarized
        Pending => "pending",
        /// Summary stored
        Completed => "completed",
        /// The last summary attempt failed
        Failed => "failed",
    }
}

string_enum! {
    /// How much text the summary was based on
    pub enum SummaryConfidence {
        /// Enough text to summarize
        High => "high",
        /// Very little text; the summary may be unreliable
        Low => "low",
    }
}

/// AI summary of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    /// Model-written summary
    pub summary: String,
    /// Based on text length
    pub confidence: SummaryConfidence,
    /// Start of the document text
    pub preview: String,
    /// Characters in the full text
    pub text_length: usize,
    /// When the summary was produced
    pub summarized_at: DateTime<Utc>,
}

/// A document on an elder's record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElderDocument {
    /// Unique identifier
    pub id: Uuid,
    /// Elder
    pub elder_id: Uuid,
    /// Uploader
    pub uploaded_by: Uuid,
    /// Short title
    pub title: String,
    /// Document kind
    pub document_type: DocumentType,
    /// Original file name, when known
    pub file_name: Option<String>,
    /// Characters of extracted text
    pub text_length: usize,
    /// Summary pipeline state
    pub processing_status: ProcessingStatus,
    /// Latest summary
    pub summary: Option<DocumentSummary>,
    /// Why the last attempt failed
    pub failure_reason: Option<String>,
    /// Set until a group admin has checked the summary
    pub requires_review: bool,
    /// Admin who reviewed it
    pub reviewed_by: Option<Uuid>,
    /// When it was reviewed
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Upload time
    pub created_at: DateTime<Utc>,
    /// Last summary attempt
    pub processed_at: Option<DateTime<Utc>>,
}
