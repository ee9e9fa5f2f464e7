// ABOUTME: Database operations for elder documents, their encrypted content and summaries
// ABOUTME: Content is AES-GCM encrypted with the document id in the associated data
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{parse_id, parse_opt_id, parse_opt_ts, parse_stored, parse_ts, ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{DocumentSummary, ElderDocument};

const DOCUMENT_COLUMNS: &str = "id, elder_id, uploaded_by, title, document_type, file_name, text_length, processing_status, summary, failure_reason, requires_review, reviewed_by, reviewed_at, created_at, processed_at";

fn content_aad(document_id: Uuid) -> String {
    format!("elder_documents|{document_id}|content")
}

fn row_to_document(row: &SqliteRow) -> AppResult<ElderDocument> {
    let summary: Option<String> = row.get("summary");
    let summary = summary
        .as_deref()
        .map(serde_json::from_str::<DocumentSummary>)
        .transpose()
        .map_err(|e| AppError::database(format!("Invalid stored summary: {e}")))?;

    Ok(ElderDocument {
        id: parse_id(&row.get::<String, _>("id"))?,
        elder_id: parse_id(&row.get::<String, _>("elder_id"))?,
        uploaded_by: parse_id(&row.get::<String, _>("uploaded_by"))?,
        title: row.get("title"),
        document_type: parse_stored(&row.get::<String, _>("document_type"))?,
        file_name: row.get("file_name"),
        text_length: usize::try_from(row.get::<i64, _>("text_length")).unwrap_or(0),
        processing_status: parse_stored(&row.get::<String, _>("processing_status"))?,
        summary,
        failure_reason: row.get("failure_reason"),
        requires_review: row.get::<i64, _>("requires_review") != 0,
        reviewed_by: parse_opt_id(row.get("reviewed_by"))?,
        reviewed_at: parse_opt_ts(row.get("reviewed_at"))?,
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
        processed_at: parse_opt_ts(row.get("processed_at"))?,
    })
}

impl Database {
    /// Insert a document with its content
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the insert fails.
    pub async fn create_document(&self, document: &ElderDocument, content: &str) -> AppResult<()> {
        let encrypted = self.encrypt_data(content, &content_aad(document.id))?;
        let summary = document
            .summary
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r"
            INSERT INTO elder_documents (id, elder_id, uploaded_by, title, document_type, file_name, content_encrypted, text_length, processing_status, summary, failure_reason, requires_review, reviewed_by, reviewed_at, created_at, processed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ",
        )
        .bind(document.id.to_string())
        .bind(document.elder_id.to_string())
        .bind(document.uploaded_by.to_string())
        .bind(&document.title)
        .bind(document.document_type.as_str())
        .bind(&document.file_name)
        .bind(encrypted)
        .bind(i64::try_from(document.text_length).unwrap_or(i64::MAX))
        .bind(document.processing_status.as_str())
        .bind(summary)
        .bind(&document.failure_reason)
        .bind(i64::from(document.requires_review))
        .bind(document.reviewed_by.map(|id| id.to_string()))
        .bind(document.reviewed_at.map(ts))
        .bind(ts(document.created_at))
        .bind(document.processed_at.map(ts))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to create document: {e}")))?;
        Ok(())
    }

    /// Fetch a document without its content
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_document(&self, document_id: Uuid) -> AppResult<Option<ElderDocument>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM elder_documents WHERE id = ?1"
        ))
        .bind(document_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get document: {e}")))?;
        row.as_ref().map(row_to_document).transpose()
    }

    /// Decrypted content of a document
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown document, or an error if
    /// decryption fails.
    pub async fn get_document_content(&self, document_id: Uuid) -> AppResult<String> {
        let row = sqlx::query("SELECT content_encrypted FROM elder_documents WHERE id = ?1")
            .bind(document_id.to_string())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to load document content: {e}")))?
            .ok_or_else(|| AppError::not_found("Document"))?;
        let encrypted: String = row.get("content_encrypted");
        self.decrypt_data(&encrypted, &content_aad(document_id))
    }

    /// An elder's documents, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_elder_documents(&self, elder_id: Uuid) -> AppResult<Vec<ElderDocument>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM elder_documents WHERE elder_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(elder_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list documents: {e}")))?;
        rows.iter().map(row_to_document).collect()
    }

    /// Store the outcome of a summary attempt
    ///
    /// A new summary always needs review again.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the document does not exist.
    pub async fn update_document_processing(&self, document: &ElderDocument) -> AppResult<()> {
        let summary = document
            .summary
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let result = sqlx::query(
            r"
            UPDATE elder_documents
            SET processing_status = ?1, summary = ?2, failure_reason = ?3, requires_review = ?4,
                reviewed_by = ?5, reviewed_at = ?6, processed_at = ?7
            WHERE id = ?8
            ",
        )
        .bind(document.processing_status.as_str())
        .bind(summary)
        .bind(&document.failure_reason)
        .bind(i64::from(document.requires_review))
        .bind(document.reviewed_by.map(|id| id.to_string()))
        .bind(document.reviewed_at.map(ts))
        .bind(document.processed_at.map(ts))
        .bind(document.id.to_string())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update document: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Document"));
        }
        Ok(())
    }

    /// Record that an admin checked the summary
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the document does not exist.
    pub async fn mark_document_reviewed(
        &self,
        document_id: Uuid,
        reviewer: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE elder_documents SET requires_review = 0, reviewed_by = ?1, reviewed_at = ?2 WHERE id = ?3",
        )
        .bind(reviewer.to_string())
        .bind(ts(at))
        .bind(document_id.to_string())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to review document: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Document"));
        }
        Ok(())
    }

    /// Delete a document and its content
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the document does not exist.
    pub async fn delete_document(&self, document_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM elder_documents WHERE id = ?1")
            .bind(document_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to delete document: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Document"));
        }
        Ok(())
    }
}
