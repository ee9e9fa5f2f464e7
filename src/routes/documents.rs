// ABOUTME: Document route handlers for an elder's record: upload, listing, AI summaries and review
// ABOUTME: Summaries are consent-gated, use AI quota and stay flagged until an admin reviews them
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::care::documents;
use crate::care::permissions::AccessLevel;
use crate::constants::documents::MAX_TEXT_CHARS;
use crate::constants::limits::MAX_NAME_LENGTH;
use crate::constants::messages::AI_DISCLAIMER;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::external::{ChatMessage, ChatRequest};
use crate::models::{DocumentType, ElderDocument, Group, ProcessingStatus};
use crate::routes::extract::{Json, Path, Query};
use crate::routes::insights::{consume_ai_quota, require_consent};
use crate::routes::{authenticate, created, elder_access, ok};
use crate::server::ServerResources;
use crate::validation::sanitize_text;

/// New document
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUploadRequest {
    /// Short title
    pub title: String,
    /// Document kind
    pub document_type: DocumentType,
    /// Original file name
    #[serde(default)]
    pub file_name: Option<String>,
    /// Text extracted from the file
    pub text: String,
}

/// Options for fetching one document
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentQuery {
    /// Include the full text
    #[serde(default)]
    pub include_text: bool,
}

/// Document routes
pub struct DocumentRoutes;

impl DocumentRoutes {
    /// Create all document routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/elders/:elder_id/documents",
                get(Self::handle_list).post(Self::handle_upload),
            )
            .route(
                "/api/documents/:document_id",
                get(Self::handle_get).delete(Self::handle_delete),
            )
            .route(
                "/api/documents/:document_id/summarize",
                post(Self::handle_summarize),
            )
            .route("/api/documents/:document_id/review", post(Self::handle_review))
            .with_state(resources)
    }

    /// Load a document the caller may access at `needed`
    ///
    /// Callers without access see `ResourceNotFound`.
    async fn document_access(
        resources: &ServerResources,
        user_id: Uuid,
        document_id: Uuid,
        needed: AccessLevel,
    ) -> AppResult<(ElderDocument, Group)> {
        let document = resources
            .database
            .get_document(document_id)
            .await?
            .ok_or_else(|| AppError::not_found("Document"))?;
        let (_, group, _) = elder_access(resources, user_id, document.elder_id, needed)
            .await
            .map_err(|e| {
                if e.code == ErrorCode::ResourceNotFound {
                    AppError::not_found("Document")
                } else {
                    e
                }
            })?;
        Ok((document, group))
    }

    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (elder, _, _) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Read).await?;
        let documents = resources.database.list_elder_documents(elder.id).await?;
        Ok(ok(documents))
    }

    #[instrument(skip(resources, headers, request), fields(route = "upload_document"))]
    async fn handle_upload(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
        Json(request): Json<DocumentUploadRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (elder, _, _) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Write).await?;

        let title = sanitize_text(&request.title, MAX_NAME_LENGTH);
        if title.is_empty() {
            return Err(AppError::invalid_input("title is required"));
        }
        let file_name = request
            .file_name
            .as_deref()
            .map(|name| sanitize_text(name, MAX_NAME_LENGTH))
            .filter(|name| !name.is_empty());
        if let Some(name) = &file_name {
            documents::check_file_name(name)?;
        }
        let text = sanitize_text(&request.text, MAX_TEXT_CHARS + 1);
        if text.is_empty() {
            return Err(AppError::invalid_input(
                "text is required; no text could be extracted from the document",
            ));
        }
        let text_length = text.chars().count();
        if text_length > MAX_TEXT_CHARS {
            return Err(AppError::invalid_input(format!(
                "Document text may be at most {MAX_TEXT_CHARS} characters"
            )));
        }

        let document = ElderDocument {
            id: Uuid::new_v4(),
            elder_id: elder.id,
            uploaded_by: auth.user_id,
            title,
            document_type: request.document_type,
            file_name,
            text_length,
            processing_status: ProcessingStatus::Pending,
            summary: None,
            failure_reason: None,
            requires_review: true,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
            processed_at: None,
        };
        resources.database.create_document(&document, &text).await?;
        info!(
            document_id = %document.id,
            document_type = %document.document_type,
            "Document uploaded"
        );
        Ok(created(document))
    }

    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(document_id): Path<Uuid>,
        Query(query): Query<DocumentQuery>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (document, _) =
            Self::document_access(&resources, auth.user_id, document_id, AccessLevel::Read)
                .await?;
        if !query.include_text {
            return Ok(ok(document));
        }
        let text = resources.database.get_document_content(document.id).await?;
        Ok(ok(json!({ "document": document, "text": text })))
    }

    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(document_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (document, _) =
            Self::document_access(&resources, auth.user_id, document_id, AccessLevel::Write)
                .await?;
        resources.database.delete_document(document.id).await?;
        info!(document_id = %document.id, "Document deleted");
        Ok(ok(json!({ "deleted": document.id })))
    }

    #[instrument(skip(resources, headers), fields(route = "summarize_document"))]
    async fn handle_summarize(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(document_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (mut document, group) =
            Self::document_access(&resources, auth.user_id, document_id, AccessLevel::Write)
                .await?;

        let now = Utc::now();
        require_consent(&resources, auth.user_id, now).await?;
        let quota = consume_ai_quota(&resources, auth.user_id, group.subscription_tier, now).await?;

        let text = resources.database.get_document_content(document.id).await?;
        let prompt = documents::summary_prompt(document.document_type, &text);
        let outcome = resources
            .llm
            .complete(&ChatRequest::new(vec![ChatMessage::user(prompt)]).with_temperature(0.2))
            .await
            .and_then(|response| documents::summarize(&response.content, &text, now));

        document.processed_at = Some(now);
        document.requires_review = true;
        document.reviewed_by = None;
        document.reviewed_at = None;
        match outcome {
            Ok(summary) => {
                document.processing_status = ProcessingStatus::Completed;
                document.summary = Some(summary);
                document.failure_reason = None;
                resources
                    .database
                    .update_document_processing(&document)
                    .await?;
                info!(document_id = %document.id, "Document summarized");
                Ok(ok(json!({
                    "document": document,
                    "quota": quota,
                    "disclaimer": AI_DISCLAIMER,
                })))
            }
            Err(e) => {
                warn!(document_id = %document.id, error = %e, "Document summary failed");
                document.processing_status = ProcessingStatus::Failed;
                document.failure_reason = Some(e.message.clone());
                resources
                    .database
                    .update_document_processing(&document)
                    .await?;
                Err(e)
            }
        }
    }

    async fn handle_review(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(document_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (mut document, _) =
            Self::document_access(&resources, auth.user_id, document_id, AccessLevel::Admin)
                .await?;
        if document.processing_status != ProcessingStatus::Completed {
            return Err(AppError::invalid_state(
                "Only a summarized document can be reviewed",
            ));
        }

        let now = Utc::now();
        resources
            .database
            .mark_document_reviewed(document.id, auth.user_id, now)
            .await?;
        document.requires_review = false;
        document.reviewed_by = Some(auth.user_id);
        document.reviewed_at = Some(now);
        info!(document_id = %document.id, "Document summary reviewed");
        Ok(ok(document))
    }
}
