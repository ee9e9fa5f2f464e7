// ABOUTME: Integration tests for documents on an elder's record and their AI summaries
// ABOUTME: Uses a scripted LLM to check prompts per type, failure tracking and admin review
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Router;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{
    accept_consent, create_elder, create_group, create_test_app, create_test_resources_with,
    join_group, signup, test_config, TestLlmProvider, TestUser,
};
use helpers::axum_test::AxumTestRequest;
use myguide_server::server::build_router;

const CERTIFICATE_TEXT: &str = "Certificate of Completion. Basic Life Support (CPR and AED) \
    for Healthcare Providers. Issued by the Regional Heart Association on 2025-03-14, \
    valid until 2027-03-14. Certificate number BLS-55210.";

async fn upload(router: &Router, user: &TestUser, elder_id: Uuid, body: &Value) -> Value {
    let response = AxumTestRequest::post(&format!("/api/elders/{elder_id}/documents"))
        .bearer(&user.token)
        .json(body)
        .send(router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.data()
}

#[tokio::test]
async fn test_upload_summarize_and_review() {
    let llm = Arc::new(TestLlmProvider::with_reply(
        "BLS certificate from the Regional Heart Association, valid until 2027-03-14.",
    ));
    let resources = create_test_resources_with(test_config(), Arc::clone(&llm)).await;
    let router = build_router(Arc::clone(&resources));
    let owner = signup(&router, "greta@example.com", "Greta Lund").await;
    let (group_id, _) = create_group(&router, &owner, "Lund").await;
    let elder_id = create_elder(&router, &owner, group_id, "Arne Lund").await;

    let document = upload(
        &router,
        &owner,
        elder_id,
        &json!({
            "title": "Night carer CPR card",
            "documentType": "certification",
            "fileName": "cpr-card.pdf",
            "text": CERTIFICATE_TEXT,
        }),
    )
    .await;
    assert_eq!(document["processingStatus"], "pending");
    assert_eq!(document["requiresReview"], true);
    assert!(document["summary"].is_null());
    assert!(document.get("text").is_none());
    let document_id = document["id"].as_str().unwrap().to_owned();

    let gated = AxumTestRequest::post(&format!("/api/documents/{document_id}/summarize"))
        .bearer(&owner.token)
        .send(router.clone())
        .await;
    assert_eq!(gated.error_code(), "consent_required");
    assert_eq!(llm.calls(), 0);

    accept_consent(&router, &owner).await;
    let summarized = AxumTestRequest::post(&format!("/api/documents/{document_id}/summarize"))
        .bearer(&owner.token)
        .send(router.clone())
        .await;
    assert_eq!(summarized.status_code(), StatusCode::OK);
    let data = summarized.data();
    let stored = &data["document"];
    assert_eq!(stored["processingStatus"], "completed");
    assert_eq!(stored["requiresReview"], true);
    assert_eq!(stored["summary"]["confidence"], "high");
    assert_eq!(stored["summary"]["preview"], CERTIFICATE_TEXT);
    assert!(stored["summary"]["summary"]
        .as_str()
        .unwrap()
        .starts_with("BLS certificate"));
    assert_eq!(data["quota"]["used"], 1);
    assert_eq!(llm.calls(), 1);

    let reviewed = AxumTestRequest::post(&format!("/api/documents/{document_id}/review"))
        .bearer(&owner.token)
        .send(router.clone())
        .await;
    assert_eq!(reviewed.status_code(), StatusCode::OK);
    let reviewed = reviewed.data();
    assert_eq!(reviewed["requiresReview"], false);
    assert_eq!(reviewed["reviewedBy"], owner.id.to_string());

    let with_text = AxumTestRequest::get(&format!("/api/documents/{document_id}?includeText=true"))
        .bearer(&owner.token)
        .send(router.clone())
        .await
        .data();
    assert_eq!(with_text["text"], CERTIFICATE_TEXT);
    assert_eq!(with_text["document"]["requiresReview"], false);

    let stored_text = resources
        .database
        .get_document_content(document_id.parse().unwrap())
        .await
        .unwrap();
    assert_eq!(stored_text, CERTIFICATE_TEXT);
}

#[tokio::test]
async fn test_failed_summary_is_tracked_and_cannot_be_reviewed() {
    let llm = Arc::new(TestLlmProvider::with_reply("   "));
    let resources = create_test_resources_with(test_config(), Arc::clone(&llm)).await;
    let router = build_router(resources);
    let owner = signup(&router, "piet@example.com", "Piet Smit").await;
    accept_consent(&router, &owner).await;
    let (group_id, _) = create_group(&router, &owner, "Smit").await;
    let elder_id = create_elder(&router, &owner, group_id, "Anna Smit").await;

    let document = upload(
        &router,
        &owner,
        elder_id,
        &json!({ "title": "Passport", "documentType": "identification", "text": "P<NLD" }),
    )
    .await;
    let document_id = document["id"].as_str().unwrap().to_owned();

    let failed = AxumTestRequest::post(&format!("/api/documents/{document_id}/summarize"))
        .bearer(&owner.token)
        .send(router.clone())
        .await;
    assert_eq!(failed.status_code(), StatusCode::BAD_GATEWAY);

    let stored = AxumTestRequest::get(&format!("/api/documents/{document_id}"))
        .bearer(&owner.token)
        .send(router.clone())
        .await
        .data();
    assert_eq!(stored["processingStatus"], "failed");
    assert!(!stored["failureReason"].as_str().unwrap().is_empty());
    assert!(stored["processedAt"].is_string());

    let review = AxumTestRequest::post(&format!("/api/documents/{document_id}/review"))
        .bearer(&owner.token)
        .send(router)
        .await;
    assert_eq!(review.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_upload_validation_and_access() {
    let (_resources, router) = create_test_app().await;
    let owner = signup(&router, "rosa@example.com", "Rosa Marin").await;
    let reader = signup(&router, "tomas@example.com", "Tomas Marin").await;
    let outsider = signup(&router, "quinn@example.com", "Quinn Outsider").await;
    let (group_id, invite) = create_group(&router, &owner, "Marin").await;
    join_group(&router, &reader, &invite).await;
    let elder_id = create_elder(&router, &owner, group_id, "Lucia Marin").await;
    let uri = format!("/api/elders/{elder_id}/documents");

    for body in [
        json!({ "title": "Scan", "documentType": "other", "fileName": "scan.docx", "text": "x" }),
        json!({ "title": " ", "documentType": "other", "text": "Discharge note" }),
        json!({ "title": "Blank", "documentType": "medical_record", "text": "  " }),
        json!({ "title": "Odd", "documentType": "x-ray", "text": "Film" }),
    ] {
        let rejected = AxumTestRequest::post(&uri)
            .bearer(&owner.token)
            .json(&body)
            .send(router.clone())
            .await;
        assert_eq!(rejected.status_code(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(rejected.error_code(), "invalid_input");
    }

    let body = json!({
        "title": "Hospital discharge letter",
        "documentType": "medical_record",
        "fileName": "discharge.png",
        "text": "Discharged after a fall; physiotherapy twice weekly.",
    });
    let by_reader = AxumTestRequest::post(&uri)
        .bearer(&reader.token)
        .json(&body)
        .send(router.clone())
        .await;
    assert_eq!(by_reader.status_code(), StatusCode::FORBIDDEN);

    let document = upload(&router, &owner, elder_id, &body).await;
    let document_id = document["id"].as_str().unwrap().to_owned();

    let listed = AxumTestRequest::get(&uri)
        .bearer(&reader.token)
        .send(router.clone())
        .await;
    assert_eq!(listed.data().as_array().unwrap().len(), 1);

    let hidden = AxumTestRequest::get(&format!("/api/documents/{document_id}"))
        .bearer(&outsider.token)
        .send(router.clone())
        .await;
    assert_eq!(hidden.status_code(), StatusCode::NOT_FOUND);

    let reader_delete = AxumTestRequest::delete(&format!("/api/documents/{document_id}"))
        .bearer(&reader.token)
        .send(router.clone())
        .await;
    assert_eq!(reader_delete.status_code(), StatusCode::FORBIDDEN);

    let deleted = AxumTestRequest::delete(&format!("/api/documents/{document_id}"))
        .bearer(&owner.token)
        .send(router.clone())
        .await;
    assert_eq!(deleted.status_code(), StatusCode::OK);

    let gone = AxumTestRequest::get(&format!("/api/documents/{document_id}"))
        .bearer(&owner.token)
        .send(router)
        .await;
    assert_eq!(gone.status_code(), StatusCode::NOT_FOUND);
}
