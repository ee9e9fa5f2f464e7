// ABOUTME: Integration tests for consent-gated insights: medication checks, AI chat and diet analysis
// ABOUTME: Uses a scripted LLM so quota accounting and stored analyses can be asserted
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use common::{
    accept_consent, create_elder, create_group, create_test_app, create_test_resources_with,
    seed_label, signup, test_config, TestLlmProvider,
};
use helpers::axum_test::AxumTestRequest;
use myguide_server::server::build_router;

#[tokio::test]
async fn test_consent_lifecycle() {
    let (_resources, router) = create_test_app().await;
    let user = signup(&router, "maya@example.com", "Maya Stein").await;

    let initial = AxumTestRequest::get("/api/consent")
        .bearer(&user.token)
        .send(router.clone())
        .await;
    assert_eq!(initial.status_code(), StatusCode::OK);
    assert_eq!(initial.data()["state"], "missing");

    // Skimmed too quickly and one flag missing
    let rushed = AxumTestRequest::post("/api/consent")
        .bearer(&user.token)
        .json(&json!({
            "termsAccepted": true,
            "medicalDisclaimerAccepted": true,
            "dataUsageAccepted": false,
            "limitationsAcknowledged": true,
            "readTimeSeconds": 3,
        }))
        .send(router.clone())
        .await;
    assert_eq!(rushed.status_code(), StatusCode::BAD_REQUEST);

    accept_consent(&router, &user).await;
    let active = AxumTestRequest::get("/api/consent")
        .bearer(&user.token)
        .send(router.clone())
        .await;
    let status = active.data();
    assert_eq!(status["state"], "active");
    assert_eq!(status["valid"], true);

    let revoked = AxumTestRequest::delete("/api/consent")
        .bearer(&user.token)
        .send(router.clone())
        .await;
    assert_eq!(revoked.status_code(), StatusCode::OK);
    let data = revoked.data();
    assert_eq!(data["status"]["valid"], false);

    let gated = AxumTestRequest::post("/api/ai/chat")
        .bearer(&user.token)
        .json(&json!({ "message": "Is it fine to take paracetamol with tea?" }))
        .send(router)
        .await;
    assert_eq!(gated.error_code(), "consent_required");
}

#[tokio::test]
async fn test_medication_check_requires_consent() {
    let (resources, router) = create_test_app().await;
    seed_label(
        &resources.database,
        "Simvastatin",
        "simvastatin",
        "Avoid clarithromycin; it raises simvastatin levels.",
    )
    .await;
    seed_label(&resources.database, "Clarithromycin", "clarithromycin", "None known.").await;
    let user = signup(&router, "oskar@example.com", "Oskar Nilsson").await;
    let body = json!({ "medications": ["Simvastatin", "clarithromycin"] });

    let anonymous = AxumTestRequest::post("/api/medication/check")
        .json(&body)
        .send(router.clone())
        .await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);

    let without_consent = AxumTestRequest::post("/api/medication/check")
        .bearer(&user.token)
        .json(&body)
        .send(router.clone())
        .await;
    assert_eq!(without_consent.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(without_consent.error_code(), "consent_required");

    accept_consent(&router, &user).await;
    let checked = AxumTestRequest::post("/api/medication/check")
        .bearer(&user.token)
        .json(&body)
        .send(router.clone())
        .await;
    assert_eq!(checked.status_code(), StatusCode::OK);
    let report = checked.data();
    assert_eq!(report["status"], "review_recommended");
    assert_eq!(report["flags"][0]["medication"], "Simvastatin");

    let empty = AxumTestRequest::post("/api/medication/check")
        .bearer(&user.token)
        .json(&json!({ "medications": ["  "] }))
        .send(router)
        .await;
    assert_eq!(empty.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_medication_check_accepts_detailed_medications() {
    let (resources, router) = create_test_app().await;
    seed_label(
        &resources.database,
        "Warfarin",
        "warfarin",
        "Aspirin increases the risk of bleeding with warfarin.",
    )
    .await;
    seed_label(&resources.database, "Aspirin", "aspirin", "None known.").await;
    let user = signup(&router, "ines@example.com", "Ines Duarte").await;
    accept_consent(&router, &user).await;

    let checked = AxumTestRequest::post("/api/medication/check")
        .bearer(&user.token)
        .json(&json!({
            "medications": [
                {
                    "name": "Warfarin",
                    "dosage": "5mg",
                    "frequency": "daily",
                    "prescribedFor": "atrial fibrillation",
                },
                { "name": "Aspirin", "dosage": "81mg", "frequency": "daily" },
            ],
            "userAge": 82,
            "healthConditions": ["atrial fibrillation"],
        }))
        .send(router)
        .await;
    assert_eq!(checked.status_code(), StatusCode::OK);
    let report = checked.data();
    assert_eq!(report["status"], "review_recommended");
    assert_eq!(report["flags"][0]["medication"], "Warfarin");
    let summary = report["summary"].as_str().unwrap();
    assert_eq!(
        summary,
        "Found 1 label co-mention across 2 medications. \
         Review them with a pharmacist or prescriber."
    );
}

#[tokio::test]
async fn test_ai_chat_counts_against_daily_quota() {
    let llm = Arc::new(TestLlmProvider::with_reply("Tea is fine, but ask the pharmacist."));
    let resources = create_test_resources_with(test_config(), Arc::clone(&llm)).await;
    let router = build_router(Arc::clone(&resources));
    let user = signup(&router, "ella@example.com", "Ella Brooks").await;
    accept_consent(&router, &user).await;

    let first = AxumTestRequest::post("/api/ai/chat")
        .bearer(&user.token)
        .json(&json!({ "message": "Can she take paracetamol with tea?" }))
        .send(router.clone())
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);
    let answer = first.data();
    assert_eq!(answer["reply"], "Tea is fine, but ask the pharmacist.");
    assert!(!answer["disclaimer"].as_str().unwrap().is_empty());
    assert_eq!(answer["quota"]["tier"], "family");
    assert_eq!(answer["quota"]["limit"], 25);
    assert_eq!(answer["quota"]["remaining"], 24);

    for _ in 1..25 {
        let response = AxumTestRequest::post("/api/ai/chat")
            .bearer(&user.token)
            .json(&json!({ "message": "And with coffee?" }))
            .send(router.clone())
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    let over = AxumTestRequest::post("/api/ai/chat")
        .bearer(&user.token)
        .json(&json!({ "message": "One more?" }))
        .send(router)
        .await;
    assert_eq!(over.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert!(over.header("retry-after").is_some());
    assert_eq!(llm.calls(), 25);
}

#[tokio::test]
async fn test_diet_analysis_stores_estimate() {
    let llm = Arc::new(TestLlmProvider::default());
    let resources = create_test_resources_with(test_config(), Arc::clone(&llm)).await;
    let router = build_router(Arc::clone(&resources));
    let owner = signup(&router, "jonas@example.com", "Jonas Weber").await;
    let (group_id, _) = create_group(&router, &owner, "Weber").await;
    let elder_id = create_elder(&router, &owner, group_id, "Ilse Weber").await;

    let entry = AxumTestRequest::post(&format!("/api/elders/{elder_id}/diet"))
        .bearer(&owner.token)
        .json(&json!({ "mealType": "lunch", "description": "Lentil soup with rye bread" }))
        .send(router.clone())
        .await;
    assert_eq!(entry.status_code(), StatusCode::CREATED);
    let entry_id = entry.data()["id"].as_str().unwrap().to_owned();

    let gated = AxumTestRequest::post(&format!("/api/diet/{entry_id}/analyze"))
        .bearer(&owner.token)
        .send(router.clone())
        .await;
    assert_eq!(gated.error_code(), "consent_required");
    assert_eq!(llm.calls(), 0);

    accept_consent(&router, &owner).await;
    let analyzed = AxumTestRequest::post(&format!("/api/diet/{entry_id}/analyze"))
        .bearer(&owner.token)
        .send(router.clone())
        .await;
    assert_eq!(analyzed.status_code(), StatusCode::OK);
    assert_eq!(
        analyzed.data()["entry"]["analysis"]["calories"].as_f64(),
        Some(520.0)
    );
    assert_eq!(llm.calls(), 1);

    let listed = AxumTestRequest::get(&format!("/api/elders/{elder_id}/diet"))
        .bearer(&owner.token)
        .send(router.clone())
        .await;
    let data = listed.data();
    assert_eq!(data["entries"][0]["analysis"]["calories"].as_f64(), Some(520.0));

    let summary = AxumTestRequest::get(&format!("/api/elders/{elder_id}/diet/summary"))
        .bearer(&owner.token)
        .send(router)
        .await;
    assert_eq!(summary.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_diet_entry_cannot_be_in_the_future() {
    let (_resources, router) = create_test_app().await;
    let owner = signup(&router, "lucia@example.com", "Lucia Romano").await;
    let (group_id, _) = create_group(&router, &owner, "Romano").await;
    let elder_id = create_elder(&router, &owner, group_id, "Gino Romano").await;

    let response = AxumTestRequest::post(&format!("/api/elders/{elder_id}/diet"))
        .bearer(&owner.token)
        .json(&json!({
            "mealType": "dinner",
            "description": "Risotto",
            "eatenAt": chrono::Utc::now() + chrono::Duration::hours(3),
        }))
        .send(router)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_drug_label_served_from_cache() {
    let (resources, router) = create_test_app().await;
    seed_label(&resources.database, "Eliquis", "apixaban", "Avoid with aspirin.").await;
    let user = signup(&router, "tariq@example.com", "Tariq Aziz").await;

    let response = AxumTestRequest::get("/api/drug-labels/ELIQUIS")
        .bearer(&user.token)
        .send(router)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.data()["genericName"], "apixaban");
}
