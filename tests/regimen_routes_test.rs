// ABOUTME: Integration tests for medication regimens, dose logging, due tasks and compliance
// ABOUTME: Also covers label-based interaction checks against a seeded label cache
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use axum::http::StatusCode;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde_json::{json, Value};

use common::{add_medication, create_elder, create_group, create_test_app, seed_label, signup};
use helpers::axum_test::AxumTestRequest;

/// UTC instant of a dose at `time` on the day `days_ago` before today (elders here live in UTC)
fn dose_at(days_ago: i64, time: &str) -> DateTime<Utc> {
    let day = Utc::now().date_naive() - Duration::days(days_ago);
    let time: NaiveTime = time.parse().unwrap();
    day.and_time(time).and_utc()
}

#[tokio::test]
async fn test_due_tasks_list_each_unlogged_dose_today() {
    let (_resources, router) = create_test_app().await;
    let owner = signup(&router, "hana@example.com", "Hana Kim").await;
    let (group_id, _) = create_group(&router, &owner, "Kim").await;
    let elder_id = create_elder(&router, &owner, group_id, "Soon-ja Kim").await;
    let times = ["08:00:00", "20:00:00"];
    let item = add_medication(&router, &owner, elder_id, "Metformin", &times).await;

    let response = AxumTestRequest::get(&format!("/api/elders/{elder_id}/tasks"))
        .bearer(&owner.token)
        .send(router)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let data = response.data();
    let tasks = data["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|task| task["itemId"] == item["id"]));
    assert!(tasks.iter().all(|task| task["dosage"] == "10 mg"));
}

#[tokio::test]
async fn test_late_dose_is_stored_as_late() {
    let (_resources, router) = create_test_app().await;
    let owner = signup(&router, "raj@example.com", "Raj Mehta").await;
    let (group_id, _) = create_group(&router, &owner, "Mehta").await;
    let elder_id = create_elder(&router, &owner, group_id, "Asha Mehta").await;
    let item = add_medication(&router, &owner, elder_id, "Lisinopril", &["08:00:00"]).await;
    let item_id = item["id"].as_str().unwrap();

    let logged = AxumTestRequest::post(&format!("/api/regimen/{item_id}/logs"))
        .bearer(&owner.token)
        .json(&json!({ "scheduledFor": dose_at(1, "08:00:00"), "status": "taken" }))
        .send(router.clone())
        .await;
    assert_eq!(logged.status_code(), StatusCode::CREATED);
    assert_eq!(logged.data()["status"], "late");

    // Logging the same dose again replaces the earlier entry
    let skipped = AxumTestRequest::post(&format!("/api/regimen/{item_id}/logs"))
        .bearer(&owner.token)
        .json(&json!({
            "scheduledFor": dose_at(1, "08:00:00"),
            "status": "skipped",
            "notes": "Nausea",
        }))
        .send(router.clone())
        .await;
    assert_eq!(skipped.status_code(), StatusCode::CREATED);

    let logs = AxumTestRequest::get(&format!("/api/elders/{elder_id}/logs"))
        .bearer(&owner.token)
        .send(router)
        .await;
    assert_eq!(logs.status_code(), StatusCode::OK);
    let data = logs.data();
    let entries = data["logs"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "skipped");
    assert_eq!(entries[0]["notes"], "Nausea");
}

#[tokio::test]
async fn test_dose_log_must_match_a_scheduled_instant() {
    let (_resources, router) = create_test_app().await;
    let owner = signup(&router, "ana@example.com", "Ana Ruiz").await;
    let (group_id, _) = create_group(&router, &owner, "Ruiz").await;
    let elder_id = create_elder(&router, &owner, group_id, "Pilar Ruiz").await;
    let item = add_medication(&router, &owner, elder_id, "Atorvastatin", &["21:00:00"]).await;
    let item_id = item["id"].as_str().unwrap();

    let off_schedule = AxumTestRequest::post(&format!("/api/regimen/{item_id}/logs"))
        .bearer(&owner.token)
        .json(&json!({ "scheduledFor": dose_at(1, "09:15:00"), "status": "taken" }))
        .send(router.clone())
        .await;
    assert_eq!(off_schedule.status_code(), StatusCode::BAD_REQUEST);

    // Tomorrow's dose can be skipped ahead of time but not taken
    let early = AxumTestRequest::post(&format!("/api/regimen/{item_id}/logs"))
        .bearer(&owner.token)
        .json(&json!({ "scheduledFor": dose_at(-1, "21:00:00"), "status": "taken" }))
        .send(router.clone())
        .await;
    assert_eq!(early.status_code(), StatusCode::BAD_REQUEST);

    let skipped_ahead = AxumTestRequest::post(&format!("/api/regimen/{item_id}/logs"))
        .bearer(&owner.token)
        .json(&json!({ "scheduledFor": dose_at(-1, "21:00:00"), "status": "skipped" }))
        .send(router)
        .await;
    assert_eq!(skipped_ahead.status_code(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_compliance_counts_logged_and_missed_doses() {
    let (_resources, router) = create_test_app().await;
    let owner = signup(&router, "eva@example.com", "Eva Lind").await;
    let (group_id, _) = create_group(&router, &owner, "Lind").await;
    let elder_id = create_elder(&router, &owner, group_id, "Britt Lind").await;
    let item = add_medication(&router, &owner, elder_id, "Levothyroxine", &["07:00:00"]).await;
    let item_id = item["id"].as_str().unwrap();

    for (days_ago, status) in [(1, "taken"), (2, "skipped")] {
        let response = AxumTestRequest::post(&format!("/api/regimen/{item_id}/logs"))
            .bearer(&owner.token)
            .json(&json!({ "scheduledFor": dose_at(days_ago, "07:00:00"), "status": status }))
            .send(router.clone())
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }

    let response = AxumTestRequest::get(&format!("/api/elders/{elder_id}/compliance?days=7"))
        .bearer(&owner.token)
        .send(router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let report = response.data();
    let overall = &report["overall"];
    assert_eq!(overall["expected"], 7);
    assert_eq!(overall["late"], 1);
    assert_eq!(overall["skipped"], 1);
    assert_eq!(report["daily"].as_array().unwrap().len(), 7);

    // Four earlier days passed with no log at all
    let missed = overall["missed"].as_u64().unwrap();
    let pending = overall["pending"].as_u64().unwrap();
    assert_eq!(missed + pending, 5);
    assert!(missed >= 4);

    let too_long = AxumTestRequest::get(&format!("/api/elders/{elder_id}/compliance?days=91"))
        .bearer(&owner.token)
        .send(router)
        .await;
    assert_eq!(too_long.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_interactions_flag_label_co_mentions() {
    let (resources, router) = create_test_app().await;
    seed_label(
        &resources.database,
        "Warfarin",
        "warfarin sodium",
        "Aspirin and other NSAIDs increase the risk of bleeding.",
    )
    .await;
    seed_label(&resources.database, "Aspirin", "acetylsalicylic acid", "None known.").await;

    let owner = signup(&router, "nora@example.com", "Nora Quinn").await;
    let (group_id, _) = create_group(&router, &owner, "Quinn").await;
    let elder_id = create_elder(&router, &owner, group_id, "Declan Quinn").await;
    add_medication(&router, &owner, elder_id, "Warfarin", &["18:00:00"]).await;
    add_medication(&router, &owner, elder_id, "Aspirin", &["08:00:00"]).await;
    add_medication(&router, &owner, elder_id, "Obscurazine", &["08:00:00"]).await;

    let response = AxumTestRequest::get(&format!("/api/elders/{elder_id}/interactions"))
        .bearer(&owner.token)
        .send(router)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let report: Value = response.data();
    assert_eq!(report["status"], "review_recommended");
    assert_eq!(report["labelsUnavailable"], json!(["Obscurazine"]));

    let flags = report["flags"].as_array().unwrap();
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0]["medication"], "Warfarin");
    assert_eq!(flags[0]["mentioned"], "Aspirin");
    assert!(flags[0]["excerpt"].as_str().unwrap().contains("Aspirin"));
    assert!(!report["disclaimer"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_allergy_conflict_is_reported() {
    let (resources, router) = create_test_app().await;
    seed_label(&resources.database, "Amoxil", "amoxicillin", "None known.").await;

    let owner = signup(&router, "liam@example.com", "Liam Byrne").await;
    let (group_id, _) = create_group(&router, &owner, "Byrne").await;
    let elder_id = create_elder(&router, &owner, group_id, "Maeve Byrne").await;
    let allergy = AxumTestRequest::post(&format!("/api/elders/{elder_id}/allergies"))
        .bearer(&owner.token)
        .json(&json!({ "allergen": "Amoxicillin", "severity": "severe" }))
        .send(router.clone())
        .await;
    assert_eq!(allergy.status_code(), StatusCode::CREATED);
    add_medication(&router, &owner, elder_id, "Amoxil", &["08:00:00"]).await;

    let response = AxumTestRequest::get(&format!("/api/elders/{elder_id}/interactions"))
        .bearer(&owner.token)
        .send(router)
        .await;
    let report = response.data();
    let conflicts = report["allergyConflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["medication"], "Amoxil");
    assert_eq!(conflicts[0]["severity"], "severe");
    assert_eq!(report["status"], "review_recommended");
}

#[tokio::test]
async fn test_log_window_rejects_unsupported_dates() {
    let (_resources, router) = create_test_app().await;
    let owner = signup(&router, "far@example.com", "Farid Haddad").await;
    let (group_id, _) = create_group(&router, &owner, "Haddad").await;
    let elder_id = create_elder(&router, &owner, group_id, "Samira Haddad").await;

    let far_future = AxumTestRequest::get(&format!(
        "/api/elders/{elder_id}/logs?from=%2B262142-12-30&to=%2B262142-12-31"
    ))
    .bearer(&owner.token)
    .send(router.clone())
    .await;
    assert_eq!(far_future.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(far_future.error_code(), "invalid_input");

    let far_past = AxumTestRequest::get(&format!("/api/elders/{elder_id}/diet?to=1066-10-14"))
        .bearer(&owner.token)
        .send(router.clone())
        .await;
    assert_eq!(far_past.status_code(), StatusCode::BAD_REQUEST);

    let ordinary = AxumTestRequest::get(&format!("/api/elders/{elder_id}/logs"))
        .bearer(&owner.token)
        .send(router)
        .await;
    assert_eq!(ordinary.status_code(), StatusCode::OK);
}
