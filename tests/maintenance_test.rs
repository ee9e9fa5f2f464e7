// ABOUTME: Tests for the periodic maintenance pass
// ABOUTME: Drives run_once with a shifted clock over account purges, reminders and offer expiry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use axum::http::StatusCode;
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use common::{accept_consent, create_elder, create_test_app, signup, TestUser};
use helpers::axum_test::AxumTestRequest;

async fn offer_statuses(router: &Router, owner: &TestUser, shift_id: &str) -> Vec<Value> {
    AxumTestRequest::get(&format!("/api/shifts/{shift_id}/offers"))
        .bearer(&owner.token)
        .send(router.clone())
        .await
        .data()
        .as_array()
        .unwrap()
        .iter()
        .map(|offer| offer["status"].clone())
        .collect()
}

#[tokio::test]
async fn test_purges_accounts_after_grace_period() {
    let (resources, router) = create_test_app().await;
    let leaving = signup(&router, "olga@example.com", "Olga Petrova").await;
    let staying = signup(&router, "ivo@example.com", "Ivo Petrov").await;

    let requested = AxumTestRequest::post("/api/account/deletion")
        .bearer(&leaving.token)
        .send(router.clone())
        .await;
    assert_eq!(requested.status_code(), StatusCode::CREATED);

    let scheduler = resources.maintenance_scheduler();

    // Still inside the grace period
    let early = scheduler.run_once(Utc::now() + Duration::days(29)).await;
    assert_eq!(early.accounts_purged, 0);
    assert!(resources.database.get_user(leaving.id).await.unwrap().is_some());

    let due = scheduler.run_once(Utc::now() + Duration::days(31)).await;
    assert_eq!(due.accounts_purged, 1);
    assert!(resources.database.get_user(leaving.id).await.unwrap().is_none());
    assert!(resources.database.get_user(staying.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_consent_reminder_is_sent_once() {
    let (resources, router) = create_test_app().await;
    let user = signup(&router, "nina@example.com", "Nina Berg").await;
    accept_consent(&router, &user).await;

    let scheduler = resources.maintenance_scheduler();
    assert_eq!(scheduler.run_once(Utc::now()).await.consent_reminders, 0);

    let near_expiry = Utc::now() + Duration::days(85);
    assert_eq!(scheduler.run_once(near_expiry).await.consent_reminders, 1);
    assert_eq!(scheduler.run_once(near_expiry).await.consent_reminders, 0);

    let inbox = AxumTestRequest::get("/api/notifications")
        .bearer(&user.token)
        .send(router)
        .await
        .data();
    assert_eq!(inbox[0]["type"], "consent_expiring");
}

#[tokio::test]
async fn test_lapsed_offer_moves_cascade_then_reports_unfilled() {
    let (resources, router) = create_test_app().await;
    let owner = signup(&router, "lena.office@example.com", "Lena Office").await;
    let agency = AxumTestRequest::post("/api/agencies")
        .bearer(&owner.token)
        .json(&json!({ "name": "Harbor Care" }))
        .send(router.clone())
        .await;
    let agency_id: Uuid = agency.data()["id"].as_str().unwrap().parse().unwrap();

    let mut carers = Vec::new();
    for (email, name) in [
        ("tom.carer@example.com", "Tom Carer"),
        ("una.carer@example.com", "Una Carer"),
    ] {
        let carer = signup(&router, email, name).await;
        let added = AxumTestRequest::post(&format!("/api/agencies/{agency_id}/caregivers"))
            .bearer(&owner.token)
            .json(&json!({ "email": email }))
            .send(router.clone())
            .await;
        assert_eq!(added.status_code(), StatusCode::CREATED);
        carers.push(carer);
    }

    let group = AxumTestRequest::post("/api/groups")
        .bearer(&owner.token)
        .json(&json!({ "name": "Harbor Clients", "agencyId": agency_id }))
        .send(router.clone())
        .await;
    let group_id: Uuid = group.data()["group"]["id"].as_str().unwrap().parse().unwrap();
    let elder_id = create_elder(&router, &owner, group_id, "Edith Marsh").await;

    let shift = AxumTestRequest::post(&format!("/api/agencies/{agency_id}/shifts"))
        .bearer(&owner.token)
        .json(&json!({
            "elderId": elder_id,
            "date": Utc::now().date_naive() + Duration::days(3),
            "startTime": "08:00:00",
            "endTime": "12:00:00",
        }))
        .send(router.clone())
        .await
        .data();
    let shift_id = shift["id"].as_str().unwrap();

    let started = AxumTestRequest::post(&format!("/api/shifts/{shift_id}/offers"))
        .bearer(&owner.token)
        .json(&json!({ "caregiverIds": [carers[0].id, carers[1].id] }))
        .send(router.clone())
        .await;
    assert_eq!(started.status_code(), StatusCode::CREATED);

    let scheduler = resources.maintenance_scheduler();
    let window = Duration::minutes(resources.config.care.offer_window_minutes);

    assert_eq!(scheduler.run_once(Utc::now()).await.offers_expired, 0);

    let first_lapse = Utc::now() + window + Duration::minutes(1);
    assert_eq!(scheduler.run_once(first_lapse).await.offers_expired, 1);
    assert_eq!(
        offer_statuses(&router, &owner, shift_id).await,
        vec![json!("expired"), json!("pending")]
    );

    let inbox = AxumTestRequest::get("/api/notifications")
        .bearer(&carers[1].token)
        .send(router.clone())
        .await
        .data();
    assert!(inbox
        .as_array()
        .unwrap()
        .iter()
        .any(|notification| notification["type"] == "shift_offer"));

    let second_lapse = first_lapse + window + Duration::minutes(1);
    assert_eq!(scheduler.run_once(second_lapse).await.offers_expired, 1);
    assert_eq!(
        offer_statuses(&router, &owner, shift_id).await,
        vec![json!("expired"), json!("expired")]
    );

    let owner_inbox = AxumTestRequest::get("/api/notifications")
        .bearer(&owner.token)
        .send(router)
        .await
        .data();
    let types: Vec<&Value> = owner_inbox
        .as_array()
        .unwrap()
        .iter()
        .map(|notification| &notification["type"])
        .collect();
    assert!(types.contains(&&json!("shift_unfilled")));
}
