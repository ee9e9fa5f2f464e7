// ABOUTME: Integration tests for agency staff, shift workflow transitions and offer cascades
// ABOUTME: Drives shifts through the HTTP API the way an agency office and its caregivers would
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

use common::{create_elder, create_test_app, signup, TestUser};
use helpers::axum_test::{AxumTestRequest, AxumTestResponse};

struct AgencySetup {
    owner: TestUser,
    caregivers: Vec<TestUser>,
    agency_id: Uuid,
    elder_id: Uuid,
}

async fn setup_agency(router: &Router, prefix: &str, caregiver_count: usize) -> AgencySetup {
    let owner = signup(router, &format!("{prefix}.office@example.com"), "Office Manager").await;
    let agency = AxumTestRequest::post("/api/agencies")
        .bearer(&owner.token)
        .json(&json!({ "name": "Brightside Home Care" }))
        .send(router.clone())
        .await;
    assert_eq!(agency.status_code(), StatusCode::CREATED);
    let agency_id: Uuid = agency.data()["id"].as_str().unwrap().parse().unwrap();

    let mut caregivers = Vec::new();
    for n in 0..caregiver_count {
        let caregiver = signup(
            router,
            &format!("{prefix}.carer{n}@example.com"),
            &format!("Carer Number {}", ["One", "Two", "Three"][n]),
        )
        .await;
        let added = AxumTestRequest::post(&format!("/api/agencies/{agency_id}/caregivers"))
            .bearer(&owner.token)
            .json(&json!({ "email": caregiver.email }))
            .send(router.clone())
            .await;
        assert_eq!(added.status_code(), StatusCode::CREATED);
        caregivers.push(caregiver);
    }

    let group = AxumTestRequest::post("/api/groups")
        .bearer(&owner.token)
        .json(&json!({ "name": "Brightside Clients", "agencyId": agency_id }))
        .send(router.clone())
        .await;
    assert_eq!(group.status_code(), StatusCode::CREATED);
    let group_id: Uuid = group.data()["group"]["id"].as_str().unwrap().parse().unwrap();
    let elder_id = create_elder(router, &owner, group_id, "Walter Price").await;

    AgencySetup {
        owner,
        caregivers,
        agency_id,
        elder_id,
    }
}

async fn create_shift(router: &Router, setup: &AgencySetup, caregiver: Option<Uuid>) -> Value {
    let response = AxumTestRequest::post(&format!("/api/agencies/{}/shifts", setup.agency_id))
        .bearer(&setup.owner.token)
        .json(&json!({
            "elderId": setup.elder_id,
            "date": Utc::now().date_naive() + Duration::days(2),
            "startTime": "09:00:00",
            "endTime": "13:00:00",
            "caregiverId": caregiver,
        }))
        .send(router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.data()
}

async fn post_action(router: &Router, user: &TestUser, uri: &str) -> AxumTestResponse {
    AxumTestRequest::post(uri)
        .bearer(&user.token)
        .send(router.clone())
        .await
}

async fn offer_statuses(router: &Router, setup: &AgencySetup, shift_id: &str) -> Vec<Value> {
    AxumTestRequest::get(&format!("/api/shifts/{shift_id}/offers"))
        .bearer(&setup.owner.token)
        .send(router.clone())
        .await
        .data()
        .as_array()
        .unwrap()
        .iter()
        .map(|offer| offer["status"].clone())
        .collect()
}

async fn inbox_types(router: &Router, user: &TestUser) -> Vec<Value> {
    AxumTestRequest::get("/api/notifications")
        .bearer(&user.token)
        .send(router.clone())
        .await
        .data()
        .as_array()
        .unwrap()
        .iter()
        .map(|notification| notification["type"].clone())
        .collect()
}

#[tokio::test]
async fn test_scheduled_shift_confirm_complete() {
    let (_resources, router) = create_test_app().await;
    let setup = setup_agency(&router, "flow", 1).await;
    let carer = &setup.caregivers[0];

    let shift = create_shift(&router, &setup, Some(carer.id)).await;
    assert_eq!(shift["status"], "scheduled");
    assert_eq!(shift["caregiverId"], carer.id.to_string());
    let shift_id = shift["id"].as_str().unwrap();
    assert!(inbox_types(&router, carer).await.contains(&json!("shift_assigned")));

    let mine = AxumTestRequest::get("/api/caregiver/shifts")
        .bearer(&carer.token)
        .send(router.clone())
        .await;
    assert_eq!(mine.data().as_array().unwrap().len(), 1);

    // Completing before anyone confirmed is not a valid transition
    let complete = format!("/api/shifts/{shift_id}/complete");
    let early = post_action(&router, &setup.owner, &complete).await;
    assert_eq!(early.status_code(), StatusCode::CONFLICT);

    let confirmed = post_action(&router, carer, &format!("/api/shifts/{shift_id}/confirm")).await;
    assert_eq!(confirmed.status_code(), StatusCode::OK);
    assert_eq!(confirmed.data()["status"], "confirmed");

    // Caregivers cannot complete or cancel shifts
    let by_carer = post_action(&router, carer, &complete).await;
    assert_eq!(by_carer.status_code(), StatusCode::FORBIDDEN);

    let completed = post_action(&router, &setup.owner, &complete).await;
    assert_eq!(completed.status_code(), StatusCode::OK);
    assert_eq!(completed.data()["status"], "completed");

    let cancel_uri = format!("/api/shifts/{shift_id}/cancel");
    let cancel = post_action(&router, &setup.owner, &cancel_uri).await;
    assert_eq!(cancel.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_owner_confirms_scheduled_shift() {
    let (_resources, router) = create_test_app().await;
    let setup = setup_agency(&router, "ownerok", 1).await;
    let carer = &setup.caregivers[0];
    let shift = create_shift(&router, &setup, Some(carer.id)).await;
    let shift_id = shift["id"].as_str().unwrap();

    let confirm_uri = format!("/api/shifts/{shift_id}/confirm");
    let confirmed = post_action(&router, &setup.owner, &confirm_uri).await;
    assert_eq!(confirmed.status_code(), StatusCode::OK);
    assert_eq!(confirmed.data()["status"], "owner_confirmed");
    assert!(inbox_types(&router, carer).await.contains(&json!("shift_confirmed")));

    let again = post_action(&router, &setup.owner, &confirm_uri).await;
    assert_eq!(again.status_code(), StatusCode::CONFLICT);

    let complete = format!("/api/shifts/{shift_id}/complete");
    let completed = post_action(&router, &setup.owner, &complete).await;
    assert_eq!(completed.status_code(), StatusCode::OK);
    assert_eq!(completed.data()["status"], "completed");
}

#[tokio::test]
async fn test_scheduled_shift_decline_reopens_shift() {
    let (_resources, router) = create_test_app().await;
    let setup = setup_agency(&router, "schedno", 1).await;
    let carer = &setup.caregivers[0];
    let shift = create_shift(&router, &setup, Some(carer.id)).await;
    let shift_id = shift["id"].as_str().unwrap();

    let declined = post_action(&router, carer, &format!("/api/shifts/{shift_id}/decline")).await;
    assert_eq!(declined.status_code(), StatusCode::OK);
    let data = declined.data();
    assert_eq!(data["status"], "open");
    assert!(data["caregiverId"].is_null());
    assert!(inbox_types(&router, &setup.owner).await.contains(&json!("shift_declined")));
}

#[tokio::test]
async fn test_create_with_non_staff_caregiver_stores_nothing() {
    let (_resources, router) = create_test_app().await;
    let setup = setup_agency(&router, "nostaff", 0).await;
    let stranger = signup(&router, "nostaff.stranger@example.com", "Robin Stranger").await;
    let shifts_uri = format!("/api/agencies/{}/shifts", setup.agency_id);

    let rejected = AxumTestRequest::post(&shifts_uri)
        .bearer(&setup.owner.token)
        .json(&json!({
            "elderId": setup.elder_id,
            "date": Utc::now().date_naive() + Duration::days(2),
            "startTime": "09:00:00",
            "endTime": "13:00:00",
            "caregiverId": stranger.id,
        }))
        .send(router.clone())
        .await;
    assert_eq!(rejected.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(rejected.error_code(), "invalid_input");

    let listed = AxumTestRequest::get(&shifts_uri)
        .bearer(&setup.owner.token)
        .send(router.clone())
        .await;
    assert_eq!(listed.status_code(), StatusCode::OK);
    assert!(listed.data()["shifts"].as_array().unwrap().is_empty());

    let far_future = AxumTestRequest::get(&format!("{shifts_uri}?from=%2B262142-12-30"))
        .bearer(&setup.owner.token)
        .send(router)
        .await;
    assert_eq!(far_future.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(far_future.error_code(), "invalid_input");
}

#[tokio::test]
async fn test_caregiver_decline_reopens_shift() {
    let (_resources, router) = create_test_app().await;
    let setup = setup_agency(&router, "reopen", 1).await;
    let carer = &setup.caregivers[0];
    let shift = create_shift(&router, &setup, None).await;
    let shift_id = shift["id"].as_str().unwrap();

    let assigned = AxumTestRequest::post(&format!("/api/shifts/{shift_id}/assign"))
        .bearer(&setup.owner.token)
        .json(&json!({ "caregiverId": carer.id }))
        .send(router.clone())
        .await;
    assert_eq!(assigned.status_code(), StatusCode::OK);

    let declined = post_action(&router, carer, &format!("/api/shifts/{shift_id}/decline")).await;
    assert_eq!(declined.status_code(), StatusCode::OK);
    let data = declined.data();
    assert_eq!(data["status"], "open");
    assert!(data["caregiverId"].is_null());
}

#[tokio::test]
async fn test_shift_validation_and_visibility() {
    let (_resources, router) = create_test_app().await;
    let setup = setup_agency(&router, "checks", 0).await;
    let outsider = signup(&router, "checks.outsider@example.com", "Pat Outsider").await;

    let backwards = AxumTestRequest::post(&format!("/api/agencies/{}/shifts", setup.agency_id))
        .bearer(&setup.owner.token)
        .json(&json!({
            "elderId": setup.elder_id,
            "date": Utc::now().date_naive(),
            "startTime": "22:00:00",
            "endTime": "06:00:00",
        }))
        .send(router.clone())
        .await;
    assert_eq!(backwards.status_code(), StatusCode::BAD_REQUEST);

    let shift = create_shift(&router, &setup, None).await;
    assert_eq!(shift["status"], "open");

    let hidden = AxumTestRequest::get(&format!("/api/shifts/{}", shift["id"].as_str().unwrap()))
        .bearer(&outsider.token)
        .send(router)
        .await;
    assert_eq!(hidden.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_offer_cascade_moves_to_next_caregiver() {
    let (_resources, router) = create_test_app().await;
    let setup = setup_agency(&router, "cascade", 2).await;
    let (first, second) = (&setup.caregivers[0], &setup.caregivers[1]);
    let shift = create_shift(&router, &setup, None).await;
    let shift_id = shift["id"].as_str().unwrap();

    let started = AxumTestRequest::post(&format!("/api/shifts/{shift_id}/offers"))
        .bearer(&setup.owner.token)
        .json(&json!({ "caregiverIds": [first.id, second.id] }))
        .send(router.clone())
        .await;
    assert_eq!(started.status_code(), StatusCode::CREATED);
    let offers = started.data();
    assert_eq!(offers[0]["status"], "pending");
    assert_eq!(offers[1]["status"], "queued");
    let first_offer = offers[0]["id"].as_str().unwrap().to_owned();
    let second_offer = offers[1]["id"].as_str().unwrap().to_owned();

    // Queued offers cannot be answered yet, and nobody answers another caregiver's offer
    let accept_uri = format!("/api/offers/{second_offer}/accept");
    let jumped = post_action(&router, second, &accept_uri).await;
    assert_ne!(jumped.status_code(), StatusCode::OK);
    let foreign = post_action(&router, second, &format!("/api/offers/{first_offer}/accept")).await;
    assert_eq!(foreign.status_code(), StatusCode::NOT_FOUND);

    let declined = post_action(&router, first, &format!("/api/offers/{first_offer}/decline")).await;
    assert_eq!(declined.status_code(), StatusCode::OK);
    let next = declined.data()["nextOffer"].clone();
    assert_eq!(next["id"], second_offer.as_str());
    assert_eq!(next["status"], "pending");

    let accepted = post_action(&router, second, &accept_uri).await;
    assert_eq!(accepted.status_code(), StatusCode::OK);
    let filled = accepted.data();
    assert_eq!(filled["status"], "confirmed");
    assert_eq!(filled["caregiverId"], second.id.to_string());

    let statuses = offer_statuses(&router, &setup, shift_id).await;
    assert_eq!(statuses, vec![json!("declined"), json!("accepted")]);
}

#[tokio::test]
async fn test_offers_require_open_shift_and_staff_candidates() {
    let (_resources, router) = create_test_app().await;
    let setup = setup_agency(&router, "offerchecks", 1).await;
    let stranger = signup(&router, "offerchecks.stranger@example.com", "Sky Stranger").await;
    let shift = create_shift(&router, &setup, None).await;
    let shift_id = shift["id"].as_str().unwrap();

    let outsider = AxumTestRequest::post(&format!("/api/shifts/{shift_id}/offers"))
        .bearer(&setup.owner.token)
        .json(&json!({ "caregiverIds": [stranger.id] }))
        .send(router.clone())
        .await;
    assert_eq!(outsider.status_code(), StatusCode::BAD_REQUEST);

    let assigned = AxumTestRequest::post(&format!("/api/shifts/{shift_id}/assign"))
        .bearer(&setup.owner.token)
        .json(&json!({ "caregiverId": setup.caregivers[0].id }))
        .send(router.clone())
        .await;
    assert_eq!(assigned.status_code(), StatusCode::OK);

    let not_open = AxumTestRequest::post(&format!("/api/shifts/{shift_id}/offers"))
        .bearer(&setup.owner.token)
        .json(&json!({ "caregiverIds": [setup.caregivers[0].id] }))
        .send(router)
        .await;
    assert_eq!(not_open.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_declining_last_offer_reports_shift_unfilled() {
    let (_resources, router) = create_test_app().await;
    let setup = setup_agency(&router, "unfilled", 1).await;
    let carer = &setup.caregivers[0];
    let shift = create_shift(&router, &setup, None).await;
    let shift_id = shift["id"].as_str().unwrap();

    let started = AxumTestRequest::post(&format!("/api/shifts/{shift_id}/offers"))
        .bearer(&setup.owner.token)
        .json(&json!({ "caregiverIds": [carer.id] }))
        .send(router.clone())
        .await;
    assert_eq!(started.status_code(), StatusCode::CREATED);
    let offer_id = started.data()[0]["id"].as_str().unwrap().to_owned();

    let declined = post_action(&router, carer, &format!("/api/offers/{offer_id}/decline")).await;
    assert_eq!(declined.status_code(), StatusCode::OK);
    assert!(declined.data()["nextOffer"].is_null());

    assert!(inbox_types(&router, &setup.owner).await.contains(&json!("shift_unfilled")));
    let reloaded = AxumTestRequest::get(&format!("/api/shifts/{shift_id}"))
        .bearer(&setup.owner.token)
        .send(router)
        .await;
    assert_eq!(reloaded.data()["status"], "open");
}

#[tokio::test]
async fn test_cancel_withdraws_live_offers() {
    let (_resources, router) = create_test_app().await;
    let setup = setup_agency(&router, "withdraw", 2).await;
    let (first, second) = (&setup.caregivers[0], &setup.caregivers[1]);
    let shift = create_shift(&router, &setup, None).await;
    let shift_id = shift["id"].as_str().unwrap();

    let started = AxumTestRequest::post(&format!("/api/shifts/{shift_id}/offers"))
        .bearer(&setup.owner.token)
        .json(&json!({ "caregiverIds": [first.id, second.id] }))
        .send(router.clone())
        .await;
    assert_eq!(started.status_code(), StatusCode::CREATED);
    let first_offer = started.data()[0]["id"].as_str().unwrap().to_owned();

    let cancel_uri = format!("/api/shifts/{shift_id}/cancel");
    let cancelled = post_action(&router, &setup.owner, &cancel_uri).await;
    assert_eq!(cancelled.status_code(), StatusCode::OK);
    assert_eq!(cancelled.data()["status"], "cancelled");

    let statuses = offer_statuses(&router, &setup, shift_id).await;
    assert_eq!(statuses, vec![json!("withdrawn"), json!("withdrawn")]);

    let late = post_action(&router, first, &format!("/api/offers/{first_offer}/accept")).await;
    assert_ne!(late.status_code(), StatusCode::OK);
}
