// ABOUTME: Integration tests for signup, login, session and password routes
// ABOUTME: Covers validation errors, credential failures, cookies and the auth rate limit
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{
    create_test_app, create_test_resources_with, signup, test_config, TestLlmProvider,
    TEST_PASSWORD,
};
use helpers::axum_test::AxumTestRequest;
use myguide_server::server::build_router;

#[tokio::test]
async fn test_signup_returns_token_and_sets_cookie() {
    let (_resources, router) = create_test_app().await;

    let response = AxumTestRequest::post("/api/auth/signup")
        .header("x-forwarded-for", "192.0.2.10")
        .json(&json!({
            "email": "  Dana@Example.com ",
            "password": TEST_PASSWORD,
            "displayName": "Dana Whitfield",
        }))
        .send(router)
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let cookie = response.header("set-cookie").unwrap();
    assert!(cookie.starts_with("auth_token="));
    assert!(cookie.contains("HttpOnly"));

    let data = response.data();
    assert!(!data["token"].as_str().unwrap().is_empty());
    assert_eq!(data["user"]["email"], "dana@example.com");
    assert!(data["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_signup_reports_each_invalid_field() {
    let (_resources, router) = create_test_app().await;

    let response = AxumTestRequest::post("/api/auth/signup")
        .header("x-forwarded-for", "192.0.2.11")
        .json(&json!({
            "email": "not-an-email",
            "password": "short",
            "displayName": "",
        }))
        .send(router)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "invalid_input");
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
    assert!(fields.contains(&"displayName"));
}

#[tokio::test]
async fn test_signup_accepts_name_and_phone_number() {
    let (_resources, router) = create_test_app().await;

    let response = AxumTestRequest::post("/api/auth/signup")
        .header("x-forwarded-for", "192.0.2.12")
        .json(&json!({
            "email": "test.user@example.com",
            "password": TEST_PASSWORD,
            "name": "Test User",
            "phoneNumber": "+1234567890",
        }))
        .send(router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let data = response.data();
    assert_eq!(data["user"]["displayName"], "Test User");

    let invalid = AxumTestRequest::post("/api/auth/signup")
        .header("x-forwarded-for", "192.0.2.13")
        .json(&json!({ "email": "not-an-email", "password": "123", "name": "" }))
        .send(router)
        .await;
    assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = invalid.json();
    assert_eq!(body["code"], "invalid_input");
    assert!(!body["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unparseable_requests_answer_json_400() {
    let (_resources, router) = create_test_app().await;
    let user = signup(&router, "parse@example.com", "Parse Checker").await;

    let missing_field = AxumTestRequest::post("/api/auth/signup")
        .header("x-forwarded-for", "192.0.2.14")
        .json(&json!({ "email": "half@example.com" }))
        .send(router.clone())
        .await;
    assert_eq!(missing_field.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(missing_field.error_code(), "invalid_input");

    let not_json = AxumTestRequest::post("/api/auth/login")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "192.0.2.15")
        .send(router.clone())
        .await;
    assert_eq!(not_json.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(not_json.error_code(), "invalid_input");

    let bad_path = AxumTestRequest::get("/api/elders/not-a-uuid/tasks")
        .bearer(&user.token)
        .send(router.clone())
        .await;
    assert_eq!(bad_path.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(bad_path.error_code(), "invalid_input");

    let elder = uuid::Uuid::new_v4();
    let bad_query = AxumTestRequest::get(&format!("/api/elders/{elder}/logs?from=yesterday"))
        .bearer(&user.token)
        .send(router)
        .await;
    assert_eq!(bad_query.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(bad_query.error_code(), "invalid_input");
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let (_resources, router) = create_test_app().await;
    signup(&router, "sam@example.com", "Sam Okafor").await;

    let response = AxumTestRequest::post("/api/auth/signup")
        .header("x-forwarded-for", "192.0.2.12")
        .json(&json!({
            "email": "SAM@example.com",
            "password": TEST_PASSWORD,
            "displayName": "Sam Again",
        }))
        .send(router)
        .await;

    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(response.error_code(), "resource_already_exists");
}

#[tokio::test]
async fn test_login_and_me() {
    let (_resources, router) = create_test_app().await;
    let user = signup(&router, "lee@example.com", "Lee Moreau").await;

    let response = AxumTestRequest::post("/api/auth/login")
        .header("x-forwarded-for", "192.0.2.13")
        .json(&json!({ "email": "lee@example.com", "password": TEST_PASSWORD }))
        .send(router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let token = response.data()["token"].as_str().unwrap().to_owned();

    let me = AxumTestRequest::get("/api/auth/me")
        .bearer(&token)
        .send(router.clone())
        .await;
    assert_eq!(me.status_code(), StatusCode::OK);
    assert_eq!(me.data()["user"]["id"], user.id.to_string());

    // The cookie alone also authenticates
    let by_cookie = AxumTestRequest::get("/api/auth/me")
        .header("cookie", &format!("auth_token={token}"))
        .send(router)
        .await;
    assert_eq!(by_cookie.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_wrong_password_and_unknown_email_look_the_same() {
    let (_resources, router) = create_test_app().await;
    signup(&router, "kim@example.com", "Kim Tran").await;

    let wrong = AxumTestRequest::post("/api/auth/login")
        .header("x-forwarded-for", "192.0.2.14")
        .json(&json!({ "email": "kim@example.com", "password": "Wrong-Password-1" }))
        .send(router.clone())
        .await;
    let unknown = AxumTestRequest::post("/api/auth/login")
        .header("x-forwarded-for", "192.0.2.15")
        .json(&json!({ "email": "nobody@example.com", "password": TEST_PASSWORD }))
        .send(router)
        .await;

    assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status_code(), StatusCode::UNAUTHORIZED);
    let wrong_body: Value = wrong.json();
    let unknown_body: Value = unknown.json();
    assert_eq!(wrong_body, unknown_body);
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let (_resources, router) = create_test_app().await;

    let missing = AxumTestRequest::get("/api/groups").send(router.clone()).await;
    assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(missing.error_code(), "auth_required");

    let garbage = AxumTestRequest::get("/api/groups")
        .bearer("not.a.jwt")
        .send(router)
        .await;
    assert_eq!(garbage.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_rate_limit_returns_retry_after() {
    let (_resources, router) = create_test_app().await;

    for _ in 0..5 {
        let response = AxumTestRequest::post("/api/auth/login")
            .header("x-forwarded-for", "198.51.100.7")
            .json(&json!({ "email": "ghost@example.com", "password": TEST_PASSWORD }))
            .send(router.clone())
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    let limited = AxumTestRequest::post("/api/auth/login")
        .header("x-forwarded-for", "198.51.100.7")
        .json(&json!({ "email": "ghost@example.com", "password": TEST_PASSWORD }))
        .send(router.clone())
        .await;
    assert_eq!(limited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.error_code(), "rate_limit_exceeded");
    let retry_after: u64 = limited.header("retry-after").unwrap().parse().unwrap();
    assert!(retry_after > 0);

    // Another client is unaffected
    let other = AxumTestRequest::post("/api/auth/login")
        .header("x-forwarded-for", "198.51.100.8")
        .json(&json!({ "email": "ghost@example.com", "password": TEST_PASSWORD }))
        .send(router)
        .await;
    assert_eq!(other.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_spoofed_forwarded_for_is_ignored_without_trusted_proxy() {
    let mut config = test_config();
    config.security.trust_forwarded_headers = false;
    let resources = create_test_resources_with(config, Arc::new(TestLlmProvider::default())).await;
    let router = build_router(resources);

    for n in 0..5 {
        let response = AxumTestRequest::post("/api/auth/login")
            .header("x-forwarded-for", &format!("203.0.113.{n}"))
            .json(&json!({ "email": "ghost@example.com", "password": TEST_PASSWORD }))
            .send(router.clone())
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    // A fresh forwarded address does not reset the caller's budget
    let limited = AxumTestRequest::post("/api/auth/login")
        .header("x-forwarded-for", "203.0.113.99")
        .json(&json!({ "email": "ghost@example.com", "password": TEST_PASSWORD }))
        .send(router)
        .await;
    assert_eq!(limited.status_code(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_change_password() {
    let (_resources, router) = create_test_app().await;
    let user = signup(&router, "ola@example.com", "Ola Berg").await;

    let rejected = AxumTestRequest::put("/api/auth/password")
        .bearer(&user.token)
        .json(&json!({ "currentPassword": "Not-The-One-9", "newPassword": "Brand-New-Pass-7" }))
        .send(router.clone())
        .await;
    assert_eq!(rejected.status_code(), StatusCode::UNAUTHORIZED);

    let changed = AxumTestRequest::put("/api/auth/password")
        .bearer(&user.token)
        .json(&json!({ "currentPassword": TEST_PASSWORD, "newPassword": "Brand-New-Pass-7" }))
        .send(router.clone())
        .await;
    assert_eq!(changed.status_code(), StatusCode::OK);

    let login = AxumTestRequest::post("/api/auth/login")
        .header("x-forwarded-for", "192.0.2.16")
        .json(&json!({ "email": "ola@example.com", "password": "Brand-New-Pass-7" }))
        .send(router)
        .await;
    assert_eq!(login.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_reports_database() {
    let (_resources, router) = create_test_app().await;

    let response = AxumTestRequest::get("/health").send(router).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(response.header("x-content-type-options"), Some("nosniff"));
}
