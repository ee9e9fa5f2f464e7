// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Builds in-memory server resources, a scripted LLM and signed-in users
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `myguide_server`
//!
//! Every test gets its own in-memory database. External services are replaced:
//! the LLM answers from a script and notification delivery only logs.

use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use myguide_server::config::ServerConfig;
use myguide_server::database::Database;
use myguide_server::errors::AppResult;
use myguide_server::external::{ChatRequest, ChatResponse, LlmProvider, LogOnlyDelivery};
use myguide_server::models::FdaDrugLabel;
use myguide_server::server::{build_router, ServerResources};

use crate::helpers::axum_test::AxumTestRequest;

static INIT_LOGGER: Once = Once::new();
static NEXT_CLIENT: AtomicUsize = AtomicUsize::new(1);

/// Password used for every test account
pub const TEST_PASSWORD: &str = "Correct-Horse-42";

/// Reply the scripted LLM gives unless told otherwise
pub const DEFAULT_LLM_REPLY: &str =
    r#"{"calories": 520, "proteinG": 31.5, "carbsG": 48, "fatG": 19, "notes": "Balanced"}"#;

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };
        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

/// LLM stand-in that returns a fixed reply and counts calls
#[derive(Default)]
pub struct TestLlmProvider {
    reply: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl TestLlmProvider {
    pub fn with_reply(reply: &str) -> Self {
        Self {
            reply: Mutex::new(Some(reply.to_owned())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for TestLlmProvider {
    fn name(&self) -> &'static str {
        "test"
    }

    fn default_model(&self) -> &'static str {
        "test-model"
    }

    async fn complete(&self, _request: &ChatRequest) -> AppResult<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = self
            .reply
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| DEFAULT_LLM_REPLY.to_owned());
        Ok(ChatResponse {
            content,
            model: "test-model".to_owned(),
            usage: None,
            finish_reason: Some("STOP".to_owned()),
        })
    }
}

/// Development config tuned for tests
///
/// openFDA points at a closed local port so uncached label lookups fail fast.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::development_defaults();
    config.database.url = "sqlite::memory:".to_owned();
    config.auth.bcrypt_cost = 4;
    config.external.openfda_base_url = "http://127.0.0.1:9".to_owned();
    // Tests give each client its own X-Forwarded-For address
    config.security.trust_forwarded_headers = true;
    config
}

pub async fn create_test_resources_with(
    config: ServerConfig,
    llm: Arc<TestLlmProvider>,
) -> Arc<ServerResources> {
    init_test_logging();
    let database = Database::new(&config.database.url, config.database.encryption_key.to_vec())
        .await
        .unwrap();
    Arc::new(ServerResources::with_providers(
        config,
        database,
        llm,
        Arc::new(LogOnlyDelivery),
    ))
}

pub async fn create_test_resources() -> Arc<ServerResources> {
    create_test_resources_with(test_config(), Arc::new(TestLlmProvider::default())).await
}

/// Resources plus the full router
pub async fn create_test_app() -> (Arc<ServerResources>, Router) {
    let resources = create_test_resources().await;
    let router = build_router(Arc::clone(&resources));
    (resources, router)
}

/// A signed-up user
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

/// Sign up through the API
pub async fn signup(router: &Router, email: &str, name: &str) -> TestUser {
    // Distinct client address per signup keeps helpers clear of the auth rate limit
    let client = NEXT_CLIENT.fetch_add(1, Ordering::SeqCst);
    let response = AxumTestRequest::post("/api/auth/signup")
        .header(
            "x-forwarded-for",
            &format!("10.{}.{}.1", client / 250, client % 250),
        )
        .json(&json!({
            "email": email,
            "password": TEST_PASSWORD,
            "displayName": name,
        }))
        .send(router.clone())
        .await;
    assert_eq!(response.status_code().as_u16(), 201, "signup failed");
    let data = response.data();
    TestUser {
        id: data["user"]["id"].as_str().unwrap().parse().unwrap(),
        email: email.to_owned(),
        token: data["token"].as_str().unwrap().to_owned(),
    }
}

/// Accept the AI consent with every flag set
pub async fn accept_consent(router: &Router, user: &TestUser) {
    let response = AxumTestRequest::post("/api/consent")
        .bearer(&user.token)
        .json(&json!({
            "termsAccepted": true,
            "medicalDisclaimerAccepted": true,
            "dataUsageAccepted": true,
            "limitationsAcknowledged": true,
            "readTimeSeconds": 45,
        }))
        .send(router.clone())
        .await;
    assert_eq!(response.status_code().as_u16(), 201, "consent failed");
}

/// Create a family group, returning its id and invite code
pub async fn create_group(router: &Router, user: &TestUser, name: &str) -> (Uuid, String) {
    let response = AxumTestRequest::post("/api/groups")
        .bearer(&user.token)
        .json(&json!({ "name": name }))
        .send(router.clone())
        .await;
    assert_eq!(response.status_code().as_u16(), 201, "group create failed");
    let data = response.data();
    (
        data["group"]["id"].as_str().unwrap().parse().unwrap(),
        data["inviteCode"].as_str().unwrap().to_owned(),
    )
}

/// Join a group by invite code
pub async fn join_group(router: &Router, user: &TestUser, invite_code: &str) {
    let response = AxumTestRequest::post("/api/groups/join")
        .bearer(&user.token)
        .json(&json!({ "inviteCode": invite_code }))
        .send(router.clone())
        .await;
    assert_eq!(response.status_code().as_u16(), 200, "join failed");
}

/// Create an elder in UTC
pub async fn create_elder(router: &Router, user: &TestUser, group_id: Uuid, name: &str) -> Uuid {
    let response = AxumTestRequest::post(&format!("/api/groups/{group_id}/elders"))
        .bearer(&user.token)
        .json(&json!({ "name": name, "dateOfBirth": "1941-03-09", "utcOffsetMinutes": 0 }))
        .send(router.clone())
        .await;
    assert_eq!(response.status_code().as_u16(), 201, "elder create failed");
    response.data()["id"].as_str().unwrap().parse().unwrap()
}

/// Add a medication taken at the given `HH:MM:SS` times, started a month ago
pub async fn add_medication(
    router: &Router,
    user: &TestUser,
    elder_id: Uuid,
    name: &str,
    times: &[&str],
) -> Value {
    let response = AxumTestRequest::post(&format!("/api/elders/{elder_id}/medications"))
        .bearer(&user.token)
        .json(&json!({
            "name": name,
            "dosage": "10 mg",
            "frequency": times,
            "startDate": Utc::now().date_naive() - chrono::Duration::days(30),
        }))
        .send(router.clone())
        .await;
    assert_eq!(response.status_code().as_u16(), 201, "medication create failed");
    response.data()
}

/// Put a fresh label in the cache so no network lookup happens
pub async fn seed_label(database: &Database, name: &str, generic: &str, interactions: &str) {
    database
        .upsert_drug_label(&FdaDrugLabel {
            medication_key: FdaDrugLabel::key_for(name),
            brand_name: Some(name.to_owned()),
            generic_name: Some(generic.to_owned()),
            boxed_warning: None,
            warnings: None,
            contraindications: None,
            drug_interactions: Some(interactions.to_owned()),
            source_id: None,
            fetched_at: Utc::now(),
        })
        .await
        .unwrap();
}
