// ABOUTME: Unified AI consent route handlers: status, acceptance and revocation
// ABOUTME: Acceptance requires every flag plus a minimum reading time; both changes are audited
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::care::consent;
use crate::errors::AppError;
use crate::models::{AuditEventType, ConsentAcceptance, UnifiedAiConsent};
use crate::routes::extract::Json;
use crate::routes::{authenticate, created, ok};
use crate::server::ServerResources;

/// Consent acceptance body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptConsentRequest {
    /// The four acknowledgements
    #[serde(flatten)]
    pub acceptance: ConsentAcceptance,
    /// Seconds the terms were on screen
    #[serde(default)]
    pub read_time_seconds: u32,
}

/// Consent routes
pub struct ConsentRoutes;

impl ConsentRoutes {
    /// Create all consent routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/consent",
                get(Self::handle_status)
                    .post(Self::handle_accept)
                    .delete(Self::handle_revoke),
            )
            .with_state(resources)
    }

    async fn handle_status(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let latest = resources.database.get_latest_consent(auth.user_id).await?;
        Ok(ok(consent::status(latest.as_ref(), Utc::now())))
    }

    #[instrument(skip(resources, headers, request), fields(route = "accept_consent"))]
    async fn handle_accept(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<AcceptConsentRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let care = resources.config.care;
        consent::validate_acceptance(
            &request.acceptance,
            request.read_time_seconds,
            care.consent_min_read_secs,
        )?;

        let now = Utc::now();
        let record = UnifiedAiConsent::new(
            auth.user_id,
            request.acceptance,
            request.read_time_seconds,
            now,
            care.consent_validity_days,
        );
        resources.database.create_consent(&record).await?;
        resources
            .auditor
            .log_user_event(
                AuditEventType::ConsentAccepted,
                auth.user_id,
                format!("AI consent accepted until {}", record.expires_at),
            )
            .await;
        info!(user_id = %auth.user_id, "AI consent accepted");

        Ok(created(consent::status(Some(&record), now)))
    }

    async fn handle_revoke(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let now = Utc::now();
        let revoked = resources.database.revoke_consents(auth.user_id, now).await?;
        if revoked > 0 {
            resources
                .auditor
                .log_user_event(AuditEventType::ConsentRevoked, auth.user_id, "AI consent revoked")
                .await;
        }
        let latest = resources.database.get_latest_consent(auth.user_id).await?;
        Ok(ok(json!({
            "revoked": revoked,
            "status": consent::status(latest.as_ref(), now),
        })))
    }
}
