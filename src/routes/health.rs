// ABOUTME: Liveness endpoint reporting service metadata and a database round-trip check
// ABOUTME: Answers 503 when the database cannot be reached
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::config::Environment;
use crate::server::ServerResources;

/// Overall or per-component state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Working
    Healthy,
    /// Failing
    Unhealthy,
}

/// One dependency check
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    /// Component name
    pub name: &'static str,
    /// Result
    pub status: HealthStatus,
    /// Detail for operators
    pub message: String,
    /// Check duration in milliseconds
    pub duration_ms: u128,
}

/// `/health` body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Worst component status
    pub status: HealthStatus,
    /// Package name
    pub service: &'static str,
    /// Package version
    pub version: &'static str,
    /// Deployment environment
    pub environment: Environment,
    /// Component checks
    pub checks: Vec<ComponentHealth>,
    /// When the check ran
    pub timestamp: DateTime<Utc>,
}

/// Health routes
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create the health route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/health", get(Self::handle_health))
            .with_state(resources)
    }

    async fn check_database(resources: &ServerResources) -> ComponentHealth {
        let started = Instant::now();
        let (status, message) = match resources.database.health_check().await {
            Ok(()) => (HealthStatus::Healthy, "Database reachable".to_owned()),
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                (HealthStatus::Unhealthy, "Database unreachable".to_owned())
            }
        };
        ComponentHealth {
            name: "database",
            status,
            message,
            duration_ms: started.elapsed().as_millis(),
        }
    }

    async fn handle_health(State(resources): State<Arc<ServerResources>>) -> Response {
        let checks = vec![Self::check_database(&resources).await];
        let status = if checks.iter().all(|c| c.status == HealthStatus::Healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        let code = match status {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = HealthResponse {
            status,
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            environment: resources.config.environment,
            checks,
            timestamp: Utc::now(),
        };
        (code, Json(body)).into_response()
    }
}
