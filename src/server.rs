// ABOUTME: Shared server resources, router assembly with middleware, and the HTTP serve loop
// ABOUTME: Every route module receives Arc<ServerResources> as axum state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # Server
//!
//! [`ServerResources`] is built once at startup and shared by every request.
//! [`build_router`] merges the per-domain routers and applies tracing, CORS,
//! timeout, body-limit and security-header layers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::AuthManager;
use crate::config::ServerConfig;
use crate::constants::limits::{MAX_REQUEST_BODY_BYTES, REQUEST_TIMEOUT_SECONDS};
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::external::delivery::channel_from_config;
use crate::external::llm::provider_from_config;
use crate::external::{DeliveryChannel, FdaClient, FdaClientConfig, LlmProvider};
use crate::notifications::NotificationService;
use crate::rate_limiting::AuthRateLimiter;
use crate::routes::{
    AccountRoutes, AgencyRoutes, AuthRoutes, ConsentRoutes, DietRoutes, DocumentRoutes,
    ElderRoutes, GroupRoutes, HealthRoutes, InsightRoutes, NotificationRoutes, RegimenRoutes,
    ShiftRoutes,
};
use crate::scheduler::MaintenanceScheduler;
use crate::scheduling::ShiftWorkflow;
use crate::security::audit::SecurityAuditor;
use crate::security::headers::SecurityHeaders;

/// Everything a request handler needs
pub struct ServerResources {
    /// Configuration
    pub config: Arc<ServerConfig>,
    /// Database handle
    pub database: Arc<Database>,
    /// Token and password handling
    pub auth_manager: Arc<AuthManager>,
    /// Login and signup throttling
    pub auth_rate_limiter: Arc<AuthRateLimiter>,
    /// Security audit trail
    pub auditor: SecurityAuditor,
    /// Notification creation
    pub notifications: NotificationService,
    /// Shift transitions and offer cascades
    pub shift_workflow: ShiftWorkflow,
    /// openFDA labels
    pub fda_client: FdaClient,
    /// Text generation
    pub llm: Arc<dyn LlmProvider>,
}

impl ServerResources {
    /// Wire resources with explicit providers
    #[must_use]
    pub fn with_providers(
        config: ServerConfig,
        database: Database,
        llm: Arc<dyn LlmProvider>,
        delivery: Arc<dyn DeliveryChannel>,
    ) -> Self {
        let database = Arc::new(database);
        let notifications = NotificationService::new(Arc::clone(&database), delivery);
        let shift_workflow = ShiftWorkflow::new(
            Arc::clone(&database),
            notifications.clone(),
            config.care.offer_window_minutes,
        );
        let fda_client = FdaClient::new(FdaClientConfig {
            base_url: config.external.openfda_base_url.clone(),
            api_key: config.external.openfda_api_key.clone(),
            ..FdaClientConfig::default()
        });

        Self {
            auth_manager: Arc::new(AuthManager::new(&config.auth)),
            auth_rate_limiter: Arc::new(AuthRateLimiter::new(config.rate_limit)),
            auditor: SecurityAuditor::new(Arc::clone(&database)),
            notifications,
            shift_workflow,
            fda_client,
            llm,
            database,
            config: Arc::new(config),
        }
    }

    /// Connect to the database and build providers from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        let database = Database::new(
            &config.database.url,
            config.database.encryption_key.to_vec(),
        )
        .await?;
        let llm = provider_from_config(&config.external.gemini);
        let delivery = channel_from_config(&config.external);
        Ok(Self::with_providers(config, database, llm, delivery))
    }

    /// The maintenance runner for these resources
    #[must_use]
    pub fn maintenance_scheduler(&self) -> MaintenanceScheduler {
        MaintenanceScheduler::new(
            Arc::clone(&self.database),
            self.shift_workflow.clone(),
            self.notifications.clone(),
            self.auditor.clone(),
            self.config.care,
        )
        .with_rate_limiter(Arc::clone(&self.auth_rate_limiter))
    }
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins = &config.security.cors_allowed_origins;
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .expose_headers([header::RETRY_AFTER])
        .max_age(Duration::from_secs(3600))
}

/// Assemble the complete application router
#[must_use]
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    let mut router = Router::new()
        .merge(HealthRoutes::routes(Arc::clone(&resources)))
        .merge(AuthRoutes::routes(Arc::clone(&resources)))
        .merge(AccountRoutes::routes(Arc::clone(&resources)))
        .merge(GroupRoutes::routes(Arc::clone(&resources)))
        .merge(AgencyRoutes::routes(Arc::clone(&resources)))
        .merge(ElderRoutes::routes(Arc::clone(&resources)))
        .merge(RegimenRoutes::routes(Arc::clone(&resources)))
        .merge(DietRoutes::routes(Arc::clone(&resources)))
        .merge(DocumentRoutes::routes(Arc::clone(&resources)))
        .merge(ShiftRoutes::routes(Arc::clone(&resources)))
        .merge(NotificationRoutes::routes(Arc::clone(&resources)))
        .merge(ConsentRoutes::routes(Arc::clone(&resources)))
        .merge(InsightRoutes::routes(Arc::clone(&resources)));

    let headers = SecurityHeaders::new(resources.config.environment, &resources.config.security);
    for (name, value) in headers.iter() {
        router = router.layer(SetResponseHeaderLayer::overriding(name.clone(), value.clone()));
    }

    router
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECONDS),
        ))
        .layer(cors_layer(&resources.config))
        .layer(TraceLayer::new_for_http())
}

/// Bind, start maintenance and serve until shutdown
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn run(resources: Arc<ServerResources>) -> AppResult<()> {
    let address = format!(
        "{}:{}",
        resources.config.http_host, resources.config.http_port
    );
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| AppError::config(format!("Failed to bind {address}: {e}")))?;

    Arc::new(resources.maintenance_scheduler()).start();

    info!("MyGuide server listening on {}", address);
    let app = build_router(resources).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
