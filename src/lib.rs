// ABOUTME: Main library entry point for the MyGuide care coordination server
// ABOUTME: Wires configuration, persistence, care rules, external clients and HTTP routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

#![recursion_limit = "256"]
#![deny(unsafe_code)]

//! # MyGuide Server
//!
//! Coordination backend for families and home-care agencies looking after
//! older adults. Care groups hold elders; elders have medication and
//! supplement regimens, diet logs, allergies and conditions. Agencies schedule
//! caregivers into shifts and cascade open shifts through candidate offers.
//!
//! ## Architecture
//!
//! - **care**: pure business rules (permissions, due tasks, compliance,
//!   interaction checks, shift state machine, consent, deletion)
//! - **database**: `SQLite` persistence, one manager file per aggregate
//! - **external**: openFDA labels, the LLM provider and email delivery
//! - **scheduling** / **scheduler**: the shift workflow service and the
//!   periodic maintenance loop
//! - **routes**: REST handlers, one `XRoutes` struct per area
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use myguide_server::config::ServerConfig;
//! use myguide_server::errors::AppResult;
//! use myguide_server::server::{run, ServerResources};
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     let resources = Arc::new(ServerResources::new(config).await?);
//!     run(resources).await
//! }
//! ```

pub use myguide_core::{errors, models};

/// JWT issuance, validation and password hashing
pub mod auth;

/// Care rules that operate on domain models
pub mod care;

/// Configuration management
pub mod config;

/// Application constants
pub mod constants;

/// `SQLite` persistence
pub mod database;

/// Personal data export
pub mod export;

/// External API clients (openFDA, LLM, email)
pub mod external;

/// Structured logging setup
pub mod logging;

/// Notification creation and delivery
pub mod notifications;

/// Login throttling and daily AI quotas
pub mod rate_limiting;

/// `HTTP` routes
pub mod routes;

/// Periodic maintenance tasks
pub mod scheduler;

/// Shift workflow orchestration
pub mod scheduling;

/// Audit logging, cookies, headers and invite codes
pub mod security;

/// Server resources, router assembly and startup
pub mod server;

/// Input validation and sanitizing
pub mod validation;
