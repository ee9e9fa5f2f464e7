// ABOUTME: Security audit logging for authentication, consent, membership and account events
// ABOUTME: Writes every event to the structured log by severity and persists it to the audit table
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # Security Audit Module
//!
//! Audit events are logged first, then stored. A storage failure is logged
//! and swallowed so that auditing never fails the request it describes.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::database::Database;

pub use crate::models::{AuditEvent, AuditEventType, AuditSeverity};

/// Audit logger for security events
#[derive(Clone)]
pub struct SecurityAuditor {
    database: Arc<Database>,
}

impl SecurityAuditor {
    /// Create new security auditor
    #[must_use]
    pub const fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    fn log_to_structured_logger(event: &AuditEvent) {
        match event.severity {
            AuditSeverity::Info => info!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                user_id = ?event.user_id,
                resource = ?event.resource,
                "Security audit event: {}",
                event.description
            ),
            AuditSeverity::Warning => warn!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                user_id = ?event.user_id,
                source_ip = ?event.source_ip,
                resource = ?event.resource,
                "Security audit warning: {}",
                event.description
            ),
            AuditSeverity::Error => error!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                user_id = ?event.user_id,
                source_ip = ?event.source_ip,
                resource = ?event.resource,
                "Security audit error: {}",
                event.description
            ),
            AuditSeverity::Critical => error!(
                target: "security_alert",
                event_id = %event.event_id,
                event_type = %event.event_type,
                user_id = ?event.user_id,
                source_ip = ?event.source_ip,
                "CRITICAL security audit event: {}",
                event.description
            ),
        }
    }

    /// Log and persist an audit event
    pub async fn log_event(&self, event: AuditEvent) {
        Self::log_to_structured_logger(&event);
        match self.database.store_audit_event(&event).await {
            Ok(()) => debug!(event_id = %event.event_id, "Stored audit event"),
            Err(e) => error!(event_id = %event.event_id, error = %e, "Failed to store audit event"),
        }
    }

    /// Successful signup or login
    pub async fn log_authentication(
        &self,
        event_type: AuditEventType,
        user_id: Uuid,
        source_ip: &str,
    ) {
        let event = AuditEvent::new(
            event_type,
            AuditSeverity::Info,
            format!("{event_type} succeeded"),
        )
        .with_user_id(user_id)
        .with_source_ip(source_ip);
        self.log_event(event).await;
    }

    /// Failed login for an email address
    pub async fn log_authentication_failure(
        &self,
        email: &str,
        user_id: Option<Uuid>,
        source_ip: &str,
        reason: &str,
    ) {
        let mut event = AuditEvent::new(
            AuditEventType::AuthenticationFailed,
            AuditSeverity::Warning,
            format!("Authentication failed: {reason}"),
        )
        .with_source_ip(source_ip)
        .with_metadata(serde_json::json!({ "email": email }));
        if let Some(user_id) = user_id {
            event = event.with_user_id(user_id);
        }
        self.log_event(event).await;
    }

    /// Client throttled on an auth endpoint
    pub async fn log_rate_limited(&self, source_ip: &str, endpoint: &str) {
        let event = AuditEvent::new(
            AuditEventType::RateLimited,
            AuditSeverity::Warning,
            format!("Rate limit exceeded on {endpoint}"),
        )
        .with_source_ip(source_ip)
        .with_resource(endpoint);
        self.log_event(event).await;
    }

    /// A member's permission changed or a member joined/left
    pub async fn log_membership_change(
        &self,
        event_type: AuditEventType,
        actor_id: Uuid,
        group_id: Uuid,
        metadata: serde_json::Value,
    ) {
        let event = AuditEvent::new(
            event_type,
            AuditSeverity::Info,
            format!("Group membership change: {event_type}"),
        )
        .with_user_id(actor_id)
        .with_resource(format!("group:{group_id}"))
        .with_metadata(metadata);
        self.log_event(event).await;
    }

    /// Account lifecycle and consent events owned by one user
    pub async fn log_user_event(
        &self,
        event_type: AuditEventType,
        user_id: Uuid,
        description: impl Into<String>,
    ) {
        let event =
            AuditEvent::new(event_type, AuditSeverity::Info, description).with_user_id(user_id);
        self.log_event(event).await;
    }
}
