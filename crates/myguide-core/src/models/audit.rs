// ABOUTME: Security audit trail entries for logins, consent and permission changes
// ABOUTME: AuditEventType, AuditSeverity and the AuditEvent record with builder methods
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    /// Kinds of security-relevant events
    pub enum AuditEventType {
        /// Account created
        UserSignup => "user_signup",
        /// Successful login
        UserLogin => "user_login",
        /// Logout
        UserLogout => "user_logout",
        /// Bad credentials or token
        AuthenticationFailed => "authentication_failed",
        /// Password changed
        PasswordChanged => "password_changed",
        /// Auth endpoint throttled a client
        RateLimited => "rate_limited",
        /// AI consent accepted
        ConsentAccepted => "consent_accepted",
        /// AI consent revoked
        ConsentRevoked => "consent_revoked",
        /// Group member permission changed
        PermissionChanged => "permission_changed",
        /// Member joined a group via invite code
        MemberJoined => "member_joined",
        /// Member removed from a group
        MemberRemoved => "member_removed",
        /// Invite code regenerated
        InviteCodeRegenerated => "invite_code_regenerated",
        /// Account deletion requested
        DeletionRequested => "deletion_requested",
        /// Account deletion cancelled
        DeletionCancelled => "deletion_cancelled",
        /// Account purged after grace period
        AccountPurged => "account_purged",
        /// User data exported
        DataExported => "data_exported",
        /// Access attempt outside the caller's permissions
        AccessDenied => "access_denied",
    }
}

string_enum! {
    /// Severity levels for audit events
    pub enum AuditSeverity {
        /// Normal operation
        Info => "info",
        /// Potential issue
        Warning => "warning",
        /// Operation failed
        Error => "error",
        /// Security incident
        Critical => "critical",
    }
}

/// Security audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Unique event identifier
    pub event_id: Uuid,
    /// Type of audit event
    pub event_type: AuditEventType,
    /// Severity level
    pub severity: AuditSeverity,
    /// Timestamp of the event
    pub timestamp: DateTime<Utc>,
    /// Acting user, when known
    pub user_id: Option<Uuid>,
    /// Source IP address, when known
    pub source_ip: Option<String>,
    /// Event description
    pub description: String,
    /// Resource affected (e.g. "group:<id>")
    pub resource: Option<String>,
    /// Additional event metadata
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    /// Create a new audit event
    #[must_use]
    pub fn new(
        event_type: AuditEventType,
        severity: AuditSeverity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            severity,
            timestamp: Utc::now(),
            user_id: None,
            source_ip: None,
            description: description.into(),
            resource: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Set user ID for the event
    #[must_use]
    pub const fn with_user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set source IP address
    #[must_use]
    pub fn with_source_ip(mut self, source_ip: impl Into<String>) -> Self {
        self.source_ip = Some(source_ip.into());
        self
    }

    /// Set resource affected
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Add metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
