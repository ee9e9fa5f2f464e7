// ABOUTME: Request and response types for signup, login, session and password routes
// ABOUTME: Session responses carry the user profile with derived group and agency memberships
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! Authentication request and response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AgencyRole, GroupRole, MemberPermission, User};

/// Account registration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    /// Email address
    pub email: String,
    /// Plain password, hashed before storage
    pub password: String,
    /// Display name; also accepted as `name`
    #[serde(alias = "name")]
    pub display_name: String,
    /// Optional phone number
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Email and password login
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Email address
    pub email: String,
    /// Plain password
    pub password: String,
}

/// Password change for the signed-in user
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// Current password
    pub current_password: String,
    /// Replacement password
    pub new_password: String,
}

/// Token issued by signup and login
///
/// The token is also set as the `auth_token` cookie.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// JWT
    pub token: String,
    /// Token expiry
    pub expires_at: DateTime<Utc>,
    /// Account profile
    pub user: User,
}

/// A group the user belongs to
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembershipInfo {
    /// Group id
    pub group_id: Uuid,
    /// Group name
    pub name: String,
    /// Role in the group
    pub role: GroupRole,
    /// Permission in the group
    pub permission: MemberPermission,
}

/// An agency the user works for
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencyMembershipInfo {
    /// Agency id
    pub agency_id: Uuid,
    /// Agency name
    pub name: String,
    /// Role in the agency
    pub role: AgencyRole,
}

/// `GET /api/auth/me`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Account profile
    pub user: User,
    /// Group memberships
    pub groups: Vec<GroupMembershipInfo>,
    /// Agency memberships
    pub agencies: Vec<AgencyMembershipInfo>,
}
