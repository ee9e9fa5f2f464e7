// ABOUTME: Route module organization for the MyGuide HTTP API, one module per domain
// ABOUTME: Shared helpers for response envelopes, client addresses and group/elder access checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! Route modules
//!
//! Each domain module exposes a `XRoutes::routes(resources)` constructor and
//! thin handlers that authenticate, resolve access, delegate to `care` rules or
//! services, and wrap the result in the `{ "success": true, "data": ... }`
//! envelope.

/// Account profile, deletion and export
pub mod account;
/// Agencies and caregiver staff
pub mod agencies;
/// Signup, login, logout and session
pub mod auth;
/// AI consent status, acceptance and revocation
pub mod consent;
/// Diet log, nutrition summary and AI analysis
pub mod diet;
/// Elder documents and AI summaries
pub mod documents;
/// Elder profiles, allergies and conditions
pub mod elders;
/// Extractors with JSON rejections and the client address
pub mod extract;
/// Caregiving groups, invite codes and members
pub mod groups;
/// Liveness
pub mod health;
/// Interaction checks, AI chat and drug labels
pub mod insights;
/// In-app notifications
pub mod notifications;
/// Medications, supplements, dose logs, tasks and compliance
pub mod regimen;
/// Shift scheduling and offers
pub mod shifts;

pub use account::AccountRoutes;
pub use agencies::AgencyRoutes;
pub use auth::AuthRoutes;
pub use consent::ConsentRoutes;
pub use diet::DietRoutes;
pub use documents::DocumentRoutes;
pub use elders::ElderRoutes;
pub use groups::GroupRoutes;
pub use health::HealthRoutes;
pub use insights::InsightRoutes;
pub use notifications::NotificationRoutes;
pub use regimen::RegimenRoutes;
pub use shifts::ShiftRoutes;

use std::net::SocketAddr;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::care::permissions::{self, AccessLevel};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::{Elder, Group};
use crate::server::ServerResources;

/// 200 with the success envelope
pub(crate) fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response()
}

/// 201 with the success envelope
pub(crate) fn created<T: Serialize>(data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": data })),
    )
        .into_response()
}

/// Best-effort client address for rate limiting and audit
///
/// Forwarded headers are read only when `trust_forwarded` is set; otherwise
/// the socket peer is used, and `unknown` when there is none.
pub(crate) fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded: bool,
) -> String {
    let forwarded = trust_forwarded
        .then(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .or_else(|| {
                    headers
                        .get("x-real-ip")
                        .and_then(|value| value.to_str().ok())
                })
                .map(str::trim)
                .filter(|value| !value.is_empty())
        })
        .flatten();
    match (forwarded, peer) {
        (Some(address), _) => address.to_owned(),
        (None, Some(peer)) => peer.ip().to_string(),
        (None, None) => "unknown".to_owned(),
    }
}

/// Authenticate the caller from the bearer header or session cookie
pub(crate) fn authenticate(
    resources: &ServerResources,
    headers: &HeaderMap,
) -> AppResult<AuthenticatedUser> {
    resources.auth_manager.authenticate(headers)
}

/// Load a group and the caller's access to it
///
/// Callers without any access get `ResourceNotFound`.
pub(crate) async fn group_access(
    resources: &ServerResources,
    user_id: Uuid,
    group_id: Uuid,
) -> AppResult<(Group, AccessLevel)> {
    let group = resources
        .database
        .get_group(group_id)
        .await?
        .ok_or_else(|| AppError::not_found("Group"))?;
    let group_member = resources.database.get_group_member(group_id, user_id).await?;
    let agency_member = match group.agency_id {
        Some(agency_id) => {
            resources
                .database
                .get_agency_member(agency_id, user_id)
                .await?
        }
        None => None,
    };
    let access = permissions::resolve(&group, group_member.as_ref(), agency_member.as_ref());
    access.require(AccessLevel::Read, "Group")?;
    Ok((group, access))
}

/// Load an elder and require at least `needed` access to its group
pub(crate) async fn elder_access(
    resources: &ServerResources,
    user_id: Uuid,
    elder_id: Uuid,
    needed: AccessLevel,
) -> AppResult<(Elder, Group, AccessLevel)> {
    let elder = resources
        .database
        .get_elder(elder_id)
        .await?
        .ok_or_else(|| AppError::not_found("Elder"))?;
    let (group, access) = group_access(resources, user_id, elder.group_id)
        .await
        .map_err(|e| {
            if e.code == ErrorCode::ResourceNotFound {
                AppError::not_found("Elder")
            } else {
                e
            }
        })?;
    access.require(needed, "Elder")?;
    Ok((elder, group, access))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_prefers_first_forwarded_address_behind_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers, None, true), "203.0.113.7");
    }

    #[test]
    fn client_ip_falls_back_to_real_ip_then_peer_then_unknown() {
        let peer: SocketAddr = "192.0.2.50:40000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, None, true), "unknown");
        assert_eq!(client_ip(&headers, Some(peer), true), "192.0.2.50");
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(client_ip(&headers, Some(peer), true), "198.51.100.4");
    }

    #[test]
    fn client_ip_ignores_forwarded_headers_unless_trusted() {
        let peer: SocketAddr = "192.0.2.50:40000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.8"));
        assert_eq!(client_ip(&headers, Some(peer), false), "192.0.2.50");
        assert_eq!(client_ip(&headers, None, false), "unknown");
    }
}
