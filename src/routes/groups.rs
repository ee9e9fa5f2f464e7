// ABOUTME: Caregiving group route handlers for creation, invite-code joins and member management
// ABOUTME: Joins respect the tier member limit; at most one non-admin member may hold write access
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! Group routes
//!
//! Invite codes are stored encrypted and looked up by hash, so only admins can
//! read them back. New members join with read permission; an admin grants
//! write to one member at a time.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::care::permissions::{self, AccessLevel};
use crate::constants::limits::MAX_NAME_LENGTH;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::{
    AuditEventType, Group, GroupRole, MemberPermission, NotificationPriority, NotificationType,
    SubscriptionTier, UserNotification,
};
use crate::routes::extract::{Json, Path};
use crate::routes::{authenticate, created, group_access, ok};
use crate::security::invite_codes;
use crate::server::ServerResources;
use crate::validation::Validator;

const INVITE_CODE_ATTEMPTS: usize = 3;

/// New group
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    /// Group name
    pub name: String,
    /// Owning agency, for agency-managed groups
    #[serde(default)]
    pub agency_id: Option<Uuid>,
    /// Tier; defaults to the agency's tier or `family`
    #[serde(default)]
    pub subscription_tier: Option<SubscriptionTier>,
}

/// Join by code
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGroupRequest {
    /// Invite code in any case
    pub invite_code: String,
}

/// Permission change
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPermissionRequest {
    /// New permission
    pub permission: MemberPermission,
}

/// Group with the caller's access and usage against tier limits
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetails {
    /// Group
    #[serde(flatten)]
    pub group: Group,
    /// Caller's access
    pub access: AccessLevel,
    /// Current members
    pub member_count: usize,
    /// Tier member limit
    pub max_members: usize,
    /// Current elders
    pub elder_count: usize,
    /// Tier elder limit
    pub max_elders: usize,
}

/// Group routes
pub struct GroupRoutes;

impl GroupRoutes {
    /// Create all group routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/groups",
                get(Self::handle_list_groups).post(Self::handle_create_group),
            )
            .route("/api/groups/join", post(Self::handle_join_group))
            .route("/api/groups/:group_id", get(Self::handle_get_group))
            .route(
                "/api/groups/:group_id/invite-code",
                get(Self::handle_get_invite_code).post(Self::handle_regenerate_invite_code),
            )
            .route("/api/groups/:group_id/members", get(Self::handle_list_members))
            .route(
                "/api/groups/:group_id/members/:user_id",
                delete(Self::handle_remove_member),
            )
            .route(
                "/api/groups/:group_id/members/:user_id/permission",
                put(Self::handle_set_permission),
            )
            .with_state(resources)
    }

    async fn admin_access(
        resources: &ServerResources,
        user_id: Uuid,
        group_id: Uuid,
    ) -> AppResult<Group> {
        let (group, access) = group_access(resources, user_id, group_id).await?;
        access.require(AccessLevel::Admin, "Group")?;
        Ok(group)
    }

    async fn handle_list_groups(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let groups: Vec<_> = resources
            .database
            .list_groups_for_user(auth.user_id)
            .await?
            .into_iter()
            .map(|(group, member)| {
                json!({
                    "group": group,
                    "access": permissions::from_group_member(&member),
                })
            })
            .collect();
        Ok(ok(groups))
    }

    #[instrument(skip(resources, headers, request), fields(route = "create_group"))]
    async fn handle_create_group(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<CreateGroupRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;

        let mut validator = Validator::new();
        validator
            .required("name", &request.name)
            .max_length("name", &request.name, MAX_NAME_LENGTH);
        validator.finish()?;

        let mut tier = request.subscription_tier.unwrap_or(SubscriptionTier::Family);
        if let Some(agency_id) = request.agency_id {
            let member = resources
                .database
                .get_agency_member(agency_id, auth.user_id)
                .await?
                .ok_or_else(|| AppError::not_found("Agency"))?;
            if !member.role.can_manage() {
                return Err(AppError::permission_denied(
                    "Only agency owners and admins can create agency groups",
                ));
            }
            let agency = resources
                .database
                .get_agency(agency_id)
                .await?
                .ok_or_else(|| AppError::not_found("Agency"))?;
            tier = request.subscription_tier.unwrap_or(agency.subscription_tier);
        }

        let group = Group {
            id: Uuid::new_v4(),
            name: request.name.trim().to_owned(),
            owner_id: auth.user_id,
            agency_id: request.agency_id,
            subscription_tier: tier,
            created_at: Utc::now(),
        };

        let mut attempt = 0;
        let invite_code = loop {
            attempt += 1;
            let code = invite_codes::generate();
            match resources.database.create_group(&group, &code).await {
                Ok(()) => break code,
                Err(e)
                    if e.code == ErrorCode::ResourceAlreadyExists
                        && attempt < INVITE_CODE_ATTEMPTS =>
                {
                    warn!("Invite code collision, retrying");
                }
                Err(e) => return Err(e),
            }
        };
        info!(group_id = %group.id, "Group created");

        Ok(created(json!({ "group": group, "inviteCode": invite_code })))
    }

    async fn handle_get_group(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(group_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (group, access) = group_access(&resources, auth.user_id, group_id).await?;
        let member_count = resources.database.count_group_members(group.id).await?;
        let elder_count = resources.database.count_elders(group.id).await?;
        Ok(ok(GroupDetails {
            max_members: group.subscription_tier.max_members(),
            max_elders: group.subscription_tier.max_elders(),
            group,
            access,
            member_count,
            elder_count,
        }))
    }

    #[instrument(skip(resources, headers, request), fields(route = "join_group"))]
    async fn handle_join_group(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<JoinGroupRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let code = invite_codes::normalize(&request.invite_code)
            .ok_or_else(|| AppError::invalid_input("Invite codes are 8 letters and digits"))?;
        let group = resources
            .database
            .find_group_by_invite_code(&code)
            .await?
            .ok_or_else(|| AppError::not_found("Invite code"))?;

        if resources
            .database
            .get_group_member(group.id, auth.user_id)
            .await?
            .is_some()
        {
            return Err(AppError::already_exists("Already a member of this group"));
        }
        let members = resources.database.count_group_members(group.id).await?;
        if members >= group.subscription_tier.max_members() {
            return Err(AppError::tier_limit(format!(
                "This group has reached its limit of {} members",
                group.subscription_tier.max_members()
            )));
        }

        resources
            .database
            .add_group_member(group.id, auth.user_id, GroupRole::Member, MemberPermission::Read)
            .await?;
        resources
            .auditor
            .log_membership_change(
                AuditEventType::MemberJoined,
                auth.user_id,
                group.id,
                json!({ "permission": MemberPermission::Read }),
            )
            .await;

        let joiner = resources
            .database
            .get_user(auth.user_id)
            .await?
            .map_or_else(|| auth.email.clone(), |user| user.display_name);
        resources
            .notifications
            .notify(
                UserNotification::new(
                    group.owner_id,
                    NotificationType::GroupMemberJoined,
                    NotificationPriority::Medium,
                    "New group member",
                    format!("{joiner} joined {}", group.name),
                )
                .with_action_url(format!("/groups/{}/members", group.id)),
            )
            .await?;

        Ok(ok(group))
    }

    async fn handle_get_invite_code(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(group_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let group = Self::admin_access(&resources, auth.user_id, group_id).await?;
        let code = resources.database.get_group_invite_code(group.id).await?;
        Ok(ok(json!({ "inviteCode": code })))
    }

    async fn handle_regenerate_invite_code(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(group_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let group = Self::admin_access(&resources, auth.user_id, group_id).await?;

        let mut attempt = 0;
        let code = loop {
            attempt += 1;
            let code = invite_codes::generate();
            match resources.database.set_group_invite_code(group.id, &code).await {
                Ok(()) => break code,
                Err(e)
                    if e.code == ErrorCode::ResourceAlreadyExists
                        && attempt < INVITE_CODE_ATTEMPTS => {}
                Err(e) => return Err(e),
            }
        };
        resources
            .auditor
            .log_membership_change(
                AuditEventType::InviteCodeRegenerated,
                auth.user_id,
                group.id,
                serde_json::Value::Null,
            )
            .await;
        Ok(ok(json!({ "inviteCode": code })))
    }

    async fn handle_list_members(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(group_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (group, _) = group_access(&resources, auth.user_id, group_id).await?;
        Ok(ok(resources.database.list_group_members(group.id).await?))
    }

    #[instrument(skip(resources, headers, request), fields(route = "set_permission"))]
    async fn handle_set_permission(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((group_id, user_id)): Path<(Uuid, Uuid)>,
        Json(request): Json<SetPermissionRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let group = Self::admin_access(&resources, auth.user_id, group_id).await?;

        let members = resources.database.list_group_members(group.id).await?;
        permissions::check_permission_change(&members, user_id, request.permission)?;
        resources
            .database
            .update_group_member_permission(group.id, user_id, request.permission)
            .await?;
        resources
            .auditor
            .log_membership_change(
                AuditEventType::PermissionChanged,
                auth.user_id,
                group.id,
                json!({ "member": user_id, "permission": request.permission }),
            )
            .await;

        let member = resources
            .database
            .get_group_member(group.id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Group member"))?;
        Ok(ok(member))
    }

    /// Admins remove anyone but themselves; members may remove themselves
    async fn handle_remove_member(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((group_id, user_id)): Path<(Uuid, Uuid)>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (group, access) = group_access(&resources, auth.user_id, group_id).await?;
        if user_id != auth.user_id {
            access.require(AccessLevel::Admin, "Group")?;
        }

        let member = resources
            .database
            .get_group_member(group.id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Group member"))?;
        if member.role == GroupRole::Admin {
            return Err(AppError::invalid_input("The group admin cannot be removed"));
        }

        resources
            .database
            .remove_group_member(group.id, user_id)
            .await?;
        resources
            .auditor
            .log_membership_change(
                AuditEventType::MemberRemoved,
                auth.user_id,
                group.id,
                json!({ "member": user_id }),
            )
            .await;
        Ok(ok(json!({ "removed": user_id })))
    }
}
