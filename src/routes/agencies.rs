// ABOUTME: Agency route handlers for creating agencies and managing caregiver staff
// ABOUTME: Only owners and admins may add staff; staff are found by account email
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
use tracing::info;
use uuid::Uuid;

use crate::constants::limits::MAX_NAME_LENGTH;
use crate::errors::{AppError, AppResult};
use crate::models::{
    Agency, AgencyMember, AgencyRole, NotificationPriority, NotificationType, SubscriptionTier,
    UserNotification,
};
use crate::routes::extract::{Json, Path};
use crate::routes::{authenticate, created, ok};
use crate::server::ServerResources;
use crate::validation::Validator;

/// New agency
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgencyRequest {
    /// Agency name
    pub name: String,
    /// Tier, `single_agency` unless given
    #[serde(default)]
    pub subscription_tier: Option<SubscriptionTier>,
}

/// Staff addition
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCaregiverRequest {
    /// Email of an existing account
    pub email: String,
    /// `caregiver` unless given; `owner` is not assignable
    #[serde(default)]
    pub role: Option<AgencyRole>,
}

/// Agency routes
pub struct AgencyRoutes;

impl AgencyRoutes {
    /// Create all agency routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/agencies",
                get(Self::handle_list_agencies).post(Self::handle_create_agency),
            )
            .route("/api/agencies/:agency_id", get(Self::handle_get_agency))
            .route(
                "/api/agencies/:agency_id/caregivers",
                get(Self::handle_list_caregivers).post(Self::handle_add_caregiver),
            )
            .with_state(resources)
    }

    /// The caller's staff record; non-staff get `ResourceNotFound`
    async fn membership(
        resources: &ServerResources,
        agency_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<(Agency, AgencyMember)> {
        let member = resources
            .database
            .get_agency_member(agency_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Agency"))?;
        let agency = resources
            .database
            .get_agency(agency_id)
            .await?
            .ok_or_else(|| AppError::not_found("Agency"))?;
        Ok((agency, member))
    }

    async fn handle_list_agencies(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let agencies: Vec<_> = resources
            .database
            .list_agencies_for_user(auth.user_id)
            .await?
            .into_iter()
            .map(|(agency, member)| json!({ "agency": agency, "role": member.role }))
            .collect();
        Ok(ok(agencies))
    }

    async fn handle_create_agency(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<CreateAgencyRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let mut validator = Validator::new();
        validator
            .required("name", &request.name)
            .max_length("name", &request.name, MAX_NAME_LENGTH);
        validator.finish()?;

        let agency = Agency {
            id: Uuid::new_v4(),
            name: request.name.trim().to_owned(),
            owner_id: auth.user_id,
            subscription_tier: request
                .subscription_tier
                .unwrap_or(SubscriptionTier::SingleAgency),
            created_at: Utc::now(),
        };
        resources.database.create_agency(&agency).await?;
        info!(agency_id = %agency.id, "Agency created");
        Ok(created(agency))
    }

    async fn handle_get_agency(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(agency_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (agency, member) = Self::membership(&resources, agency_id, auth.user_id).await?;
        let groups = resources.database.list_agency_groups(agency.id).await?;
        Ok(ok(json!({
            "agency": agency,
            "role": member.role,
            "groups": groups,
        })))
    }

    async fn handle_list_caregivers(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(agency_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (agency, _) = Self::membership(&resources, agency_id, auth.user_id).await?;
        Ok(ok(resources.database.list_agency_members(agency.id).await?))
    }

    async fn handle_add_caregiver(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(agency_id): Path<Uuid>,
        Json(request): Json<AddCaregiverRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (agency, member) = Self::membership(&resources, agency_id, auth.user_id).await?;
        if !member.role.can_manage() {
            return Err(AppError::permission_denied(
                "Only agency owners and admins can add staff",
            ));
        }

        let role = request.role.unwrap_or(AgencyRole::Caregiver);
        if role == AgencyRole::Owner {
            return Err(AppError::invalid_input("An agency has exactly one owner"));
        }
        let user = resources
            .database
            .get_user_by_email(&request.email.trim().to_lowercase())
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        resources
            .database
            .add_agency_member(agency.id, user.id, role)
            .await?;
        resources
            .notifications
            .notify(
                UserNotification::new(
                    user.id,
                    NotificationType::System,
                    NotificationPriority::Medium,
                    "Added to agency",
                    format!("You were added to {} as {role}", agency.name),
                )
                .with_action_url(format!("/agencies/{}", agency.id)),
            )
            .await?;

        let added = resources
            .database
            .get_agency_member(agency.id, user.id)
            .await?
            .ok_or_else(|| AppError::not_found("Agency member"))?;
        Ok(created(added))
    }
}
