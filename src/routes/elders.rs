// ABOUTME: Elder profile route handlers plus allergy and health-condition records
// ABOUTME: Creating elders respects the group's tier limit; edits need write access, deletion admin
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::care::permissions::AccessLevel;
use crate::constants::limits::{MAX_NAME_LENGTH, MAX_TEXT_LENGTH};
use crate::errors::{AppError, AppResult};
use crate::models::{Allergy, AllergySeverity, Elder, HealthCondition};
use crate::routes::extract::{Json, Path};
use crate::routes::{authenticate, created, elder_access, group_access, ok};
use crate::server::ServerResources;
use crate::validation::{sanitize_text, Validator};

/// UTC offsets in use worldwide, in minutes
const MIN_UTC_OFFSET_MINUTES: i32 = -12 * 60;
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Elder create or replace
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElderRequest {
    /// Name
    pub name: String,
    /// Date of birth
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    /// Local offset from UTC
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Free-text notes
    #[serde(default)]
    pub notes: Option<String>,
}

/// New allergy
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllergyRequest {
    /// Substance
    pub allergen: String,
    /// Observed reaction
    #[serde(default)]
    pub reaction: Option<String>,
    /// Severity
    pub severity: AllergySeverity,
}

/// New health condition
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRequest {
    /// Condition name
    pub name: String,
    /// Diagnosis date
    #[serde(default)]
    pub diagnosed_on: Option<NaiveDate>,
    /// Notes
    #[serde(default)]
    pub notes: Option<String>,
}

fn clean_optional(text: Option<&str>) -> Option<String> {
    text.map(|t| sanitize_text(t, MAX_TEXT_LENGTH))
        .filter(|t| !t.is_empty())
}

impl ElderRequest {
    /// Validated fields: name, offset, notes
    fn validate(&self) -> AppResult<(String, i32, Option<String>)> {
        let mut validator = Validator::new();
        let name = validator.name("name", &self.name);
        if !(MIN_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&self.utc_offset_minutes) {
            validator.add("utcOffsetMinutes", "Offset must be between -720 and 840 minutes");
        }
        if let Some(dob) = self.date_of_birth {
            validator.date("dateOfBirth", dob);
        }
        if self.date_of_birth.is_some_and(|dob| dob > Utc::now().date_naive()) {
            validator.add("dateOfBirth", "Date of birth cannot be in the future");
        }
        validator.finish()?;
        let name = name.ok_or_else(|| AppError::invalid_input("Invalid name"))?;
        Ok((name, self.utc_offset_minutes, clean_optional(self.notes.as_deref())))
    }
}

/// Elder routes
pub struct ElderRoutes;

impl ElderRoutes {
    /// Create all elder routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/groups/:group_id/elders",
                get(Self::handle_list_elders).post(Self::handle_create_elder),
            )
            .route(
                "/api/elders/:elder_id",
                get(Self::handle_get_elder)
                    .put(Self::handle_update_elder)
                    .delete(Self::handle_delete_elder),
            )
            .route(
                "/api/elders/:elder_id/allergies",
                get(Self::handle_list_allergies).post(Self::handle_add_allergy),
            )
            .route(
                "/api/elders/:elder_id/conditions",
                get(Self::handle_list_conditions).post(Self::handle_add_condition),
            )
            .with_state(resources)
    }

    async fn handle_list_elders(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(group_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (group, _) = group_access(&resources, auth.user_id, group_id).await?;
        Ok(ok(resources.database.list_elders(group.id).await?))
    }

    async fn handle_create_elder(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(group_id): Path<Uuid>,
        Json(request): Json<ElderRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (group, access) = group_access(&resources, auth.user_id, group_id).await?;
        access.require(AccessLevel::Admin, "Group")?;
        let (name, utc_offset_minutes, notes) = request.validate()?;

        let limit = group.subscription_tier.max_elders();
        if resources.database.count_elders(group.id).await? >= limit {
            return Err(AppError::tier_limit(format!(
                "This group has reached its limit of {limit} elders"
            )));
        }

        let elder = Elder {
            id: Uuid::new_v4(),
            group_id: group.id,
            name,
            date_of_birth: request.date_of_birth,
            utc_offset_minutes,
            notes,
            created_at: Utc::now(),
        };
        resources.database.create_elder(&elder).await?;
        info!(elder_id = %elder.id, group_id = %group.id, "Elder created");
        Ok(created(elder))
    }

    async fn handle_get_elder(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (elder, _, access) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Read).await?;
        let age = elder.age_on(Utc::now().date_naive());
        Ok(ok(json!({ "elder": elder, "age": age, "access": access })))
    }

    async fn handle_update_elder(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
        Json(request): Json<ElderRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (mut elder, _, _) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Write).await?;
        let (name, utc_offset_minutes, notes) = request.validate()?;

        elder.name = name;
        elder.date_of_birth = request.date_of_birth;
        elder.utc_offset_minutes = utc_offset_minutes;
        elder.notes = notes;
        resources.database.update_elder(&elder).await?;
        Ok(ok(elder))
    }

    async fn handle_delete_elder(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (elder, _, _) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Admin).await?;
        resources.database.delete_elder(elder.id).await?;
        info!(elder_id = %elder.id, "Elder deleted");
        Ok(ok(json!({ "deleted": elder.id })))
    }

    async fn handle_list_allergies(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (elder, _, _) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Read).await?;
        Ok(ok(resources.database.list_allergies(elder.id).await?))
    }

    async fn handle_add_allergy(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
        Json(request): Json<AllergyRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (elder, _, _) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Write).await?;

        let mut validator = Validator::new();
        validator
            .required("allergen", &request.allergen)
            .max_length("allergen", &request.allergen, MAX_NAME_LENGTH);
        validator.finish()?;

        let allergy = Allergy {
            id: Uuid::new_v4(),
            elder_id: elder.id,
            allergen: sanitize_text(&request.allergen, MAX_NAME_LENGTH),
            reaction: clean_optional(request.reaction.as_deref()),
            severity: request.severity,
            created_at: Utc::now(),
        };
        resources.database.add_allergy(&allergy).await?;
        Ok(created(allergy))
    }

    async fn handle_list_conditions(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (elder, _, _) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Read).await?;
        Ok(ok(resources.database.list_health_conditions(elder.id).await?))
    }

    async fn handle_add_condition(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
        Json(request): Json<ConditionRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (elder, _, _) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Write).await?;

        let mut validator = Validator::new();
        validator
            .required("name", &request.name)
            .max_length("name", &request.name, MAX_NAME_LENGTH);
        if let Some(diagnosed_on) = request.diagnosed_on {
            validator.date("diagnosedOn", diagnosed_on);
        }
        validator.finish()?;

        let condition = HealthCondition {
            id: Uuid::new_v4(),
            elder_id: elder.id,
            name: sanitize_text(&request.name, MAX_NAME_LENGTH),
            diagnosed_on: request.diagnosed_on,
            notes: clean_optional(request.notes.as_deref()),
            created_at: Utc::now(),
        };
        resources.database.add_health_condition(&condition).await?;
        Ok(created(condition))
    }
}
