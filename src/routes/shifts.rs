// ABOUTME: Shift route handlers for agency scheduling, confirmation transitions and offer cascades
// ABOUTME: Handlers resolve the acting user and delegate the workflow to the shift service
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! Shift routes
//!
//! Only agency staff can see a shift. Owners and admins create, assign, offer,
//! complete and cancel; the assigned caregiver confirms or declines. A confirm
//! from anyone else on the staff is an owner confirmation.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::care::shifts::ShiftAction;
use crate::constants::doses::MAX_LOG_WINDOW_DAYS;
use crate::constants::limits::MAX_TEXT_LENGTH;
use crate::errors::{AppError, AppResult};
use crate::models::{AgencyMember, ScheduledShift, ShiftStatus};
use crate::routes::extract::{Json, Path, Query};
use crate::routes::{authenticate, created, ok};
use crate::server::ServerResources;
use crate::validation::{day_window, require_date, sanitize_text, WindowAnchor};

/// Default span of the agency shift listing
const DEFAULT_SHIFT_WINDOW_DAYS: i64 = 14;

/// New shift
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShiftRequest {
    /// Elder receiving care
    pub elder_id: Uuid,
    /// Elder-local date
    pub date: NaiveDate,
    /// Elder-local start
    pub start_time: NaiveTime,
    /// Elder-local end
    pub end_time: NaiveTime,
    /// Caregiver to assign straight away
    #[serde(default)]
    pub caregiver_id: Option<Uuid>,
    /// Instructions
    #[serde(default)]
    pub notes: Option<String>,
}

/// Assignment body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    /// Caregiver receiving the shift
    pub caregiver_id: Uuid,
}

/// Offer cascade body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRequest {
    /// Candidates in the order they should be asked
    pub caregiver_ids: Vec<Uuid>,
}

/// Listing window
#[derive(Debug, Default, Deserialize)]
pub struct ShiftWindowQuery {
    /// First date
    pub from: Option<NaiveDate>,
    /// Last date
    pub to: Option<NaiveDate>,
}

/// Shift routes
pub struct ShiftRoutes;

impl ShiftRoutes {
    /// Create all shift routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/agencies/:agency_id/shifts",
                get(Self::handle_list_shifts).post(Self::handle_create_shift),
            )
            .route("/api/caregiver/shifts", get(Self::handle_my_shifts))
            .route("/api/shifts/:shift_id", get(Self::handle_get_shift))
            .route("/api/shifts/:shift_id/assign", post(Self::handle_assign))
            .route("/api/shifts/:shift_id/confirm", post(Self::handle_confirm))
            .route("/api/shifts/:shift_id/decline", post(Self::handle_decline))
            .route("/api/shifts/:shift_id/complete", post(Self::handle_complete))
            .route("/api/shifts/:shift_id/cancel", post(Self::handle_cancel))
            .route(
                "/api/shifts/:shift_id/offers",
                get(Self::handle_list_offers).post(Self::handle_start_offers),
            )
            .route("/api/offers/:offer_id/accept", post(Self::handle_accept_offer))
            .route("/api/offers/:offer_id/decline", post(Self::handle_decline_offer))
            .with_state(resources)
    }

    async fn staff(
        resources: &ServerResources,
        agency_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<AgencyMember> {
        resources
            .database
            .get_agency_member(agency_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Agency"))
    }

    fn require_manager(member: &AgencyMember) -> AppResult<()> {
        if member.role.can_manage() {
            Ok(())
        } else {
            Err(AppError::permission_denied(
                "Only agency owners and admins can manage shifts",
            ))
        }
    }

    /// The shift, visible only to its agency's staff
    async fn visible_shift(
        resources: &ServerResources,
        shift_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<(ScheduledShift, AgencyMember)> {
        let shift = resources
            .database
            .get_shift(shift_id)
            .await?
            .ok_or_else(|| AppError::not_found("Shift"))?;
        let member = resources
            .database
            .get_agency_member(shift.agency_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Shift"))?;
        Ok((shift, member))
    }

    async fn handle_list_shifts(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(agency_id): Path<Uuid>,
        Query(query): Query<ShiftWindowQuery>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        Self::staff(&resources, agency_id, auth.user_id).await?;

        let (from, to) = day_window(
            query.from,
            query.to,
            WindowAnchor::StartingAt(Utc::now().date_naive()),
            DEFAULT_SHIFT_WINDOW_DAYS,
            MAX_LOG_WINDOW_DAYS,
        )?;
        let shifts = resources
            .database
            .list_agency_shifts(agency_id, from, to)
            .await?;
        Ok(ok(json!({ "from": from, "to": to, "shifts": shifts })))
    }

    #[instrument(skip(resources, headers, request), fields(route = "create_shift"))]
    async fn handle_create_shift(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(agency_id): Path<Uuid>,
        Json(request): Json<CreateShiftRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let member = Self::staff(&resources, agency_id, auth.user_id).await?;
        Self::require_manager(&member)?;

        require_date("date", request.date)?;
        if request.end_time <= request.start_time {
            return Err(AppError::invalid_input("endTime must be after startTime"));
        }
        let elder = resources
            .database
            .get_elder(request.elder_id)
            .await?
            .ok_or_else(|| AppError::not_found("Elder"))?;
        let served = resources
            .database
            .list_agency_groups(agency_id)
            .await?
            .iter()
            .any(|group| group.id == elder.group_id);
        if !served {
            return Err(AppError::not_found("Elder"));
        }

        let now = Utc::now();
        let draft = ScheduledShift {
            id: Uuid::new_v4(),
            agency_id,
            elder_id: elder.id,
            caregiver_id: None,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            status: ShiftStatus::Open,
            notification_id: None,
            notes: request
                .notes
                .as_deref()
                .map(|n| sanitize_text(n, MAX_TEXT_LENGTH))
                .filter(|n| !n.is_empty()),
            created_by: auth.user_id,
            created_at: now,
            updated_at: now,
        };
        let shift = resources
            .shift_workflow
            .create(draft, request.caregiver_id, now)
            .await?;
        Ok(created(shift))
    }

    async fn handle_my_shifts(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<ShiftWindowQuery>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let from = require_date("from", query.from.unwrap_or_else(|| Utc::now().date_naive()))?;
        Ok(ok(resources
            .database
            .list_caregiver_shifts(auth.user_id, from)
            .await?))
    }

    async fn handle_get_shift(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(shift_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (shift, _) = Self::visible_shift(&resources, shift_id, auth.user_id).await?;
        Ok(ok(shift))
    }

    async fn apply(
        resources: &ServerResources,
        shift_id: Uuid,
        action: ShiftAction,
        actor_id: Uuid,
    ) -> Result<Response, AppError> {
        let shift = resources
            .shift_workflow
            .transition(shift_id, action, actor_id, Utc::now())
            .await?;
        Ok(ok(shift))
    }

    async fn handle_assign(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(shift_id): Path<Uuid>,
        Json(request): Json<AssignRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let action = ShiftAction::Assign {
            caregiver_id: request.caregiver_id,
        };
        Self::apply(&resources, shift_id, action, auth.user_id).await
    }

    async fn handle_confirm(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(shift_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (shift, _) = Self::visible_shift(&resources, shift_id, auth.user_id).await?;
        let action = if shift.caregiver_id == Some(auth.user_id) {
            ShiftAction::CaregiverConfirm
        } else {
            ShiftAction::OwnerConfirm
        };
        Self::apply(&resources, shift_id, action, auth.user_id).await
    }

    async fn handle_decline(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(shift_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        Self::apply(&resources, shift_id, ShiftAction::CaregiverDecline, auth.user_id).await
    }

    async fn handle_complete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(shift_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        Self::apply(&resources, shift_id, ShiftAction::Complete, auth.user_id).await
    }

    async fn handle_cancel(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(shift_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        Self::apply(&resources, shift_id, ShiftAction::Cancel, auth.user_id).await
    }

    async fn handle_list_offers(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(shift_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (shift, member) = Self::visible_shift(&resources, shift_id, auth.user_id).await?;
        Self::require_manager(&member)?;
        Ok(ok(resources.database.list_shift_offers(shift.id).await?))
    }

    #[instrument(skip(resources, headers, request), fields(route = "start_offers"))]
    async fn handle_start_offers(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(shift_id): Path<Uuid>,
        Json(request): Json<OfferRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let offers = resources
            .shift_workflow
            .start_offers(shift_id, &request.caregiver_ids, auth.user_id, Utc::now())
            .await?;
        Ok(created(offers))
    }

    async fn handle_accept_offer(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(offer_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let shift = resources
            .shift_workflow
            .accept_offer(offer_id, auth.user_id, Utc::now())
            .await?;
        Ok(ok(shift))
    }

    async fn handle_decline_offer(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(offer_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let next = resources
            .shift_workflow
            .decline_offer(offer_id, auth.user_id, Utc::now())
            .await?;
        Ok(ok(json!({ "declined": offer_id, "nextOffer": next })))
    }
}
