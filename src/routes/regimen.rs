// ABOUTME: Regimen route handlers for medications, supplements, dose logging, due tasks and compliance
// ABOUTME: Also serves the per-elder interaction check over the elder's current medications
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! Regimen routes
//!
//! Medications and supplements share one table distinguished by `kind`; the
//! path picks the kind. Dose logs are keyed by the UTC instant of the
//! scheduled dose, which must be one the item actually schedules.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::Router;
use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::care::permissions::AccessLevel;
use crate::care::{compliance, interactions, tasks};
use crate::constants::compliance::TREND_PERIOD_DAYS;
use crate::constants::doses::{
    DEFAULT_LOG_WINDOW_DAYS, DUE_WINDOW_MINUTES, LATE_THRESHOLD_MINUTES, MAX_LOG_WINDOW_DAYS,
};
use crate::constants::limits::{MAX_NAME_LENGTH, MAX_TEXT_LENGTH};
use crate::errors::{AppError, AppResult};
use crate::models::{DoseLog, DoseStatus, Elder, RegimenItem, RegimenKind};
use crate::routes::extract::{Json, Path, Query};
use crate::routes::insights::checked_medications;
use crate::routes::{authenticate, created, elder_access, ok};
use crate::server::ServerResources;
use crate::validation::{day_window, require_instant, sanitize_text, Validator, WindowAnchor};

/// Medication or supplement create/replace
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimenItemRequest {
    /// Name
    pub name: String,
    /// Dosage text, e.g. "10 mg"
    pub dosage: String,
    /// Elder-local dose times
    pub frequency: Vec<NaiveTime>,
    /// First day
    pub start_date: NaiveDate,
    /// Last day, open-ended when absent
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Instructions
    #[serde(default)]
    pub instructions: Option<String>,
}

/// A dose log
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseLogRequest {
    /// UTC instant of the scheduled dose
    pub scheduled_for: DateTime<Utc>,
    /// Outcome
    pub status: DoseStatus,
    /// Notes
    #[serde(default)]
    pub notes: Option<String>,
}

/// Date window query
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    /// First elder-local day
    pub from: Option<NaiveDate>,
    /// Last elder-local day
    pub to: Option<NaiveDate>,
}

/// Compliance query
#[derive(Debug, Default, Deserialize)]
pub struct ComplianceQuery {
    /// Window length ending today
    pub days: Option<i64>,
}

impl RegimenItemRequest {
    fn validate(&self) -> AppResult<()> {
        let mut validator = Validator::new();
        validator
            .required("name", &self.name)
            .max_length("name", &self.name, MAX_NAME_LENGTH)
            .required("dosage", &self.dosage)
            .max_length("dosage", &self.dosage, MAX_NAME_LENGTH);
        if self.frequency.is_empty() {
            validator.add("frequency", "At least one dose time is required");
        }
        validator.date("startDate", self.start_date);
        if let Some(end_date) = self.end_date {
            validator.date("endDate", end_date);
        }
        if self.end_date.is_some_and(|end| end < self.start_date) {
            validator.add("endDate", "End date cannot be before the start date");
        }
        validator.finish()
    }

    fn apply_to(&self, item: &mut RegimenItem) {
        let mut frequency = self.frequency.clone();
        frequency.sort_unstable();
        frequency.dedup();
        item.name = sanitize_text(&self.name, MAX_NAME_LENGTH);
        item.dosage = sanitize_text(&self.dosage, MAX_NAME_LENGTH);
        item.frequency = frequency;
        item.start_date = self.start_date;
        item.end_date = self.end_date;
        item.instructions = self
            .instructions
            .as_deref()
            .map(|text| sanitize_text(text, MAX_TEXT_LENGTH))
            .filter(|text| !text.is_empty());
    }
}

/// Store status for a log made at `logged_at`
///
/// Doses taken more than an hour after schedule are recorded as late.
#[must_use]
pub fn effective_status(
    requested: DoseStatus,
    scheduled_for: DateTime<Utc>,
    logged_at: DateTime<Utc>,
) -> DoseStatus {
    if requested == DoseStatus::Taken
        && logged_at > scheduled_for + Duration::minutes(LATE_THRESHOLD_MINUTES)
    {
        DoseStatus::Late
    } else {
        requested
    }
}

/// Whether `scheduled_for` is one of the item's doses for the elder
fn is_scheduled_dose(item: &RegimenItem, elder: &Elder, scheduled_for: DateTime<Utc>) -> bool {
    let day = tasks::local_date(elder.offset(), scheduled_for);
    tasks::scheduled_instants(item, elder.offset(), day).contains(&scheduled_for)
}

/// UTC bounds of elder-local days `from..=to`
fn day_bounds(
    elder: &Elder,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let after = to
        .checked_add_days(Days::new(1))
        .ok_or_else(|| AppError::invalid_input("The requested window is out of range"))?;
    let start = tasks::to_utc(elder.offset(), from, NaiveTime::MIN);
    let end = tasks::to_utc(elder.offset(), after, NaiveTime::MIN);
    Ok((start, end))
}

/// Regimen routes
pub struct RegimenRoutes;

impl RegimenRoutes {
    /// Create all regimen routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/elders/:elder_id/medications",
                get(Self::handle_list_medications).post(Self::handle_create_medication),
            )
            .route(
                "/api/elders/:elder_id/supplements",
                get(Self::handle_list_supplements).post(Self::handle_create_supplement),
            )
            .route(
                "/api/regimen/:item_id",
                put(Self::handle_update_item).delete(Self::handle_delete_item),
            )
            .route("/api/regimen/:item_id/logs", post(Self::handle_log_dose))
            .route("/api/elders/:elder_id/logs", get(Self::handle_list_logs))
            .route("/api/elders/:elder_id/tasks", get(Self::handle_due_tasks))
            .route("/api/elders/:elder_id/compliance", get(Self::handle_compliance))
            .route(
                "/api/elders/:elder_id/interactions",
                get(Self::handle_interactions),
            )
            .with_state(resources)
    }

    async fn load_item(
        resources: &ServerResources,
        user_id: Uuid,
        item_id: Uuid,
        needed: AccessLevel,
    ) -> AppResult<(RegimenItem, Elder)> {
        let item = resources
            .database
            .get_regimen_item(item_id)
            .await?
            .ok_or_else(|| AppError::not_found("Regimen item"))?;
        let (elder, _, _) = elder_access(resources, user_id, item.elder_id, needed).await?;
        Ok((item, elder))
    }

    async fn list_items(
        resources: &ServerResources,
        headers: &HeaderMap,
        elder_id: Uuid,
        kind: RegimenKind,
    ) -> AppResult<Response> {
        let auth = authenticate(resources, headers)?;
        let (elder, _, _) =
            elder_access(resources, auth.user_id, elder_id, AccessLevel::Read).await?;
        let items = resources
            .database
            .list_regimen_items(elder.id, Some(kind))
            .await?;
        Ok(ok(items))
    }

    async fn create_item(
        resources: &ServerResources,
        headers: &HeaderMap,
        elder_id: Uuid,
        kind: RegimenKind,
        request: RegimenItemRequest,
    ) -> AppResult<Response> {
        let auth = authenticate(resources, headers)?;
        let (elder, _, _) =
            elder_access(resources, auth.user_id, elder_id, AccessLevel::Write).await?;
        request.validate()?;

        let mut item = RegimenItem {
            id: Uuid::new_v4(),
            elder_id: elder.id,
            kind,
            name: String::new(),
            dosage: String::new(),
            frequency: Vec::new(),
            start_date: request.start_date,
            end_date: None,
            instructions: None,
            created_by: auth.user_id,
            created_at: Utc::now(),
        };
        request.apply_to(&mut item);
        resources.database.create_regimen_item(&item).await?;
        info!(item_id = %item.id, kind = %kind, "Regimen item created");
        Ok(created(item))
    }

    async fn handle_list_medications(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        Self::list_items(&resources, &headers, elder_id, RegimenKind::Medication).await
    }

    async fn handle_create_medication(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
        Json(request): Json<RegimenItemRequest>,
    ) -> Result<Response, AppError> {
        Self::create_item(&resources, &headers, elder_id, RegimenKind::Medication, request).await
    }

    async fn handle_list_supplements(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        Self::list_items(&resources, &headers, elder_id, RegimenKind::Supplement).await
    }

    async fn handle_create_supplement(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
        Json(request): Json<RegimenItemRequest>,
    ) -> Result<Response, AppError> {
        Self::create_item(&resources, &headers, elder_id, RegimenKind::Supplement, request).await
    }

    async fn handle_update_item(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(item_id): Path<Uuid>,
        Json(request): Json<RegimenItemRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (mut item, _) =
            Self::load_item(&resources, auth.user_id, item_id, AccessLevel::Write).await?;
        request.validate()?;
        request.apply_to(&mut item);
        resources.database.update_regimen_item(&item).await?;
        Ok(ok(item))
    }

    async fn handle_delete_item(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(item_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (item, _) =
            Self::load_item(&resources, auth.user_id, item_id, AccessLevel::Write).await?;
        resources.database.delete_regimen_item(item.id).await?;
        Ok(ok(json!({ "deleted": item.id })))
    }

    #[instrument(skip(resources, headers, request), fields(route = "log_dose"))]
    async fn handle_log_dose(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(item_id): Path<Uuid>,
        Json(request): Json<DoseLogRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (item, elder) =
            Self::load_item(&resources, auth.user_id, item_id, AccessLevel::Write).await?;

        require_instant("scheduledFor", request.scheduled_for)?;
        if !is_scheduled_dose(&item, &elder, request.scheduled_for) {
            return Err(AppError::invalid_input(
                "scheduledFor does not match a scheduled dose of this item",
            ));
        }
        let now = Utc::now();
        if request.status != DoseStatus::Skipped
            && request.scheduled_for - Duration::minutes(DUE_WINDOW_MINUTES) > now
        {
            return Err(AppError::invalid_input(
                "Only skipped can be logged before a dose is due",
            ));
        }

        let log = DoseLog {
            id: Uuid::new_v4(),
            item_id: item.id,
            elder_id: elder.id,
            scheduled_for: request.scheduled_for,
            status: effective_status(request.status, request.scheduled_for, now),
            logged_at: now,
            logged_by: auth.user_id,
            notes: request
                .notes
                .as_deref()
                .map(|text| sanitize_text(text, MAX_TEXT_LENGTH))
                .filter(|text| !text.is_empty()),
        };
        let stored = resources.database.upsert_dose_log(&log).await?;
        Ok(created(stored))
    }

    async fn handle_list_logs(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
        Query(query): Query<WindowQuery>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (elder, _, _) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Read).await?;

        let today = tasks::local_date(elder.offset(), Utc::now());
        let (from, to) = day_window(
            query.from,
            query.to,
            WindowAnchor::EndingAt(today),
            DEFAULT_LOG_WINDOW_DAYS,
            MAX_LOG_WINDOW_DAYS,
        )?;

        let (start, end) = day_bounds(&elder, from, to)?;
        let logs = resources.database.list_dose_logs(elder.id, start, end).await?;
        Ok(ok(json!({ "from": from, "to": to, "logs": logs })))
    }

    async fn handle_due_tasks(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (elder, _, _) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Read).await?;

        let now = Utc::now();
        let today = tasks::local_date(elder.offset(), now);
        let items = resources.database.list_regimen_items(elder.id, None).await?;
        let (start, end) = day_bounds(&elder, today, today)?;
        let logs = resources.database.list_dose_logs(elder.id, start, end).await?;

        let due = tasks::prioritize(tasks::build_due_tasks(
            &items,
            &logs,
            elder.offset(),
            now,
            today,
        ));
        Ok(ok(json!({ "date": today, "tasks": due })))
    }

    async fn handle_compliance(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
        Query(query): Query<ComplianceQuery>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (elder, _, _) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Read).await?;

        let days = query.days.unwrap_or(2 * TREND_PERIOD_DAYS);
        if !(1..=MAX_LOG_WINDOW_DAYS).contains(&days) {
            return Err(AppError::invalid_input(format!(
                "days must be between 1 and {MAX_LOG_WINDOW_DAYS}"
            )));
        }

        let now = Utc::now();
        let today = tasks::local_date(elder.offset(), now);
        let from = today - Duration::days(days - 1);
        let trend_start = today - Duration::days(2 * TREND_PERIOD_DAYS - 1);
        let (start, end) = day_bounds(&elder, from.min(trend_start), today)?;

        let items = resources.database.list_regimen_items(elder.id, None).await?;
        let logs = resources.database.list_dose_logs(elder.id, start, end).await?;
        let report = compliance::compute(&items, &logs, elder.offset(), from, today, today, now);
        Ok(ok(report))
    }

    async fn handle_interactions(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (elder, _, _) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Read).await?;

        let today = tasks::local_date(elder.offset(), Utc::now());
        let names: Vec<String> = resources
            .database
            .list_regimen_items(elder.id, Some(RegimenKind::Medication))
            .await?
            .into_iter()
            .filter(|item| item.is_active_on(today))
            .map(|item| item.name)
            .collect();
        let medications = checked_medications(&resources, &names).await?;
        let allergies = resources.database.list_allergies(elder.id).await?;
        let conditions: Vec<String> = resources
            .database
            .list_health_conditions(elder.id)
            .await?
            .into_iter()
            .map(|condition| condition.name)
            .collect();
        Ok(ok(interactions::check(&medications, &allergies, &conditions)))
    }
}
