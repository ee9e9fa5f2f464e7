// ABOUTME: Diet route handlers for meal logging, nutrition summaries and AI nutrition analysis
// ABOUTME: Analysis is consent-gated, counts against the group's AI quota and stores the estimate on the entry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::care::permissions::AccessLevel;
use crate::care::{nutrition, tasks};
use crate::constants::doses::{DEFAULT_LOG_WINDOW_DAYS, MAX_LOG_WINDOW_DAYS};
use crate::constants::limits::MAX_TEXT_LENGTH;
use crate::errors::{AppError, AppResult};
use crate::external::{ChatMessage, ChatRequest};
use crate::models::{DietEntry, Elder, MealType};
use crate::routes::extract::{Json, Path, Query};
use crate::routes::insights::{consume_ai_quota, require_consent};
use crate::routes::{authenticate, created, elder_access, ok};
use crate::server::ServerResources;
use crate::validation::{day_window, require_instant, sanitize_text, WindowAnchor};

/// New meal
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietEntryRequest {
    /// Meal type
    pub meal_type: MealType,
    /// What was eaten
    pub description: String,
    /// When; defaults to now
    #[serde(default)]
    pub eaten_at: Option<DateTime<Utc>>,
}

/// Date window query
#[derive(Debug, Default, Deserialize)]
pub struct DietWindowQuery {
    /// First elder-local day
    pub from: Option<NaiveDate>,
    /// Last elder-local day
    pub to: Option<NaiveDate>,
}

/// UTC bounds of the requested elder-local window
fn window(
    elder: &Elder,
    query: &DietWindowQuery,
) -> AppResult<(NaiveDate, NaiveDate, DateTime<Utc>, DateTime<Utc>)> {
    let today = tasks::local_date(elder.offset(), Utc::now());
    let (from, to) = day_window(
        query.from,
        query.to,
        WindowAnchor::EndingAt(today),
        DEFAULT_LOG_WINDOW_DAYS,
        MAX_LOG_WINDOW_DAYS,
    )?;
    let after = to
        .checked_add_days(Days::new(1))
        .ok_or_else(|| AppError::invalid_input("The requested window is out of range"))?;
    let start = tasks::to_utc(elder.offset(), from, NaiveTime::MIN);
    let end = tasks::to_utc(elder.offset(), after, NaiveTime::MIN);
    Ok((from, to, start, end))
}

/// Diet routes
pub struct DietRoutes;

impl DietRoutes {
    /// Create all diet routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/elders/:elder_id/diet",
                get(Self::handle_list_entries).post(Self::handle_create_entry),
            )
            .route("/api/elders/:elder_id/diet/summary", get(Self::handle_summary))
            .route("/api/diet/:entry_id/analyze", post(Self::handle_analyze))
            .with_state(resources)
    }

    async fn handle_list_entries(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
        Query(query): Query<DietWindowQuery>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (elder, _, _) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Read).await?;
        let (from, to, start, end) = window(&elder, &query)?;
        let entries = resources
            .database
            .list_diet_entries(elder.id, start, end)
            .await?;
        Ok(ok(json!({ "from": from, "to": to, "entries": entries })))
    }

    async fn handle_create_entry(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
        Json(request): Json<DietEntryRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (elder, _, _) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Write).await?;

        let description = sanitize_text(&request.description, MAX_TEXT_LENGTH);
        if description.is_empty() {
            return Err(AppError::invalid_input("description is required"));
        }
        let now = Utc::now();
        let eaten_at = require_instant("eatenAt", request.eaten_at.unwrap_or(now))?;
        if eaten_at > now + Duration::minutes(5) {
            return Err(AppError::invalid_input("eatenAt cannot be in the future"));
        }

        let entry = DietEntry {
            id: Uuid::new_v4(),
            elder_id: elder.id,
            meal_type: request.meal_type,
            description,
            eaten_at,
            logged_by: auth.user_id,
            analysis: None,
            created_at: now,
        };
        resources.database.create_diet_entry(&entry).await?;
        Ok(created(entry))
    }

    async fn handle_summary(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(elder_id): Path<Uuid>,
        Query(query): Query<DietWindowQuery>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let (elder, _, _) =
            elder_access(&resources, auth.user_id, elder_id, AccessLevel::Read).await?;
        let (from, to, start, end) = window(&elder, &query)?;
        let entries = resources
            .database
            .list_diet_entries(elder.id, start, end)
            .await?;
        let summary = nutrition::summarize(&entries, elder.offset());
        Ok(ok(json!({ "from": from, "to": to, "summary": summary })))
    }

    #[instrument(skip(resources, headers), fields(route = "analyze_diet"))]
    async fn handle_analyze(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(entry_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let mut entry = resources
            .database
            .get_diet_entry(entry_id)
            .await?
            .ok_or_else(|| AppError::not_found("Diet entry"))?;
        let (_, group, _) =
            elder_access(&resources, auth.user_id, entry.elder_id, AccessLevel::Write).await?;

        let now = Utc::now();
        require_consent(&resources, auth.user_id, now).await?;
        let quota = consume_ai_quota(&resources, auth.user_id, group.subscription_tier, now).await?;

        let prompt = nutrition::analysis_prompt(&entry.description, entry.meal_type.as_str());
        let response = resources
            .llm
            .complete(&ChatRequest::new(vec![ChatMessage::user(prompt)]).with_temperature(0.0))
            .await?;
        let analysis = nutrition::parse_analysis(&response.content, now)?;

        resources
            .database
            .set_diet_analysis(entry.id, &analysis)
            .await?;
        info!(entry_id = %entry.id, calories = analysis.calories, "Meal analyzed");
        entry.analysis = Some(analysis);

        Ok(ok(json!({ "entry": entry, "quota": quota })))
    }
}
