// ABOUTME: Consent-gated health insight routes: ad-hoc interaction checks and AI chat with daily quota
// ABOUTME: Also serves cached openFDA drug labels, fetching on a miss
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! Insight routes
//!
//! Every AI or medical-check endpoint passes the consent gate first. AI chat
//! additionally counts against the caller's daily quota, which comes from the
//! best subscription tier among the caller's groups.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::care::interactions::{self, CheckedMedication};
use crate::care::permissions::AccessLevel;
use crate::care::{consent, tasks};
use crate::constants::limits::{MAX_NAME_LENGTH, MAX_PROMPT_LENGTH};
use crate::constants::messages::AI_DISCLAIMER;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::external::{ChatMessage, ChatRequest};
use crate::models::{Elder, RegimenKind, SubscriptionTier};
use crate::rate_limiting::AiQuota;
use crate::routes::extract::{Json, Path};
use crate::routes::{authenticate, elder_access, ok};
use crate::server::ServerResources;
use crate::validation::sanitize_text;

/// Most medications accepted by one ad-hoc check
const MAX_CHECK_MEDICATIONS: usize = 20;

const CHAT_SYSTEM_PROMPT: &str = "You help family caregivers and care staff look after older adults. \
Answer plainly and briefly. Do not diagnose, do not change or recommend doses, and tell the user to \
contact a clinician or pharmacist for medical decisions. If the question describes an emergency, tell \
them to call emergency services.";

/// A medication in a check request, either a bare name or a regimen-style object
///
/// Only the name is searched; dosage, frequency and the like are accepted and ignored.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MedicationInput {
    /// `"Lisinopril"`
    Name(String),
    /// `{ "name": "Lisinopril", "dosage": "10mg", ... }`
    Detailed {
        /// Medication name
        name: String,
    },
}

impl MedicationInput {
    /// The medication name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Detailed { name } => name,
        }
    }
}

/// Ad-hoc interaction check
///
/// Unknown fields such as `userAge` are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationCheckRequest {
    /// Medications to check
    pub medications: Vec<MedicationInput>,
    /// Conditions to look for in contraindications
    #[serde(default)]
    pub health_conditions: Vec<String>,
    /// Elder whose allergies and conditions to include
    #[serde(default)]
    pub elder_id: Option<Uuid>,
}

/// AI chat question
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    /// Question
    pub message: String,
    /// Elder to include as context
    #[serde(default)]
    pub elder_id: Option<Uuid>,
}

/// AI chat answer
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAnswer {
    /// Model reply
    pub reply: String,
    /// Model that answered
    pub model: String,
    /// Fixed disclaimer
    pub disclaimer: &'static str,
    /// Quota after this request
    pub quota: AiQuota,
}

/// Labels for each medication name; lookups that fail count as unavailable
pub(crate) async fn checked_medications(
    resources: &ServerResources,
    names: &[String],
) -> AppResult<Vec<CheckedMedication>> {
    let now = Utc::now();
    let mut medications = Vec::with_capacity(names.len());
    for name in names {
        let label = match resources
            .fda_client
            .get_or_fetch(
                &resources.database,
                name,
                now,
                resources.config.care.label_max_age_days,
            )
            .await
        {
            Ok(label) => label,
            Err(e) if e.code == ErrorCode::ExternalServiceError => {
                warn!(medication = %name, error = %e, "Drug label unavailable");
                None
            }
            Err(e) => return Err(e),
        };
        medications.push(CheckedMedication {
            name: name.clone(),
            label,
        });
    }
    Ok(medications)
}

/// Deny unless the caller holds an active consent
pub(crate) async fn require_consent(
    resources: &ServerResources,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let latest = resources.database.get_latest_consent(user_id).await?;
    consent::require(latest.as_ref(), now)
}

/// Count one AI request against `tier` and reject it past the daily limit
pub(crate) async fn consume_ai_quota(
    resources: &ServerResources,
    user_id: Uuid,
    tier: SubscriptionTier,
    now: DateTime<Utc>,
) -> AppResult<AiQuota> {
    let used = resources
        .database
        .increment_ai_usage(user_id, now.date_naive())
        .await?;
    let quota = AiQuota::evaluate(tier, used, now);
    if quota.is_exceeded() {
        return Err(AppError::rate_limited(
            format!("Daily AI limit of {} requests reached", quota.limit),
            quota.retry_after_seconds(now),
        ));
    }
    Ok(quota)
}

/// Best tier among the caller's groups, `family` without any
pub(crate) async fn user_tier(
    resources: &ServerResources,
    user_id: Uuid,
) -> AppResult<SubscriptionTier> {
    Ok(resources
        .database
        .list_groups_for_user(user_id)
        .await?
        .into_iter()
        .map(|(group, _)| group.subscription_tier)
        .max()
        .unwrap_or(SubscriptionTier::Family))
}

/// Insight routes
pub struct InsightRoutes;

impl InsightRoutes {
    /// Create all insight routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/medication/check", post(Self::handle_medication_check))
            .route("/api/ai/chat", post(Self::handle_chat))
            .route("/api/drug-labels/:name", get(Self::handle_drug_label))
            .with_state(resources)
    }

    #[instrument(skip(resources, headers, request), fields(route = "medication_check"))]
    async fn handle_medication_check(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<MedicationCheckRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        require_consent(&resources, auth.user_id, Utc::now()).await?;

        let mut names: Vec<String> = Vec::new();
        for medication in &request.medications {
            let name = sanitize_text(medication.name(), MAX_NAME_LENGTH);
            if !name.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                names.push(name);
            }
        }
        if names.is_empty() || names.len() > MAX_CHECK_MEDICATIONS {
            return Err(AppError::invalid_input(format!(
                "Provide between 1 and {MAX_CHECK_MEDICATIONS} medication names"
            )));
        }

        let mut conditions: Vec<String> = request
            .health_conditions
            .iter()
            .map(|condition| sanitize_text(condition, MAX_NAME_LENGTH))
            .filter(|condition| !condition.is_empty())
            .collect();
        let allergies = match request.elder_id {
            Some(elder_id) => {
                let (elder, _, _) =
                    elder_access(&resources, auth.user_id, elder_id, AccessLevel::Read).await?;
                for condition in resources.database.list_health_conditions(elder.id).await? {
                    if !conditions.iter().any(|c| c.eq_ignore_ascii_case(&condition.name)) {
                        conditions.push(condition.name);
                    }
                }
                resources.database.list_allergies(elder.id).await?
            }
            None => Vec::new(),
        };

        let medications = checked_medications(&resources, &names).await?;
        Ok(ok(interactions::check(&medications, &allergies, &conditions)))
    }

    async fn elder_context(resources: &ServerResources, elder: &Elder) -> AppResult<String> {
        let today = tasks::local_date(elder.offset(), Utc::now());
        let medications: Vec<String> = resources
            .database
            .list_regimen_items(elder.id, Some(RegimenKind::Medication))
            .await?
            .into_iter()
            .filter(|item| item.is_active_on(today))
            .map(|item| format!("{} {}", item.name, item.dosage))
            .collect();
        let conditions: Vec<String> = resources
            .database
            .list_health_conditions(elder.id)
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();
        let allergies: Vec<String> = resources
            .database
            .list_allergies(elder.id)
            .await?
            .into_iter()
            .map(|a| a.allergen)
            .collect();

        let join = |items: &[String]| {
            if items.is_empty() {
                "none recorded".to_owned()
            } else {
                items.join(", ")
            }
        };
        Ok(format!(
            "Care recipient context. Age: {}. Current medications: {}. Conditions: {}. Allergies: {}.",
            elder
                .age_on(today)
                .map_or_else(|| "unknown".to_owned(), |age| age.to_string()),
            join(&medications),
            join(&conditions),
            join(&allergies),
        ))
    }

    #[instrument(skip(resources, headers, request), fields(route = "ai_chat"))]
    async fn handle_chat(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<ChatRequestBody>,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&resources, &headers)?;
        let now = Utc::now();
        require_consent(&resources, auth.user_id, now).await?;

        let message = sanitize_text(&request.message, MAX_PROMPT_LENGTH);
        if message.is_empty() {
            return Err(AppError::invalid_input("message is required"));
        }

        let mut messages = vec![ChatMessage::system(CHAT_SYSTEM_PROMPT)];
        let tier = match request.elder_id {
            Some(elder_id) => {
                let (elder, group, _) =
                    elder_access(&resources, auth.user_id, elder_id, AccessLevel::Read).await?;
                messages.push(ChatMessage::system(
                    Self::elder_context(&resources, &elder).await?,
                ));
                group.subscription_tier
            }
            None => user_tier(&resources, auth.user_id).await?,
        };
        messages.push(ChatMessage::user(message));

        let quota = consume_ai_quota(&resources, auth.user_id, tier, now).await?;
        let response = resources.llm.complete(&ChatRequest::new(messages)).await?;
        info!(
            provider = resources.llm.name(),
            model = %response.model,
            remaining = quota.remaining,
            "AI chat answered"
        );

        Ok(ok(ChatAnswer {
            reply: response.content,
            model: response.model,
            disclaimer: AI_DISCLAIMER,
            quota,
        }))
    }

    async fn handle_drug_label(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(name): Path<String>,
    ) -> Result<Response, AppError> {
        authenticate(&resources, &headers)?;
        let name = sanitize_text(&name, MAX_NAME_LENGTH);
        if name.is_empty() {
            return Err(AppError::invalid_input("Medication name is required"));
        }
        let label = resources
            .fda_client
            .get_or_fetch(
                &resources.database,
                &name,
                Utc::now(),
                resources.config.care.label_max_age_days,
            )
            .await?
            .ok_or_else(|| AppError::not_found("Drug label"))?;
        Ok(ok(label))
    }
}
