// ABOUTME: openFDA drug label API client returning verbatim label sections
// ABOUTME: Labels are cached in the database and refetched once older than the refresh window

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! openFDA Drug Label Client
//!
//! Looks a medication up by brand or generic name on the openFDA
//! `/drug/label.json` endpoint and keeps the four sections used by the
//! interaction check. Section text is stored exactly as published.
//!
//! # API Reference
//! openFDA drug label API: <https://open.fda.gov/apis/drug/label/>
//!
//! # Example
//! ```rust,no_run
//! use myguide_server::external::fda_client::{FdaClient, FdaClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = FdaClient::new(FdaClientConfig::default());
//! let label = client.fetch_label("warfarin").await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::FdaDrugLabel;

const SERVICE: &str = "openFDA";

/// openFDA client configuration
#[derive(Debug, Clone)]
pub struct FdaClientConfig {
    /// Base URL (default: <https://api.fda.gov>)
    pub base_url: String,
    /// Optional API key; raises the upstream daily limit
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for FdaClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.fda.gov".to_owned(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    #[serde(default)]
    results: Vec<LabelResult>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenFdaFields {
    #[serde(default)]
    brand_name: Vec<String>,
    #[serde(default)]
    generic_name: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LabelResult {
    set_id: Option<String>,
    #[serde(default)]
    openfda: OpenFdaFields,
    #[serde(default)]
    boxed_warning: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    contraindications: Vec<String>,
    #[serde(default)]
    drug_interactions: Vec<String>,
}

fn joined(parts: Vec<String>) -> Option<String> {
    let text = parts.join("\n\n");
    (!text.trim().is_empty()).then_some(text)
}

fn into_label(name: &str, result: LabelResult, fetched_at: DateTime<Utc>) -> FdaDrugLabel {
    FdaDrugLabel {
        medication_key: FdaDrugLabel::key_for(name),
        brand_name: joined(result.openfda.brand_name),
        generic_name: result.openfda.generic_name.into_iter().next(),
        boxed_warning: joined(result.boxed_warning),
        warnings: joined(result.warnings),
        contraindications: joined(result.contraindications),
        drug_interactions: joined(result.drug_interactions),
        source_id: result.set_id,
        fetched_at,
    }
}

/// Strip characters that would break the openFDA search syntax
fn search_term(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-'))
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    (!cleaned.is_empty()).then_some(cleaned)
}

/// openFDA drug label client
#[derive(Clone)]
pub struct FdaClient {
    config: FdaClientConfig,
    http_client: Client,
}

impl FdaClient {
    /// Create a client
    #[must_use]
    pub fn new(config: FdaClientConfig) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            config,
            http_client,
        }
    }

    /// Fetch the best-matching label for a medication name
    ///
    /// Returns `None` when openFDA has no label for the name.
    ///
    /// # Errors
    ///
    /// Returns an external-service error if the request fails or the
    /// response cannot be parsed.
    #[instrument(skip(self), fields(service = SERVICE))]
    pub async fn fetch_label(&self, name: &str) -> AppResult<Option<FdaDrugLabel>> {
        let Some(term) = search_term(name) else {
            return Err(AppError::invalid_input("Medication name cannot be empty"));
        };
        let search = format!("openfda.brand_name:\"{term}\" openfda.generic_name:\"{term}\"");

        let url = format!("{}/drug/label.json", self.config.base_url);
        let mut request = self
            .http_client
            .get(&url)
            .query(&[("search", search.as_str()), ("limit", "1")]);
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("api_key", key.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::external_service(SERVICE, e.to_string()))?;

        // openFDA answers 404 for a search with no matches
        if response.status() == StatusCode::NOT_FOUND {
            debug!(medication = %name, "No openFDA label found");
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::external_service(
                SERVICE,
                format!("Label request failed with HTTP {status}"),
            ));
        }

        let body: LabelResponse = response
            .json()
            .await
            .map_err(|e| AppError::external_service(SERVICE, format!("JSON parse error: {e}")))?;

        Ok(body
            .results
            .into_iter()
            .next()
            .map(|result| into_label(name, result, Utc::now())))
    }

    /// Cached label for `name`, refetching when missing or stale
    ///
    /// A stale label is still returned if the refetch fails, so a flaky
    /// upstream degrades to older text instead of no text.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be read or written, or if the
    /// fetch fails and nothing is cached.
    pub async fn get_or_fetch(
        &self,
        database: &Database,
        name: &str,
        now: DateTime<Utc>,
        max_age_days: i64,
    ) -> AppResult<Option<FdaDrugLabel>> {
        let cached = database.get_drug_label(name).await?;
        if let Some(label) = &cached {
            if !label.is_stale(now, max_age_days) {
                return Ok(cached);
            }
        }

        match self.fetch_label(name).await {
            Ok(Some(label)) => {
                database.upsert_drug_label(&label).await?;
                Ok(Some(label))
            }
            Ok(None) => Ok(cached),
            Err(e) if cached.is_some() => {
                warn!(medication = %name, error = %e, "Label refresh failed; serving stale copy");
                Ok(cached)
            }
            Err(e) => Err(e),
        }
    }

    /// Refetch every label older than `max_age_days`
    ///
    /// Returns the number of labels refreshed. Individual failures are logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the stale keys cannot be listed.
    pub async fn refresh_stale(
        &self,
        database: &Database,
        now: DateTime<Utc>,
        max_age_days: i64,
    ) -> AppResult<usize> {
        let cutoff = now - chrono::Duration::days(max_age_days);
        let keys = database.list_stale_label_keys(cutoff).await?;
        let mut refreshed = 0;
        for key in keys {
            match self.fetch_label(&key).await {
                Ok(Some(label)) => {
                    database.upsert_drug_label(&label).await?;
                    refreshed += 1;
                }
                Ok(None) => debug!(medication = %key, "Label no longer published"),
                Err(e) => warn!(medication = %key, error = %e, "Label refresh failed"),
            }
        }
        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_term_strips_query_syntax() {
        assert_eq!(search_term("  Tylenol  PM "), Some("Tylenol PM".to_owned()));
        assert_eq!(search_term("war\"farin:+"), Some("warfarin".to_owned()));
        assert_eq!(search_term("\"\""), None);
    }

    #[test]
    fn label_keeps_sections_verbatim() {
        let raw = r#"{
            "results": [{
                "set_id": "abc-123",
                "openfda": {"brand_name": ["Coumadin"], "generic_name": ["WARFARIN SODIUM"]},
                "drug_interactions": ["Aspirin may increase bleeding risk.", "Avoid NSAIDs."],
                "warnings": []
            }]
        }"#;
        let body: LabelResponse = serde_json::from_str(raw).unwrap();
        let result = body.results.into_iter().next().unwrap();
        let label = into_label("Coumadin ", result, Utc::now());

        assert_eq!(label.medication_key, "coumadin");
        assert_eq!(label.generic_name.as_deref(), Some("WARFARIN SODIUM"));
        assert_eq!(
            label.drug_interactions.as_deref(),
            Some("Aspirin may increase bleeding risk.\n\nAvoid NSAIDs.")
        );
        assert!(label.warnings.is_none());
        assert_eq!(label.source_id.as_deref(), Some("abc-123"));
    }

    #[tokio::test]
    async fn fresh_cache_hit_skips_the_network() {
        let database = Database::new("sqlite::memory:", vec![3u8; 32]).await.unwrap();
        let label = FdaDrugLabel {
            medication_key: "warfarin".to_owned(),
            brand_name: None,
            generic_name: Some("warfarin".to_owned()),
            boxed_warning: None,
            warnings: Some("Bleeding risk".to_owned()),
            contraindications: None,
            drug_interactions: None,
            source_id: None,
            fetched_at: Utc::now(),
        };
        database.upsert_drug_label(&label).await.unwrap();

        // Unroutable base URL: any network call would fail
        let client = FdaClient::new(FdaClientConfig {
            base_url: "http://127.0.0.1:9".to_owned(),
            api_key: None,
            timeout_secs: 1,
        });
        let found = client
            .get_or_fetch(&database, "Warfarin", Utc::now(), 30)
            .await
            .unwrap();
        assert_eq!(found.unwrap().warnings.as_deref(), Some("Bleeding risk"));
    }
}
