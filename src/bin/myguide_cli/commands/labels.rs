// ABOUTME: Drug label cache command for myguide-cli
// ABOUTME: Refetches cached openFDA labels older than a cutoff
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::Utc;
use tracing::info;

use myguide_server::errors::AppResult;
use myguide_server::server::ServerResources;

/// Refresh stale labels
pub async fn refresh(resources: &ServerResources, max_age_days: Option<i64>) -> AppResult<()> {
    let max_age_days = max_age_days.unwrap_or(resources.config.care.label_max_age_days);
    let refreshed = resources
        .fda_client
        .refresh_stale(&resources.database, Utc::now(), max_age_days)
        .await?;
    info!(refreshed, max_age_days, "Label refresh finished");
    println!("Refreshed {refreshed} labels");
    Ok(())
}
