// ABOUTME: Maintenance command for myguide-cli
// ABOUTME: Runs one scheduler pass outside the server process
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::Utc;

use myguide_server::errors::AppResult;
use myguide_server::server::ServerResources;

/// Run every maintenance task once and print the report as JSON
pub async fn run(resources: &ServerResources) -> AppResult<()> {
    let report = resources.maintenance_scheduler().run_once(Utc::now()).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
