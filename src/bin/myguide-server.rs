// ABOUTME: MyGuide HTTP server binary
// ABOUTME: Loads configuration from the environment, starts maintenance and serves the REST API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! ## Usage
//!
//! ```bash
//! # Configuration comes from environment variables (HTTP_PORT, DATABASE_URL, ...)
//! cargo run --bin myguide-server
//!
//! # Override the listen address
//! cargo run --bin myguide-server -- --host 127.0.0.1 --port 9000
//! ```

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use myguide_server::config::ServerConfig;
use myguide_server::errors::AppResult;
use myguide_server::logging;
use myguide_server::server::{run, ServerResources};

#[derive(Parser)]
#[command(
    name = "myguide-server",
    about = "MyGuide care coordination API server",
    version
)]
struct Args {
    /// Listen host override
    #[arg(long)]
    host: Option<String>,

    /// Listen port override
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = Args::parse();
    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(host) = args.host {
        config.http_host = host;
    }
    if let Some(port) = args.port {
        config.http_port = port;
    }

    info!(
        environment = ?config.environment,
        host = %config.http_host,
        port = config.http_port,
        "Starting MyGuide server"
    );
    let resources = Arc::new(ServerResources::new(config).await?);
    run(resources).await
}
