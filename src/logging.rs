// ABOUTME: Tracing subscriber setup for the server and CLI
// ABOUTME: EnvFilter from RUST_LOG with pretty or JSON output chosen by LOG_FORMAT
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use std::env;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{AppError, AppResult};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, coloured
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax)
    pub filter: String,
    /// Output format
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Read `RUST_LOG` and `LOG_FORMAT`
    #[must_use]
    pub fn from_env() -> Self {
        let filter = env::var("RUST_LOG").unwrap_or_else(|_| {
            "info,myguide_server=info,sqlx=warn,tower_http=info".to_owned()
        });
        let format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        Self { filter, format }
    }
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns an error if the filter is malformed or a subscriber is already set.
pub fn init(config: &LoggingConfig) -> AppResult<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| AppError::config(format!("Invalid log filter: {e}")))?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    };
    result.map_err(|e| AppError::config(format!("Failed to initialise logging: {e}")))
}

/// Install the global subscriber from environment variables
///
/// # Errors
///
/// See [`init`].
pub fn init_from_env() -> AppResult<()> {
    init(&LoggingConfig::from_env())
}
