// ABOUTME: Operator command-line tool for the MyGuide server
// ABOUTME: Creates users, runs a maintenance pass and refreshes cached drug labels
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! ## Usage
//!
//! ```bash
//! myguide-cli user create --email ops@example.com --password 'change-me-now'
//! myguide-cli maintenance run
//! myguide-cli labels refresh --max-age-days 7
//! ```

mod commands;

use clap::{Parser, Subcommand};

use myguide_server::config::ServerConfig;
use myguide_server::errors::AppResult;
use myguide_server::logging;
use myguide_server::server::ServerResources;

#[derive(Parser)]
#[command(name = "myguide-cli", about = "MyGuide server administration", version)]
struct Cli {
    /// Database URL override
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// User accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Background maintenance
    Maintenance {
        #[command(subcommand)]
        action: MaintenanceAction,
    },
    /// Cached openFDA labels
    Labels {
        #[command(subcommand)]
        action: LabelsAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user account
    Create {
        /// Email address
        #[arg(long)]
        email: String,
        /// Password
        #[arg(long)]
        password: String,
        /// Display name, defaults to the email's local part
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum MaintenanceAction {
    /// Run one maintenance pass and print the report
    Run,
}

#[derive(Subcommand)]
enum LabelsAction {
    /// Refetch labels older than the cutoff
    Refresh {
        /// Age cutoff, defaults to the configured maximum
        #[arg(long)]
        max_age_days: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }
    let resources = ServerResources::new(config).await?;

    match cli.command {
        Command::User {
            action:
                UserAction::Create {
                    email,
                    password,
                    name,
                },
        } => commands::user::create(&resources, &email, &password, name).await,
        Command::Maintenance {
            action: MaintenanceAction::Run,
        } => commands::maintenance::run(&resources).await,
        Command::Labels {
            action: LabelsAction::Refresh { max_age_days },
        } => commands::labels::refresh(&resources, max_age_days).await,
    }
}
