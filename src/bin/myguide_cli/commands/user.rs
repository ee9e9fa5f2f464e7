// ABOUTME: User management commands for myguide-cli
// ABOUTME: Creates accounts with the same validation the signup endpoint applies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use tracing::{error, info};

use myguide_server::errors::{AppError, AppResult};
use myguide_server::models::{AuditEventType, User};
use myguide_server::server::ServerResources;
use myguide_server::validation::Validator;

/// Create a user account
pub async fn create(
    resources: &ServerResources,
    email: &str,
    password: &str,
    name: Option<String>,
) -> AppResult<()> {
    let display_name =
        name.unwrap_or_else(|| email.split('@').next().unwrap_or("User").to_owned());

    let mut validator = Validator::new();
    validator.email("email", email).password("password", password);
    let display_name = validator.name("name", &display_name);
    if let Err(e) = validator.finish() {
        for field in &e.field_errors {
            error!("{}: {}", field.field, field.message);
        }
        return Err(e);
    }
    let display_name = display_name.ok_or_else(|| AppError::invalid_input("Invalid name"))?;

    if resources
        .database
        .get_user_by_email(&email.trim().to_lowercase())
        .await?
        .is_some()
    {
        return Err(AppError::already_exists(format!("User {email}")));
    }

    let password_hash = resources.auth_manager.hash_password(password).await?;
    let user = User::new(email, password_hash, display_name, None);
    resources.database.create_user(&user).await?;
    resources
        .auditor
        .log_user_event(AuditEventType::UserSignup, user.id, "Created from the CLI")
        .await;

    info!(user_id = %user.id, email = %user.email, "User created");
    println!("Created user {} ({})", user.email, user.id);
    Ok(())
}
