// ABOUTME: SQLite database management with embedded migrations and field encryption
// ABOUTME: Database handle, AES-256-GCM helpers, HMAC lookup hashes and row parsing utilities
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # Database
//!
//! A single [`Database`] handle wraps the `sqlx` pool. Entity operations live
//! in submodules as additional `impl Database` blocks. Identifiers are stored
//! as UUID text and instants as fixed-width RFC 3339 UTC strings, so string
//! comparison in SQL matches chronological order.

/// Agencies and agency membership
pub mod agencies;
/// Daily AI request counters
pub mod ai_usage;
/// Security audit trail
pub mod audit;
/// AI consent records
pub mod consent;
/// Diet entries
pub mod diet;
/// Elder documents and summaries
pub mod documents;
/// Cached FDA drug labels
pub mod drug_labels;
/// Elders, allergies and conditions
pub mod elders;
/// Groups, members and invite codes
pub mod groups;
/// User notifications
pub mod notifications;
/// Regimen items and dose logs
pub mod regimen;
/// Scheduled shifts and shift offers
pub mod shifts;
/// Users and account deletion
pub mod users;

use std::path::Path;
use std::str::FromStr;

use base64::engine::general_purpose;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::info;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Database connection pool with encryption support
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    encryption_key: Vec<u8>,
}

impl Database {
    /// Connect, create the file if needed and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The URL is malformed
    /// - The parent directory or file cannot be created
    /// - Connecting or migrating fails
    pub async fn new(database_url: &str, encryption_key: Vec<u8>) -> AppResult<Self> {
        if encryption_key.len() != 32 {
            return Err(AppError::config("Encryption key must be 32 bytes"));
        }

        let in_memory = database_url.contains(":memory:");
        if !in_memory {
            ensure_parent_dir(database_url).await?;
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::config(format!("Invalid database URL: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Each in-memory connection is a separate database
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        let db = Self {
            pool,
            encryption_key,
        };
        db.migrate().await?;
        Ok(db)
    }

    /// Get a reference to the database pool
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run all pending migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any migration fails.
    pub async fn migrate(&self) -> AppResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Round-trip a trivial query
    ///
    /// # Errors
    ///
    /// Returns a database error if the pool cannot serve a query.
    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Health check failed: {e}")))?;
        Ok(())
    }

    /// Encrypt with AES-256-GCM, binding the ciphertext to `aad_context`
    ///
    /// Output is base64 of `nonce || ciphertext || tag`.
    ///
    /// # Errors
    ///
    /// Returns an error if nonce generation or sealing fails.
    pub fn encrypt_data(&self, data: &str, aad_context: &str) -> AppResult<String> {
        let rng = SystemRandom::new();
        let mut nonce_bytes = [0u8; 12];
        rng.fill(&mut nonce_bytes)
            .map_err(|e| AppError::internal(format!("Failed to generate nonce: {e}")))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let key = self.aead_key()?;
        let mut data_bytes = data.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, Aad::from(aad_context.as_bytes()), &mut data_bytes)
            .map_err(|e| AppError::internal(format!("Failed to encrypt data: {e}")))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(data_bytes);
        Ok(general_purpose::STANDARD.encode(combined))
    }

    /// Decrypt data produced by [`Self::encrypt_data`] with the same context
    ///
    /// # Errors
    ///
    /// Returns an error if the data is malformed, tampered with, or was
    /// encrypted under a different context.
    pub fn decrypt_data(&self, encrypted_data: &str, aad_context: &str) -> AppResult<String> {
        let combined = general_purpose::STANDARD
            .decode(encrypted_data)
            .map_err(|e| AppError::internal(format!("Failed to decode base64: {e}")))?;
        if combined.len() < 12 {
            return Err(AppError::internal("Invalid encrypted data: too short"));
        }

        let (nonce_bytes, encrypted_bytes) = combined.split_at(12);
        let nonce = Nonce::assume_unique_for_key(
            nonce_bytes
                .try_into()
                .map_err(|e| AppError::internal(format!("Invalid nonce size: {e}")))?,
        );

        let key = self.aead_key()?;
        let mut buffer = encrypted_bytes.to_vec();
        let decrypted = key
            .open_in_place(nonce, Aad::from(aad_context.as_bytes()), &mut buffer)
            .map_err(|e| {
                AppError::internal(format!(
                    "Decryption failed (context mismatch or tampered data): {e:?}"
                ))
            })?;

        String::from_utf8(decrypted.to_vec()).map_err(|e| {
            AppError::internal(format!("Failed to convert decrypted data to string: {e}"))
        })
    }

    /// Deterministic HMAC-SHA256 of `value` for equality lookups
    #[must_use]
    pub fn hash_for_lookup(&self, value: &str) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, &self.encryption_key);
        let tag = hmac::sign(&key, value.as_bytes());
        general_purpose::STANDARD.encode(tag.as_ref())
    }

    fn aead_key(&self) -> AppResult<LessSafeKey> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.encryption_key)
            .map_err(|e| AppError::internal(format!("Failed to create encryption key: {e}")))?;
        Ok(LessSafeKey::new(unbound))
    }
}

async fn ensure_parent_dir(database_url: &str) -> AppResult<()> {
    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::database(format!(
                    "Failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
    }
    Ok(())
}

/// Fixed-width RFC 3339 form used for every stored instant
pub(crate) fn ts(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid stored timestamp '{raw}': {e}")))
}

pub(crate) fn parse_opt_ts(raw: Option<String>) -> AppResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_ts).transpose()
}

pub(crate) fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|e| AppError::database(format!("Invalid stored identifier '{raw}': {e}")))
}

pub(crate) fn parse_opt_id(raw: Option<String>) -> AppResult<Option<Uuid>> {
    raw.as_deref().map(parse_id).transpose()
}

pub(crate) fn parse_date(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| AppError::database(format!("Invalid stored date '{raw}': {e}")))
}

pub(crate) fn parse_opt_date(raw: Option<String>) -> AppResult<Option<NaiveDate>> {
    raw.as_deref().map(parse_date).transpose()
}

pub(crate) fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub(crate) fn parse_time(raw: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|e| AppError::database(format!("Invalid stored time '{raw}': {e}")))
}

pub(crate) fn parse_stored<T>(raw: &str) -> AppResult<T>
where
    T: FromStr<Err = AppError>,
{
    raw.parse()
        .map_err(|e: AppError| AppError::database(format!("Invalid stored value: {}", e.message)))
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db_error| db_error.is_unique_violation())
}
