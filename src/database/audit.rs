// ABOUTME: Persistence for the security audit trail
// ABOUTME: Rows are append-only and survive account purges
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use sqlx::Row;
use uuid::Uuid;

use super::{parse_id, parse_opt_id, parse_stored, parse_ts, ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::AuditEvent;

impl Database {
    /// Append an audit event
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn store_audit_event(&self, event: &AuditEvent) -> AppResult<()> {
        let metadata = if event.metadata.is_null() {
            None
        } else {
            Some(serde_json::to_string(&event.metadata)?)
        };

        sqlx::query(
            r"
            INSERT INTO audit_events (id, event_type, severity, occurred_at, user_id, source_ip, description, resource, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(event.event_id.to_string())
        .bind(event.event_type.as_str())
        .bind(event.severity.as_str())
        .bind(ts(event.timestamp))
        .bind(event.user_id.map(|id| id.to_string()))
        .bind(&event.source_ip)
        .bind(&event.description)
        .bind(&event.resource)
        .bind(metadata)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to store audit event: {e}")))?;
        Ok(())
    }

    /// Most recent audit events for a user
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_audit_events_for_user(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> AppResult<Vec<AuditEvent>> {
        let rows = sqlx::query(
            r"
            SELECT id, event_type, severity, occurred_at, user_id, source_ip, description, resource, metadata
            FROM audit_events WHERE user_id = ?1
            ORDER BY occurred_at DESC LIMIT ?2
            ",
        )
        .bind(user_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list audit events: {e}")))?;

        rows.iter()
            .map(|row| {
                let metadata: Option<String> = row.get("metadata");
                Ok(AuditEvent {
                    event_id: parse_id(&row.get::<String, _>("id"))?,
                    event_type: parse_stored(&row.get::<String, _>("event_type"))?,
                    severity: parse_stored(&row.get::<String, _>("severity"))?,
                    timestamp: parse_ts(&row.get::<String, _>("occurred_at"))?,
                    user_id: parse_opt_id(row.get("user_id"))?,
                    source_ip: row.get("source_ip"),
                    description: row.get("description"),
                    resource: row.get("resource"),
                    metadata: metadata
                        .as_deref()
                        .map(serde_json::from_str)
                        .transpose()?
                        .unwrap_or(serde_json::Value::Null),
                })
            })
            .collect()
    }
}
