// ABOUTME: Periodic maintenance: account purges, offer expiry, notification cleanup and consent reminders
// ABOUTME: Runs on a tokio interval; each task logs its own failures so one cannot block the others
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::CareConfig;
use crate::constants::consent::REMINDER_DAYS;
use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{AuditEventType, NotificationPriority, NotificationType, UserNotification};
use crate::notifications::NotificationService;
use crate::rate_limiting::AuthRateLimiter;
use crate::scheduling::ShiftWorkflow;
use crate::security::audit::SecurityAuditor;

/// What one maintenance pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    /// Accounts hard-deleted after their grace period
    pub accounts_purged: usize,
    /// Shift offers expired
    pub offers_expired: usize,
    /// Expired notifications removed
    pub notifications_removed: u64,
    /// Consent expiry reminders sent
    pub consent_reminders: usize,
    /// Idle rate-limit windows dropped
    pub rate_limit_keys_pruned: usize,
}

/// Background maintenance runner
pub struct MaintenanceScheduler {
    database: Arc<Database>,
    workflow: ShiftWorkflow,
    notifications: NotificationService,
    auditor: SecurityAuditor,
    rate_limiter: Option<Arc<AuthRateLimiter>>,
    care: CareConfig,
}

impl MaintenanceScheduler {
    /// Create a scheduler
    #[must_use]
    pub fn new(
        database: Arc<Database>,
        workflow: ShiftWorkflow,
        notifications: NotificationService,
        auditor: SecurityAuditor,
        care: CareConfig,
    ) -> Self {
        Self {
            database,
            workflow,
            notifications,
            auditor,
            rate_limiter: None,
            care,
        }
    }

    /// Also prune the auth rate limiter on each pass
    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<AuthRateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    /// Spawn the maintenance loop
    pub fn start(self: Arc<Self>) {
        let period = StdDuration::from_secs(self.care.maintenance_interval_secs.max(1));
        info!(
            "Starting maintenance scheduler - running every {} seconds",
            period.as_secs()
        );
        tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                let report = self.run_once(Utc::now()).await;
                if report != MaintenanceReport::default() {
                    info!(?report, "Maintenance pass completed");
                }
            }
        });
    }

    /// Run every maintenance task once
    pub async fn run_once(&self, now: DateTime<Utc>) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match self.purge_due_accounts(now).await {
            Ok(count) => report.accounts_purged = count,
            Err(e) => error!("Account purge failed: {}", e),
        }
        match self.workflow.expire_lapsed(now).await {
            Ok(count) => report.offers_expired = count,
            Err(e) => error!("Offer expiry failed: {}", e),
        }
        match self.database.delete_expired_notifications(now).await {
            Ok(count) => report.notifications_removed = count,
            Err(e) => error!("Notification cleanup failed: {}", e),
        }
        match self.send_consent_reminders(now).await {
            Ok(count) => report.consent_reminders = count,
            Err(e) => error!("Consent reminders failed: {}", e),
        }
        if let Some(limiter) = &self.rate_limiter {
            report.rate_limit_keys_pruned = limiter.prune(now);
        }
        report
    }

    async fn purge_due_accounts(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let mut purged = 0;
        for user_id in self.database.list_due_account_deletions(now).await? {
            match self.database.delete_user(user_id).await {
                Ok(true) => {
                    purged += 1;
                    self.auditor
                        .log_user_event(
                            AuditEventType::AccountPurged,
                            user_id,
                            "Account deleted after the grace period",
                        )
                        .await;
                }
                Ok(false) => {}
                Err(e) => warn!(user_id = %user_id, error = %e, "Could not purge account"),
            }
        }
        Ok(purged)
    }

    async fn send_consent_reminders(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let until = now + Duration::days(REMINDER_DAYS);
        let mut sent = 0;
        for consent in self.database.list_consents_expiring(now, until).await? {
            let days = (consent.expires_at - now).num_days().max(0);
            let notification = UserNotification::new(
                consent.user_id,
                NotificationType::ConsentExpiring,
                NotificationPriority::Medium,
                "AI consent expiring",
                format!(
                    "Your consent for AI health features expires in {days} days. Review the terms to keep using them."
                ),
            )
            .with_action_url("/settings/consent")
            .expiring_at(consent.expires_at);

            match self.notifications.notify(notification).await {
                Ok(_) => {
                    self.database.mark_consent_reminded(consent.id, now).await?;
                    sent += 1;
                }
                Err(e) => {
                    warn!(consent_id = %consent.id, error = %e, "Could not send consent reminder");
                }
            }
        }
        Ok(sent)
    }
}
