// ABOUTME: Outgoing notification delivery over email (Resend) or to the log only
// ABOUTME: Delivery is best effort; the stored in-app notification is the source of truth
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{info, instrument};

use crate::config::ExternalServicesConfig;
use crate::errors::{AppError, AppResult};
use crate::models::UserNotification;

/// A way of pushing a notification outside the app
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Short identifier
    fn name(&self) -> &'static str;

    /// Send `notification` to `recipient_email`
    async fn deliver(&self, recipient_email: &str, notification: &UserNotification) -> AppResult<()>;
}

/// Pick Resend when a key is configured, otherwise log only
#[must_use]
pub fn channel_from_config(config: &ExternalServicesConfig) -> Arc<dyn DeliveryChannel> {
    match &config.resend_api_key {
        Some(key) => Arc::new(ResendDelivery::new(key.clone(), config.email_from.clone())),
        None => Arc::new(LogOnlyDelivery),
    }
}

/// Records deliveries in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlyDelivery;

#[async_trait]
impl DeliveryChannel for LogOnlyDelivery {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, recipient_email: &str, notification: &UserNotification) -> AppResult<()> {
        info!(
            user_id = %notification.user_id,
            notification_type = %notification.notification_type,
            recipient = %recipient_email,
            "Notification delivery (log only)"
        );
        Ok(())
    }
}

/// Resend transactional email
pub struct ResendDelivery {
    api_key: String,
    from: String,
    base_url: String,
    http_client: Client,
}

impl ResendDelivery {
    /// Create a sender
    #[must_use]
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            api_key,
            from,
            base_url: "https://api.resend.com".to_owned(),
            http_client: Client::new(),
        }
    }

    fn email_body(&self, recipient_email: &str, notification: &UserNotification) -> serde_json::Value {
        let mut text = notification.message.clone();
        if let Some(url) = &notification.action_url {
            text.push_str("\n\n");
            text.push_str(url);
        }
        json!({
            "from": self.from,
            "to": [recipient_email],
            "subject": notification.title,
            "text": text,
        })
    }
}

#[async_trait]
impl DeliveryChannel for ResendDelivery {
    fn name(&self) -> &'static str {
        "resend"
    }

    #[instrument(skip(self, notification), fields(notification_id = %notification.id))]
    async fn deliver(&self, recipient_email: &str, notification: &UserNotification) -> AppResult<()> {
        let response = self
            .http_client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.email_body(recipient_email, notification))
            .send()
            .await
            .map_err(|e| AppError::external_service("Resend", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::external_service(
                "Resend",
                format!("Email send failed with HTTP {status}"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationPriority, NotificationType};
    use uuid::Uuid;

    #[test]
    fn email_carries_title_and_link() {
        let sender = ResendDelivery::new("re_test".to_owned(), "MyGuide <a@b.co>".to_owned());
        let notification = UserNotification::new(
            Uuid::new_v4(),
            NotificationType::ShiftOffer,
            NotificationPriority::High,
            "New shift offer",
            "You have 30 minutes to respond.",
        )
        .with_action_url("/shifts/1");
        let body = sender.email_body("care@example.com", &notification);
        assert_eq!(body["subject"], "New shift offer");
        assert_eq!(body["to"][0], "care@example.com");
        assert!(body["text"].as_str().unwrap().ends_with("/shifts/1"));
    }
}
