// ABOUTME: Notification service that stores in-app notifications and pushes urgent ones by email
// ABOUTME: Storage failures propagate; delivery failures are logged and swallowed
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::errors::AppResult;
use crate::external::DeliveryChannel;
use crate::models::{NotificationPriority, UserNotification};

/// Creates notifications for users
#[derive(Clone)]
pub struct NotificationService {
    database: Arc<Database>,
    delivery: Arc<dyn DeliveryChannel>,
}

impl NotificationService {
    /// Create a service
    #[must_use]
    pub fn new(database: Arc<Database>, delivery: Arc<dyn DeliveryChannel>) -> Self {
        Self { database, delivery }
    }

    /// Store `notification` and push it out when it is high priority or above
    ///
    /// Returns the notification id.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be stored.
    pub async fn notify(&self, notification: UserNotification) -> AppResult<Uuid> {
        self.database.create_notification(&notification).await?;
        debug!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            notification_type = %notification.notification_type,
            "Notification stored"
        );

        if notification.priority.rank() >= NotificationPriority::High.rank() {
            self.push(&notification).await;
        }
        Ok(notification.id)
    }

    async fn push(&self, notification: &UserNotification) {
        let recipient = match self.database.get_user(notification.user_id).await {
            Ok(Some(user)) => user.email,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Could not load notification recipient");
                return;
            }
        };
        if let Err(e) = self.delivery.deliver(&recipient, notification).await {
            warn!(
                channel = self.delivery.name(),
                notification_id = %notification.id,
                error = %e,
                "Notification delivery failed"
            );
        }
    }
}
