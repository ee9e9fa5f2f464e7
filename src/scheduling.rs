// ABOUTME: Shift workflow service applying confirmation transitions and running offer cascades
// ABOUTME: Persists with compare-and-set updates and notifies the affected caregiver or owner
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # Shift workflow
//!
//! The rules live in [`crate::care::shifts`]. This service loads state,
//! checks who is acting, persists with status-guarded updates so two
//! concurrent requests cannot both win, and sends the notifications each
//! step produces. The id of the last notification about a shift is stored
//! on the shift.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::care::shifts::{self, ShiftAction};
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    AgencyMember, NotificationPriority, NotificationType, OfferStatus, ScheduledShift, ShiftOffer,
    ShiftStatus, UserNotification,
};
use crate::notifications::NotificationService;

/// Orchestrates shift transitions and offer cascades
#[derive(Clone)]
pub struct ShiftWorkflow {
    database: Arc<Database>,
    notifications: NotificationService,
    offer_window: Duration,
}

fn describe(shift: &ScheduledShift) -> String {
    format!(
        "{} {}-{}",
        shift.date.format("%a %b %-d"),
        shift.start_time.format("%H:%M"),
        shift.end_time.format("%H:%M")
    )
}

impl ShiftWorkflow {
    /// Create a workflow with the given offer window
    #[must_use]
    pub fn new(
        database: Arc<Database>,
        notifications: NotificationService,
        offer_window_minutes: i64,
    ) -> Self {
        Self {
            database,
            notifications,
            offer_window: Duration::minutes(offer_window_minutes),
        }
    }

    async fn load_shift(&self, shift_id: Uuid) -> AppResult<ScheduledShift> {
        self.database
            .get_shift(shift_id)
            .await?
            .ok_or_else(|| AppError::not_found("Shift"))
    }

    /// Agency membership of `user_id` for the shift's agency
    ///
    /// Non-members get `ResourceNotFound` so shift ids cannot be enumerated.
    async fn staff_member(&self, shift: &ScheduledShift, user_id: Uuid) -> AppResult<AgencyMember> {
        self.database
            .get_agency_member(shift.agency_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Shift"))
    }

    async fn agency_owner(&self, shift: &ScheduledShift) -> AppResult<Uuid> {
        self.database
            .get_agency(shift.agency_id)
            .await?
            .map(|agency| agency.owner_id)
            .ok_or_else(|| AppError::not_found("Agency"))
    }

    async fn notify_about(
        &self,
        shift: &ScheduledShift,
        recipient: Uuid,
        notification_type: NotificationType,
        priority: NotificationPriority,
        title: &str,
        message: String,
    ) -> AppResult<Uuid> {
        let notification =
            UserNotification::new(recipient, notification_type, priority, title, message)
                .with_action_url(format!("/shifts/{}", shift.id));
        self.send(shift, notification).await
    }

    async fn send(
        &self,
        shift: &ScheduledShift,
        notification: UserNotification,
    ) -> AppResult<Uuid> {
        let id = self.notifications.notify(notification).await?;
        self.database.set_shift_notification(shift.id, id).await?;
        Ok(id)
    }

    fn authorize(
        shift: &ScheduledShift,
        action: ShiftAction,
        actor: &AgencyMember,
    ) -> AppResult<()> {
        match action {
            ShiftAction::CaregiverConfirm | ShiftAction::CaregiverDecline => {
                if shift.caregiver_id == Some(actor.user_id) {
                    Ok(())
                } else {
                    Err(AppError::permission_denied(
                        "Only the assigned caregiver can answer this shift",
                    ))
                }
            }
            _ if actor.role.can_manage() => Ok(()),
            _ => Err(AppError::permission_denied(
                "Only agency owners and admins can manage shifts",
            )),
        }
    }

    /// Require `caregiver_id` to be on the agency's staff
    async fn ensure_staff(&self, agency_id: Uuid, caregiver_id: Uuid) -> AppResult<()> {
        if self
            .database
            .get_agency_member(agency_id, caregiver_id)
            .await?
            .is_none()
        {
            return Err(AppError::invalid_input(
                "Shifts can only be assigned to agency staff",
            ));
        }
        Ok(())
    }

    /// Store a new shift
    ///
    /// With a caregiver the shift goes straight onto the schedule as
    /// `scheduled` and the caregiver is asked to confirm; without one it is
    /// `open`. Nothing is stored when the caregiver is not agency staff.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a non-staff caregiver and database errors.
    #[instrument(skip(self, draft), fields(shift_id = %draft.id))]
    pub async fn create(
        &self,
        draft: ScheduledShift,
        caregiver_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<ScheduledShift> {
        let mut shift = ScheduledShift {
            caregiver_id: None,
            status: ShiftStatus::Open,
            notification_id: None,
            created_at: now,
            updated_at: now,
            ..draft
        };
        if let Some(caregiver_id) = caregiver_id {
            self.ensure_staff(shift.agency_id, caregiver_id).await?;
            shift.caregiver_id = Some(caregiver_id);
            shift.status = ShiftStatus::Scheduled;
        }
        self.database.create_shift(&shift).await?;
        info!(
            shift_id = %shift.id,
            agency_id = %shift.agency_id,
            status = %shift.status,
            "Shift created"
        );

        if let Some(caregiver_id) = shift.caregiver_id {
            let notification_id = self
                .notify_about(
                    &shift,
                    caregiver_id,
                    NotificationType::ShiftAssigned,
                    NotificationPriority::High,
                    "New shift scheduled",
                    format!(
                        "You are scheduled for the shift on {}. Please confirm.",
                        describe(&shift)
                    ),
                )
                .await?;
            shift.notification_id = Some(notification_id);
        }
        Ok(shift)
    }

    /// Apply `action` to a shift on behalf of `actor_id`
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown shift or a non-member actor,
    /// `PermissionDenied` when the actor may not take the action, and
    /// `InvalidStateTransition` when the transition is not allowed or another
    /// request changed the shift first.
    #[instrument(skip(self), fields(action = action.name()))]
    pub async fn transition(
        &self,
        shift_id: Uuid,
        action: ShiftAction,
        actor_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<ScheduledShift> {
        let shift = self.load_shift(shift_id).await?;
        let actor = self.staff_member(&shift, actor_id).await?;
        Self::authorize(&shift, action, &actor)?;

        if let ShiftAction::Assign { caregiver_id } = action {
            self.ensure_staff(shift.agency_id, caregiver_id).await?;
        }

        let mut updated = shifts::apply(&shift, action, now)?;
        if !self
            .database
            .update_shift_if_status(&updated, shift.status)
            .await?
        {
            return Err(AppError::invalid_state(
                "The shift was changed by another request; reload and try again",
            ));
        }
        info!(
            shift_id = %shift.id,
            from = %shift.status,
            to = %updated.status,
            "Shift transitioned"
        );

        if matches!(action, ShiftAction::Assign { .. } | ShiftAction::Cancel) {
            self.withdraw_live_offers(shift.id, None, now).await?;
        }

        let when = describe(&updated);
        let owner = self.agency_owner(&updated).await?;
        let notification_id = match action {
            ShiftAction::Assign { caregiver_id } => {
                self.notify_about(
                    &updated,
                    caregiver_id,
                    NotificationType::ShiftAssigned,
                    NotificationPriority::High,
                    "New shift assigned",
                    format!("You have been assigned the shift on {when}. Please confirm."),
                )
                .await?
            }
            ShiftAction::CaregiverConfirm => {
                self.notify_about(
                    &updated,
                    owner,
                    NotificationType::ShiftConfirmed,
                    NotificationPriority::Medium,
                    "Shift confirmed",
                    format!("{} confirmed the shift on {when}.", actor.display_name),
                )
                .await?
            }
            ShiftAction::OwnerConfirm => {
                let recipient = updated.caregiver_id.unwrap_or(owner);
                self.notify_about(
                    &updated,
                    recipient,
                    NotificationType::ShiftConfirmed,
                    NotificationPriority::Medium,
                    "Shift confirmed",
                    format!("The shift on {when} was confirmed by the agency."),
                )
                .await?
            }
            ShiftAction::CaregiverDecline => {
                self.notify_about(
                    &updated,
                    owner,
                    NotificationType::ShiftDeclined,
                    NotificationPriority::High,
                    "Shift declined",
                    format!(
                        "{} declined the shift on {when}. It is open again.",
                        actor.display_name
                    ),
                )
                .await?
            }
            ShiftAction::Complete => {
                self.notify_about(
                    &updated,
                    owner,
                    NotificationType::System,
                    NotificationPriority::Low,
                    "Shift completed",
                    format!("The shift on {when} was completed."),
                )
                .await?
            }
            ShiftAction::Cancel => {
                let recipient = shift.caregiver_id.unwrap_or(owner);
                self.notify_about(
                    &updated,
                    recipient,
                    NotificationType::ShiftCancelled,
                    NotificationPriority::High,
                    "Shift cancelled",
                    format!("The shift on {when} was cancelled."),
                )
                .await?
            }
        };
        updated.notification_id = Some(notification_id);
        Ok(updated)
    }

    /// Start an offer cascade for an open shift
    ///
    /// Replaces any earlier cascade. The first candidate is notified.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless the shift is open, and
    /// `InvalidInput` for an empty, oversized or non-staff candidate list.
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub async fn start_offers(
        &self,
        shift_id: Uuid,
        candidates: &[Uuid],
        actor_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ShiftOffer>> {
        let shift = self.load_shift(shift_id).await?;
        let actor = self.staff_member(&shift, actor_id).await?;
        if !actor.role.can_manage() {
            return Err(AppError::permission_denied(
                "Only agency owners and admins can offer shifts",
            ));
        }
        if shift.status != ShiftStatus::Open {
            return Err(AppError::invalid_state(format!(
                "Only open shifts can be offered; this shift is {}",
                shift.status
            )));
        }

        let staff: Vec<Uuid> = self
            .database
            .list_agency_members(shift.agency_id)
            .await?
            .into_iter()
            .map(|member| member.user_id)
            .collect();
        if let Some(outsider) = candidates.iter().find(|id| !staff.contains(id)) {
            return Err(AppError::invalid_input(format!(
                "User {outsider} is not on this agency's staff"
            )));
        }

        let offers = shifts::plan_offers(shift.id, candidates, now, self.offer_window)?;
        self.database.replace_shift_offers(shift.id, &offers).await?;
        if let Some(first) = offers.first() {
            self.announce_offer(&shift, first).await?;
        }
        info!(shift_id = %shift.id, offers = offers.len(), "Offer cascade started");
        Ok(offers)
    }

    async fn announce_offer(&self, shift: &ScheduledShift, offer: &ShiftOffer) -> AppResult<Uuid> {
        let minutes = self.offer_window.num_minutes();
        let mut notification = UserNotification::new(
            offer.caregiver_id,
            NotificationType::ShiftOffer,
            NotificationPriority::High,
            "Shift available",
            format!(
                "You are offered the shift on {}. Respond within {minutes} minutes.",
                describe(shift)
            ),
        )
        .with_action_url(format!("/offers/{}", offer.id));
        if let Some(expires_at) = offer.expires_at {
            notification = notification.expiring_at(expires_at);
        }
        self.send(shift, notification).await
    }

    async fn load_answerable_offer(
        &self,
        offer_id: Uuid,
        caregiver_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<ShiftOffer> {
        let offer = self
            .database
            .get_shift_offer(offer_id)
            .await?
            .filter(|offer| offer.caregiver_id == caregiver_id)
            .ok_or_else(|| AppError::not_found("Shift offer"))?;
        shifts::ensure_answerable(&offer, caregiver_id, now)?;
        Ok(offer)
    }

    /// Accept a pending offer: assign the caregiver and confirm the shift
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for another caregiver's or an unknown offer,
    /// and `InvalidStateTransition` if the offer lapsed or the shift is no
    /// longer open.
    #[instrument(skip(self))]
    pub async fn accept_offer(
        &self,
        offer_id: Uuid,
        caregiver_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<ScheduledShift> {
        let offer = self.load_answerable_offer(offer_id, caregiver_id, now).await?;
        let accepted = shifts::settle(&offer, OfferStatus::Accepted, now);
        if !self
            .database
            .update_offer_if_status(&accepted, OfferStatus::Pending)
            .await?
        {
            return Err(AppError::invalid_state("The offer is no longer open"));
        }

        let shift = self.load_shift(offer.shift_id).await?;
        let mut confirmed = shift.clone();
        confirmed.status = ShiftStatus::Confirmed;
        confirmed.caregiver_id = Some(caregiver_id);
        confirmed.updated_at = now;

        let claimed = shift.status == ShiftStatus::Open
            && self
                .database
                .update_shift_if_status(&confirmed, ShiftStatus::Open)
                .await?;
        if !claimed {
            let withdrawn = shifts::settle(&accepted, OfferStatus::Withdrawn, now);
            self.database
                .update_offer_if_status(&withdrawn, OfferStatus::Accepted)
                .await?;
            return Err(AppError::invalid_state("The shift has already been filled"));
        }

        self.withdraw_live_offers(shift.id, Some(offer.id), now).await?;
        info!(shift_id = %shift.id, caregiver_id = %caregiver_id, "Shift offer accepted");

        let caregiver_name = self
            .database
            .get_user(caregiver_id)
            .await?
            .map_or_else(|| "A caregiver".to_owned(), |user| user.display_name);
        let owner = self.agency_owner(&confirmed).await?;
        let notification_id = self
            .notify_about(
                &confirmed,
                owner,
                NotificationType::ShiftConfirmed,
                NotificationPriority::Medium,
                "Shift filled",
                format!("{caregiver_name} accepted the shift on {}.", describe(&confirmed)),
            )
            .await?;
        confirmed.notification_id = Some(notification_id);
        Ok(confirmed)
    }

    /// Decline a pending offer and move the cascade on
    ///
    /// Returns the offer promoted next, if any.
    ///
    /// # Errors
    ///
    /// Same as [`Self::accept_offer`].
    #[instrument(skip(self))]
    pub async fn decline_offer(
        &self,
        offer_id: Uuid,
        caregiver_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ShiftOffer>> {
        let offer = self.load_answerable_offer(offer_id, caregiver_id, now).await?;
        let declined = shifts::settle(&offer, OfferStatus::Declined, now);
        if !self
            .database
            .update_offer_if_status(&declined, OfferStatus::Pending)
            .await?
        {
            return Err(AppError::invalid_state("The offer is no longer open"));
        }
        self.advance(offer.shift_id, now).await
    }

    /// Expire pending offers whose window has closed and advance their cascades
    ///
    /// Returns the number of offers expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the lapsed offers cannot be listed.
    pub async fn expire_lapsed(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let lapsed = self.database.list_lapsed_offers(now).await?;
        let mut expired = 0;
        for offer in lapsed {
            let settled = shifts::settle(&offer, OfferStatus::Expired, now);
            match self
                .database
                .update_offer_if_status(&settled, OfferStatus::Pending)
                .await
            {
                Ok(true) => {
                    expired += 1;
                    if let Err(e) = self.advance(offer.shift_id, now).await {
                        warn!(
                            shift_id = %offer.shift_id,
                            error = %e,
                            "Could not advance offer cascade"
                        );
                    }
                }
                Ok(false) => {}
                Err(e) => warn!(offer_id = %offer.id, error = %e, "Could not expire offer"),
            }
        }
        Ok(expired)
    }

    /// Promote the next queued offer, or report the shift unfilled
    async fn advance(&self, shift_id: Uuid, now: DateTime<Utc>) -> AppResult<Option<ShiftOffer>> {
        let shift = self.load_shift(shift_id).await?;
        if shift.status != ShiftStatus::Open {
            self.withdraw_live_offers(shift.id, None, now).await?;
            return Ok(None);
        }

        let offers = self.database.list_shift_offers(shift.id).await?;
        if let Some(next) = shifts::next_queued(&offers) {
            let activated = shifts::activate(next, now, self.offer_window);
            if self
                .database
                .update_offer_if_status(&activated, OfferStatus::Queued)
                .await?
            {
                self.announce_offer(&shift, &activated).await?;
                info!(
                    shift_id = %shift.id,
                    position = activated.position,
                    "Offer moved to next caregiver"
                );
                return Ok(Some(activated));
            }
            return Ok(None);
        }

        let owner = self.agency_owner(&shift).await?;
        self.notify_about(
            &shift,
            owner,
            NotificationType::ShiftUnfilled,
            NotificationPriority::High,
            "Shift still open",
            format!(
                "Every offered caregiver declined or missed the shift on {}.",
                describe(&shift)
            ),
        )
        .await?;
        info!(shift_id = %shift.id, "Offer cascade exhausted");
        Ok(None)
    }

    async fn withdraw_live_offers(
        &self,
        shift_id: Uuid,
        except: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        for offer in self.database.list_shift_offers(shift_id).await? {
            if offer.status.is_settled() || Some(offer.id) == except {
                continue;
            }
            let withdrawn = shifts::settle(&offer, OfferStatus::Withdrawn, now);
            self.database
                .update_offer_if_status(&withdrawn, offer.status)
                .await?;
        }
        Ok(())
    }
}
