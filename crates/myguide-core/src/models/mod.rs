// ABOUTME: Domain models shared by the server, the CLI and tests
// ABOUTME: Users, groups, agencies, elders, regimens, diet, documents, shifts, notifications, consent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! Domain models
//!
//! These are plain data types. Business rules that operate on them live in the
//! server crate's `care` module; persistence lives in its `database` module.

/// Declares a fieldless enum whose variants map one-to-one to stable strings.
///
/// Generates `as_str`, `ALL`, `Display` and a `FromStr` returning
/// `ErrorCode::InvalidFormat` for unknown values.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        $vis enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [Self] = &[$( Self::$variant ),+];

            /// Stable string form used in storage and JSON
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::errors::AppError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $( $text => Ok(Self::$variant), )+
                    other => Err($crate::errors::AppError::new(
                        $crate::errors::ErrorCode::InvalidFormat,
                        format!("Invalid {}: {other}", stringify!($name)),
                    )),
                }
            }
        }
    };
}

/// Security audit events
pub mod audit;
/// Unified AI consent records
pub mod consent;
/// Diet entries and nutrition analysis
pub mod diet;
/// Elder documents and their summaries
pub mod document;
/// Cached FDA drug labels
pub mod drug_label;
/// Elders and their allergies/conditions
pub mod elder;
/// Groups, agencies and memberships
pub mod group;
/// User notifications
pub mod notification;
/// Medications, supplements and dose logs
pub mod regimen;
/// Scheduled shifts and shift offers
pub mod shift;
/// Users and account deletion
pub mod user;

pub use audit::{AuditEvent, AuditEventType, AuditSeverity};
pub use consent::{ConsentAcceptance, UnifiedAiConsent};
pub use diet::{DietEntry, MealType, NutritionAnalysis};
pub use document::{
    DocumentSummary, DocumentType, ElderDocument, ProcessingStatus, SummaryConfidence,
};
pub use drug_label::{FdaDrugLabel, LabelSection};
pub use elder::{Allergy, AllergySeverity, Elder, HealthCondition};
pub use group::{
    Agency, AgencyMember, AgencyRole, Group, GroupMember, GroupRole, MemberPermission,
    SubscriptionTier,
};
pub use notification::{NotificationPriority, NotificationType, UserNotification};
pub use regimen::{DoseLog, DoseStatus, RegimenItem, RegimenKind};
pub use shift::{OfferStatus, ScheduledShift, ShiftOffer, ShiftStatus};
pub use user::{AccountDeletion, User, UserStatus};
