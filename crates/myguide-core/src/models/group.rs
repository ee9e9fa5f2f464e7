// ABOUTME: Caregiving groups, professional agencies and their memberships
// ABOUTME: Subscription tiers bound how many elders and members a group may hold
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    /// Subscription tier of a group or agency
    pub enum SubscriptionTier {
        /// One family caring for a parent or two
        Family => "family",
        /// A small agency
        SingleAgency => "single_agency",
        /// A multi-site agency
        MultiAgency => "multi_agency",
    }
}

impl SubscriptionTier {
    /// Maximum number of elders in one group
    #[must_use]
    pub const fn max_elders(self) -> usize {
        match self {
            Self::Family => 2,
            Self::SingleAgency => 4,
            Self::MultiAgency => 30,
        }
    }

    /// Maximum number of members (including the admin) in one group
    #[must_use]
    pub const fn max_members(self) -> usize {
        match self {
            Self::Family => 4,
            Self::SingleAgency => 10,
            Self::MultiAgency => 100,
        }
    }

    /// Daily AI requests allowed per user
    #[must_use]
    pub const fn daily_ai_requests(self) -> u32 {
        match self {
            Self::Family => 25,
            Self::SingleAgency => 100,
            Self::MultiAgency => 500,
        }
    }
}

string_enum! {
    /// Role of a member inside a group
    pub enum GroupRole {
        /// Group owner; always has write access
        Admin => "admin",
        /// Invited member
        Member => "member",
    }
}

string_enum! {
    /// Data permission of a group member
    pub enum MemberPermission {
        /// May create and edit records
        Write => "write",
        /// May only view records
        Read => "read",
    }
}

/// A caregiving circle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Owning user (the group admin)
    pub owner_id: Uuid,
    /// Agency the group belongs to, if any
    pub agency_id: Option<Uuid>,
    /// Subscription tier
    pub subscription_tier: SubscriptionTier,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Membership of a user in a group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    /// Group
    pub group_id: Uuid,
    /// Member
    pub user_id: Uuid,
    /// Member display name (joined from users)
    pub display_name: String,
    /// Member email (joined from users)
    pub email: String,
    /// Role
    pub role: GroupRole,
    /// Permission
    pub permission: MemberPermission,
    /// When the user joined
    pub joined_at: DateTime<Utc>,
}

string_enum! {
    /// Role of a user inside an agency
    pub enum AgencyRole {
        /// Agency owner
        Owner => "owner",
        /// Agency administrator
        Admin => "admin",
        /// Caregiver working shifts
        Caregiver => "caregiver",
    }
}

impl AgencyRole {
    /// Whether the role may manage shifts, caregivers and groups
    #[must_use]
    pub const fn can_manage(self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

/// A professional care agency
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agency {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Owning user
    pub owner_id: Uuid,
    /// Subscription tier applied to the agency's groups
    pub subscription_tier: SubscriptionTier,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Membership of a user in an agency
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencyMember {
    /// Agency
    pub agency_id: Uuid,
    /// Member
    pub user_id: Uuid,
    /// Member display name (joined from users)
    pub display_name: String,
    /// Member email (joined from users)
    pub email: String,
    /// Role
    pub role: AgencyRole,
    /// When the user joined
    pub joined_at: DateTime<Utc>,
}
