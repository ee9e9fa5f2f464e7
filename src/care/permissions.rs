// ABOUTME: Resolves a user's access level to a group's elders from group and agency membership
// ABOUTME: Enforces that at most one non-admin member of a group holds write permission
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use serde::Serialize;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{AgencyMember, AgencyRole, Group, GroupMember, GroupRole, MemberPermission};

/// Access to a group and its elders, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// No access
    None,
    /// May view records
    Read,
    /// May create and edit care records
    Write,
    /// May manage members, invite codes and elders
    Admin,
}

impl AccessLevel {
    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }

    /// Fail unless this level is at least `needed`
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for no access, so callers cannot discover
    /// for ids, and `PermissionDenied` for insufficient access.
    pub fn require(self, needed: Self, resource: &str) -> AppResult<()> {
        if self >= needed {
            Ok(())
        } else if self == Self::None {
            Err(AppError::not_found(resource))
        } else {
            Err(AppError::permission_denied(format!(
                "This action needs {} access",
                needed.as_str()
            )))
        }
    }
}

/// Access granted by a group membership alone
#[must_use]
pub fn from_group_member(member: &GroupMember) -> AccessLevel {
    match (member.role, member.permission) {
        (GroupRole::Admin, _) => AccessLevel::Admin,
        (GroupRole::Member, MemberPermission::Write) => AccessLevel::Write,
        (GroupRole::Member, MemberPermission::Read) => AccessLevel::Read,
    }
}

/// Access to `group` for a user with the given memberships
///
/// Agency membership only counts for the agency that owns the group.
#[must_use]
pub fn resolve(
    group: &Group,
    group_member: Option<&GroupMember>,
    agency_member: Option<&AgencyMember>,
) -> AccessLevel {
    let via_group = group_member
        .filter(|member| member.group_id == group.id)
        .map_or(AccessLevel::None, from_group_member);
    let via_agency = agency_member
        .filter(|member| Some(member.agency_id) == group.agency_id)
        .map_or(AccessLevel::None, |member| match member.role {
            AgencyRole::Owner | AgencyRole::Admin => AccessLevel::Admin,
            AgencyRole::Caregiver => AccessLevel::Write,
        });
    via_group.max(via_agency)
}

/// Check that granting `permission` to `target` keeps one non-admin writer at most
///
/// # Errors
///
/// Returns `ResourceNotFound` if `target` is not a member, `InvalidInput` when
/// changing the admin, and `ResourceAlreadyExists` (409) when another
/// non-admin member already holds write.
pub fn check_permission_change(
    members: &[GroupMember],
    target: Uuid,
    permission: MemberPermission,
) -> AppResult<()> {
    let member = members
        .iter()
        .find(|member| member.user_id == target)
        .ok_or_else(|| AppError::not_found("Group member"))?;
    if member.role == GroupRole::Admin {
        return Err(AppError::invalid_input(
            "The group admin always has write access",
        ));
    }
    if permission == MemberPermission::Write {
        let other_writer = members.iter().find(|m| {
            m.user_id != target
                && m.role == GroupRole::Member
                && m.permission == MemberPermission::Write
        });
        if let Some(writer) = other_writer {
            return Err(AppError::already_exists(format!(
                "{} already has write access; only one member can write at a time",
                writer.display_name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::models::SubscriptionTier;
    use chrono::Utc;

    fn group(agency_id: Option<Uuid>) -> Group {
        Group {
            id: Uuid::new_v4(),
            name: "Family".to_owned(),
            owner_id: Uuid::new_v4(),
            agency_id,
            subscription_tier: SubscriptionTier::Family,
            created_at: Utc::now(),
        }
    }

    fn member(group_id: Uuid, role: GroupRole, permission: MemberPermission) -> GroupMember {
        GroupMember {
            group_id,
            user_id: Uuid::new_v4(),
            display_name: "Member".to_owned(),
            email: "m@example.com".to_owned(),
            role,
            permission,
            joined_at: Utc::now(),
        }
    }

    fn agency_member(agency_id: Uuid, role: AgencyRole) -> AgencyMember {
        AgencyMember {
            agency_id,
            user_id: Uuid::new_v4(),
            display_name: "Staff".to_owned(),
            email: "s@example.com".to_owned(),
            role,
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn access_from_group_and_agency() {
        let agency_id = Uuid::new_v4();
        let g = group(Some(agency_id));
        let admin = member(g.id, GroupRole::Admin, MemberPermission::Write);
        let reader = member(g.id, GroupRole::Member, MemberPermission::Read);

        assert_eq!(resolve(&g, Some(&admin), None), AccessLevel::Admin);
        assert_eq!(resolve(&g, Some(&reader), None), AccessLevel::Read);
        assert_eq!(resolve(&g, None, None), AccessLevel::None);

        let caregiver = agency_member(agency_id, AgencyRole::Caregiver);
        assert_eq!(resolve(&g, Some(&reader), Some(&caregiver)), AccessLevel::Write);
        let owner = agency_member(agency_id, AgencyRole::Owner);
        assert_eq!(resolve(&g, None, Some(&owner)), AccessLevel::Admin);

        let stranger = agency_member(Uuid::new_v4(), AgencyRole::Owner);
        assert_eq!(resolve(&g, None, Some(&stranger)), AccessLevel::None);
    }

    #[test]
    fn require_hides_inaccessible_resources() {
        assert_eq!(
            AccessLevel::None.require(AccessLevel::Read, "Elder").unwrap_err().code,
            ErrorCode::ResourceNotFound
        );
        assert_eq!(
            AccessLevel::Read.require(AccessLevel::Write, "Elder").unwrap_err().code,
            ErrorCode::PermissionDenied
        );
        assert!(AccessLevel::Admin.require(AccessLevel::Write, "Elder").is_ok());
    }

    #[test]
    fn single_non_admin_writer() {
        let group_id = Uuid::new_v4();
        let admin = member(group_id, GroupRole::Admin, MemberPermission::Write);
        let writer = member(group_id, GroupRole::Member, MemberPermission::Write);
        let reader = member(group_id, GroupRole::Member, MemberPermission::Read);
        let members = vec![admin.clone(), writer.clone(), reader.clone()];

        let err = check_permission_change(&members, reader.user_id, MemberPermission::Write)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceAlreadyExists);
        assert_eq!(err.http_status(), 409);

        assert!(check_permission_change(&members, writer.user_id, MemberPermission::Write).is_ok());
        assert!(check_permission_change(&members, writer.user_id, MemberPermission::Read).is_ok());
        assert!(check_permission_change(&members, admin.user_id, MemberPermission::Read).is_err());
    }
}
