//! Permission checks against an owner/group/members/anonymous matrix.
//!
//! The CMS decides who the current user is; the engine only asks whether that
//! user reaches a required level on a record's permission tuple.

use serde::{Deserialize, Serialize};

/// Anonymous visitors carry this user ID.
pub const ANONYMOUS_UID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessLevel {
    None = 0,
    Read = 2,
    Edit = 3,
}

impl AccessLevel {
    /// Map a stored permission value; anything above 3 is treated as edit.
    pub fn from_perm(value: u8) -> Self {
        match value {
            0 | 1 => AccessLevel::None,
            2 => AccessLevel::Read,
            _ => AccessLevel::Edit,
        }
    }
}

/// Ownership and per-audience permission values of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub owner_id: u32,
    pub group_id: u32,
    pub perm_owner: u8,
    pub perm_group: u8,
    pub perm_members: u8,
    pub perm_anon: u8,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            owner_id: 2,
            group_id: 1,
            perm_owner: 3,
            perm_group: 3,
            perm_members: 2,
            perm_anon: 2,
        }
    }
}

pub trait AccessCheck {
    fn has_access(&self, perms: &Permissions, required: AccessLevel) -> bool;
}

/// The current user as seen by the CMS.
#[derive(Debug, Clone, Default)]
pub struct Subject {
    pub uid: u32,
    pub groups: Vec<u32>,
    pub is_admin: bool,
}

impl Subject {
    pub fn anonymous() -> Self {
        Self {
            uid: ANONYMOUS_UID,
            ..Self::default()
        }
    }

    /// Highest level this subject reaches on `perms`.
    pub fn level(&self, perms: &Permissions) -> AccessLevel {
        if self.is_admin {
            return AccessLevel::Edit;
        }
        let mut level = if self.uid > ANONYMOUS_UID {
            perms.perm_members
        } else {
            perms.perm_anon
        };
        if self.groups.contains(&perms.group_id) {
            level = level.max(perms.perm_group);
        }
        if self.uid > ANONYMOUS_UID && self.uid == perms.owner_id {
            level = level.max(perms.perm_owner);
        }
        AccessLevel::from_perm(level)
    }
}

impl AccessCheck for Subject {
    fn has_access(&self, perms: &Permissions, required: AccessLevel) -> bool {
        self.level(perms) >= required
    }
}
