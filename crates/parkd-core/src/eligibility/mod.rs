//! Eligibility resolution: who may park where, and at what precedence.
//!
//! The [`RoleDirectory`] is a per-run snapshot of role assignments, built
//! once by the caller from the identity store and handed to the engine. All
//! lookups are read-only and derive from plain data; there is no ambient
//! identity context.
//!
//! A user holding no roles is not an error: such a user is simply ineligible
//! for every lot and is skipped by the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Lot, Role, UserId};


/// Snapshot of role assignments for the users in an allocation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDirectory {
    roles_by_user: BTreeMap<UserId, Vec<Role>>,
}

impl RoleDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            roles_by_user: BTreeMap::new(),
        }
    }

    /// Builds a directory from `(user, roles)` assignments.
    #[must_use]
    pub fn from_assignments(assignments: impl IntoIterator<Item = (UserId, Vec<Role>)>) -> Self {
        Self {
            roles_by_user: assignments.into_iter().collect(),
        }
    }

    /// Records the roles held by a user, replacing any previous entry.
    pub fn insert_user(&mut self, user: UserId, roles: Vec<Role>) {
        self.roles_by_user.insert(user, roles);
    }

    /// Returns the roles held by a user; empty for unknown users.
    #[must_use]
    pub fn roles(&self, user: UserId) -> &[Role] {
        self.roles_by_user.get(&user).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if the user holds at least one role.
    #[must_use]
    pub fn has_roles(&self, user: UserId) -> bool {
        !self.roles(user).is_empty()
    }

    /// Derives the user's effective priority rank: the minimum (best) rank
    /// across all held roles. `None` when the user holds no roles.
    #[must_use]
    pub fn priority_rank(&self, user: UserId) -> Option<i32> {
        self.roles(user).iter().map(|r| r.priority_rank).min()
    }

    /// Returns `true` if the user holds any role the lot admits.
    #[must_use]
    pub fn eligible_for_lot(&self, user: UserId, lot: &Lot) -> bool {
        self.roles(user).iter().any(|r| lot.allows_role(&r.name))
    }

    /// Number of users with recorded assignments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles_by_user.len()
    }

    /// Returns `true` if no assignments are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles_by_user.is_empty()
    }
}
