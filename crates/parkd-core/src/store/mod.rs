//! Store interfaces between the allocator and its persistence backend.
//!
//! The allocator never talks to a database directly: a run fetches immutable
//! snapshots through [`AllocationStore`], computes entirely in memory, and
//! commits its output once through [`AllocationStore::save_allocations`].
//! Backends implement the trait and map their native failures into
//! [`StoreError`].
//!
//! [`MemoryStore`] is the deterministic in-process backend used by the core
//! test suite; the daemon crate provides the durable `SQLite` backend.

use chrono::NaiveDate;
use thiserror::Error;

use crate::eligibility::RoleDirectory;
use crate::model::{
    Allocation, AllocationDetails, DraftAllocation, Lot, NewRequest, Request, RequestId, UserId,
};

mod memory;


pub use memory::MemoryStore;

/// Errors surfaced by store backends.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A query against the backend failed.
    #[error("store query failed: {message}")]
    Query {
        /// Backend-specific description of the failure.
        message: String,
    },

    /// A write collided with a uniqueness constraint.
    ///
    /// For allocations this is the last-resort safety net behind the
    /// engine's own invariants: two racing runs for the same date cannot
    /// both commit overlapping assignments.
    #[error("store constraint violated: {message}")]
    Conflict {
        /// Description of the violated constraint.
        message: String,
    },

    /// A stored row could not be decoded into a model type.
    #[error("malformed row: {message}")]
    InvalidRow {
        /// Description of the malformed content.
        message: String,
    },
}

impl StoreError {
    /// Convenience constructor for backend query failures.
    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Convenience constructor for constraint violations.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Convenience constructor for malformed rows.
    #[must_use]
    pub fn invalid_row(message: impl Into<String>) -> Self {
        Self::InvalidRow {
            message: message.into(),
        }
    }
}

/// Persistence operations the allocation workflow depends on.
///
/// Snapshot reads (`pending_requests`, `allocations_for_date`, `lots`,
/// `role_directory`) are taken once, up front, per run. `save_allocations`
/// commits a run's entire output atomically: either every draft persists or
/// none do.
pub trait AllocationStore {
    /// Requests with `requested_date == date`, in submission order.
    fn pending_requests(&self, date: NaiveDate) -> Result<Vec<Request>, StoreError>;

    /// Allocations already persisted for `date`.
    fn allocations_for_date(&self, date: NaiveDate) -> Result<Vec<Allocation>, StoreError>;

    /// The full lot topology, including spaces and eligible roles.
    fn lots(&self) -> Result<Vec<Lot>, StoreError>;

    /// Role assignments for the given users, resolved into a directory.
    ///
    /// Users with no assignments are simply absent from the result.
    fn role_directory(&self, users: &[UserId]) -> Result<RoleDirectory, StoreError>;

    /// Atomically persists a run's output, assigning ids.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if any draft collides with the
    /// per-user-per-date or per-space-per-date uniqueness constraints; in
    /// that case nothing is persisted.
    fn save_allocations(
        &mut self,
        drafts: &[DraftAllocation],
    ) -> Result<Vec<Allocation>, StoreError>;

    /// Persists a newly submitted request.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the user already has a request
    /// for that date.
    fn create_request(&mut self, request: NewRequest) -> Result<Request, StoreError>;

    /// Deletes a request before allocation, on behalf of its owner.
    ///
    /// Returns `false` without deleting when the request does not exist, is
    /// owned by someone else, or the owner already holds an allocation for
    /// that date.
    fn withdraw_request(
        &mut self,
        request_id: RequestId,
        requester: UserId,
    ) -> Result<bool, StoreError>;

    /// The user's allocation for a date, joined for display, if any.
    fn user_allocation(
        &self,
        user: UserId,
        date: NaiveDate,
    ) -> Result<Option<AllocationDetails>, StoreError>;
}
