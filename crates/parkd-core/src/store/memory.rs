//! Deterministic in-memory store backend.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::{AllocationStore, StoreError};
use crate::eligibility::RoleDirectory;
use crate::model::{
    Allocation, AllocationDetails, AllocationId, DraftAllocation, Lot, NewRequest, Request,
    RequestId, Role, UserId,
};

/// In-memory [`AllocationStore`] with sequential id assignment.
///
/// Emulates the uniqueness constraints a durable backend would enforce, so
/// tests exercise the same conflict paths the daemon sees against `SQLite`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    requests: Vec<Request>,
    allocations: Vec<Allocation>,
    lots: Vec<Lot>,
    roles_by_user: BTreeMap<UserId, Vec<Role>>,
    next_request_id: i64,
    next_allocation_id: i64,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a lot (with its spaces) to the topology.
    pub fn add_lot(&mut self, lot: Lot) {
        self.lots.push(lot);
    }

    /// Records the roles held by a user.
    pub fn assign_roles(&mut self, user: UserId, roles: Vec<Role>) {
        self.roles_by_user.insert(user, roles);
    }

    /// All persisted allocations, in insertion order.
    #[must_use]
    pub fn all_allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    /// All pending requests, in insertion order.
    #[must_use]
    pub fn all_requests(&self) -> &[Request] {
        &self.requests
    }

    fn has_allocation(&self, user: UserId, date: NaiveDate) -> bool {
        self.allocations
            .iter()
            .any(|a| a.requester == user && a.allocated_date == date)
    }
}

impl AllocationStore for MemoryStore {
    fn pending_requests(&self, date: NaiveDate) -> Result<Vec<Request>, StoreError> {
        Ok(self
            .requests
            .iter()
            .filter(|r| r.requested_date == date)
            .cloned()
            .collect())
    }

    fn allocations_for_date(&self, date: NaiveDate) -> Result<Vec<Allocation>, StoreError> {
        Ok(self
            .allocations
            .iter()
            .filter(|a| a.allocated_date == date)
            .cloned()
            .collect())
    }

    fn lots(&self) -> Result<Vec<Lot>, StoreError> {
        Ok(self.lots.clone())
    }

    fn role_directory(&self, users: &[UserId]) -> Result<RoleDirectory, StoreError> {
        let mut directory = RoleDirectory::new();
        for user in users {
            if let Some(roles) = self.roles_by_user.get(user) {
                directory.insert_user(*user, roles.clone());
            }
        }
        Ok(directory)
    }

    fn save_allocations(
        &mut self,
        drafts: &[DraftAllocation],
    ) -> Result<Vec<Allocation>, StoreError> {
        // Validate the whole batch against stored rows and against itself
        // before writing anything: all-or-nothing, like a transaction.
        for (i, draft) in drafts.iter().enumerate() {
            let clashes_stored = self.allocations.iter().any(|a| {
                a.allocated_date == draft.allocated_date
                    && (a.requester == draft.requester || a.space_id == draft.space_id)
            });
            let clashes_batch = drafts[..i].iter().any(|d| {
                d.allocated_date == draft.allocated_date
                    && (d.requester == draft.requester || d.space_id == draft.space_id)
            });
            if clashes_stored || clashes_batch {
                return Err(StoreError::conflict(format!(
                    "allocation for {} / {} on {} violates uniqueness",
                    draft.requester, draft.space_id, draft.allocated_date
                )));
            }
        }

        let mut saved = Vec::with_capacity(drafts.len());
        for draft in drafts {
            self.next_allocation_id += 1;
            let allocation = draft
                .clone()
                .into_allocation(AllocationId(self.next_allocation_id));
            self.allocations.push(allocation.clone());
            saved.push(allocation);
        }
        Ok(saved)
    }

    fn create_request(&mut self, request: NewRequest) -> Result<Request, StoreError> {
        let duplicate = self.requests.iter().any(|r| {
            r.requester == request.requester && r.requested_date == request.requested_date
        });
        if duplicate {
            return Err(StoreError::conflict(format!(
                "{} already has a request for {}",
                request.requester, request.requested_date
            )));
        }

        self.next_request_id += 1;
        let stored = Request {
            id: RequestId(self.next_request_id),
            requester: request.requester,
            requested_date: request.requested_date,
            requested_at: request.requested_at,
            region: request.region,
        };
        self.requests.push(stored.clone());
        Ok(stored)
    }

    fn withdraw_request(
        &mut self,
        request_id: RequestId,
        requester: UserId,
    ) -> Result<bool, StoreError> {
        let Some(index) = self.requests.iter().position(|r| r.id == request_id) else {
            return Ok(false);
        };
        let request = &self.requests[index];
        if request.requester != requester {
            return Ok(false);
        }
        if self.has_allocation(requester, request.requested_date) {
            return Ok(false);
        }
        self.requests.remove(index);
        Ok(true)
    }

    fn user_allocation(
        &self,
        user: UserId,
        date: NaiveDate,
    ) -> Result<Option<AllocationDetails>, StoreError> {
        let Some(allocation) = self
            .allocations
            .iter()
            .find(|a| a.requester == user && a.allocated_date == date)
        else {
            return Ok(None);
        };
        AllocationDetails::resolve(allocation, &self.lots)
            .map(Some)
            .ok_or_else(|| {
                StoreError::invalid_row(format!(
                    "allocation {} references unknown space {}",
                    allocation.id, allocation.space_id
                ))
            })
    }
}
