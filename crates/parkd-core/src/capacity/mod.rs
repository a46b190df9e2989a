//! Per-run capacity tracking for parking spaces.
//!
//! The [`CapacityTracker`] holds the set of space ids occupied on the target
//! date. It is seeded from allocations already persisted for that date and
//! updated in memory as the engine commits assignments within the run. The
//! tracker is scoped to a single run and discarded afterwards; it is never
//! shared across runs.
//!
//! Reserving an already-occupied space is a double-booking bug, not a
//! recoverable condition: [`CapacityTracker::reserve`] fails loudly so the
//! run can be discarded instead of persisting a corrupt result.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{Allocation, Lot, Space, SpaceId};


/// Error raised on an attempt to reserve an occupied space.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("space {space_id} is already reserved for this date")]
pub struct SpaceAlreadyReserved {
    /// The space that was already occupied.
    pub space_id: SpaceId,
}

/// Tracks occupied spaces over the course of one allocation run.
#[derive(Debug, Clone, Default)]
pub struct CapacityTracker {
    occupied: BTreeSet<SpaceId>,
}

impl CapacityTracker {
    /// Creates a tracker with no occupied spaces.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            occupied: BTreeSet::new(),
        }
    }

    /// Seeds a tracker from allocations already persisted for `target_date`.
    ///
    /// Allocations for other dates are ignored so a caller may pass an
    /// over-fetched snapshot unchanged.
    #[must_use]
    pub fn seeded(existing: &[Allocation], target_date: NaiveDate) -> Self {
        Self {
            occupied: existing
                .iter()
                .filter(|a| a.allocated_date == target_date)
                .map(|a| a.space_id)
                .collect(),
        }
    }

    /// Returns the lot's free spaces, sorted by ascending space id.
    ///
    /// The ordering is part of the allocation contract: stable pairing
    /// depends on it.
    #[must_use]
    pub fn free_spaces<'a>(&self, lot: &'a Lot) -> Vec<&'a Space> {
        let mut free: Vec<&Space> = lot
            .spaces
            .iter()
            .filter(|s| !self.occupied.contains(&s.id))
            .collect();
        free.sort_by_key(|s| s.id);
        free
    }

    /// Marks a space as occupied for the remainder of the run.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceAlreadyReserved`] if the space is already occupied,
    /// an invariant violation indicating a double-booking bug.
    pub fn reserve(&mut self, space_id: SpaceId) -> Result<(), SpaceAlreadyReserved> {
        if self.occupied.insert(space_id) {
            Ok(())
        } else {
            Err(SpaceAlreadyReserved { space_id })
        }
    }

    /// Returns `true` if the space is occupied.
    #[must_use]
    pub fn is_occupied(&self, space_id: SpaceId) -> bool {
        self.occupied.contains(&space_id)
    }

    /// Number of occupied spaces.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.occupied.len()
    }
}
