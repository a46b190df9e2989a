//! Allocation run orchestration: fetch, compute, commit.
//!
//! A run fetches its snapshots once, hands them to the engine, and persists
//! the engine's output in a single atomic write. No I/O happens inside the
//! algorithm, and nothing is persisted when the engine reports an invariant
//! violation: the drafts are simply dropped.
//!
//! Entry points:
//! - [`run_for_date`]: the scheduled batch run for one date
//! - [`run_for_request`]: best-effort allocation of a single just-submitted
//!   request, same contract with a one-element pending set
//! - [`run_week`]: one batch run per business day of a window
//!
//! Callers must serialize runs per target date; see the store docs for the
//! constraint-level safety net behind that rule.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::{self, EngineError};
use crate::model::{Allocation, AllocationDetails, Lot, Request, UserId};
use crate::schedule::BusinessWeek;
use crate::store::{AllocationStore, StoreError};


/// Errors terminating an allocation run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// A snapshot fetch or the final commit failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The engine detected an invariant violation; nothing was persisted.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Summary of one allocation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// The date the run allocated for.
    pub date: NaiveDate,

    /// Pending requests considered by the run.
    pub pending: usize,

    /// Allocations created and persisted by the run.
    pub allocations: Vec<Allocation>,
}

impl RunReport {
    /// Number of requests satisfied by this run.
    #[must_use]
    pub fn satisfied(&self) -> usize {
        self.allocations.len()
    }

    /// Number of considered requests left pending after this run.
    #[must_use]
    pub fn unsatisfied(&self) -> usize {
        self.pending.saturating_sub(self.allocations.len())
    }

    /// Joins the run's allocations with lot display data.
    ///
    /// Allocations referencing spaces missing from `lots` are skipped; with
    /// the same topology snapshot the run was computed from, that cannot
    /// happen.
    #[must_use]
    pub fn details(&self, lots: &[Lot]) -> Vec<AllocationDetails> {
        self.allocations
            .iter()
            .filter_map(|a| AllocationDetails::resolve(a, lots))
            .collect()
    }
}

/// Runs the allocation for one date against the given store.
///
/// # Errors
///
/// Fails on store errors or engine invariant violations. In both cases no
/// allocation from this run has been persisted.
pub fn run_for_date<S: AllocationStore>(
    store: &mut S,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<RunReport, RunError> {
    let pending = store.pending_requests(date)?;
    allocate_and_commit(store, date, &pending, now)
}

/// Best-effort allocation of a single just-submitted request.
///
/// Shares the batch contract: the same filters, the same invariants, a
/// one-element pending set. The request stays pending when no capacity or
/// eligible lot exists.
pub fn run_for_request<S: AllocationStore>(
    store: &mut S,
    request: &Request,
    now: DateTime<Utc>,
) -> Result<RunReport, RunError> {
    allocate_and_commit(
        store,
        request.requested_date,
        std::slice::from_ref(request),
        now,
    )
}

/// Runs the allocation for each business day of a window, in order.
///
/// Stops at the first failing day; prior days are already committed, which
/// is safe because each day's run is independently idempotent.
pub fn run_week<S: AllocationStore>(
    store: &mut S,
    week: &BusinessWeek,
    now: DateTime<Utc>,
) -> Result<Vec<RunReport>, RunError> {
    let mut reports = Vec::new();
    for day in week.days() {
        reports.push(run_for_date(store, day, now)?);
    }
    let total: usize = reports.iter().map(RunReport::satisfied).sum();
    info!(
        monday = %week.monday(),
        friday = %week.friday(),
        allocated = total,
        "weekly allocation complete"
    );
    Ok(reports)
}

fn allocate_and_commit<S: AllocationStore>(
    store: &mut S,
    date: NaiveDate,
    pending: &[Request],
    now: DateTime<Utc>,
) -> Result<RunReport, RunError> {
    let existing = store.allocations_for_date(date)?;
    let lots = store.lots()?;
    let users: Vec<UserId> = pending
        .iter()
        .map(|r| r.requester)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let directory = store.role_directory(&users)?;

    let drafts = match engine::allocate(date, pending, &existing, &lots, &directory, now) {
        Ok(drafts) => drafts,
        Err(err) => {
            warn!(%date, error = %err, "allocation run aborted; discarding results");
            return Err(err.into());
        }
    };

    let allocations = if drafts.is_empty() {
        Vec::new()
    } else {
        store.save_allocations(&drafts)?
    };

    info!(
        %date,
        pending = pending.len(),
        allocated = allocations.len(),
        "allocation run complete"
    );
    Ok(RunReport {
        date,
        pending: pending.len(),
        allocations,
    })
}
