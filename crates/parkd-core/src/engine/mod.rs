//! The assignment engine: deterministic matching of requests to spaces.
//!
//! # Algorithm
//!
//! One invocation of [`allocate`] is an *allocation run* for a single target
//! date, operating on immutable snapshots:
//!
//! 1. Requests whose requester already holds an allocation for the date are
//!    dropped, as are requesters holding no roles (ineligible everywhere).
//! 2. Remaining requests and all lots are partitioned by [`RegionKey`];
//!    matching is strictly region-local.
//! 3. Within a region, requests are ordered by derived priority rank (lower
//!    first), then submission time, then request id; lots by priority rank,
//!    then lot id; free spaces by ascending space id.
//! 4. Lots are filled greedily in that order: the i-th still-unassigned
//!    eligible request gets the i-th free space.
//! 5. Requests left over when every lot is exhausted simply stay pending.
//!
//! The engine performs no I/O and reads no clock; the caller supplies the
//! `allocated_at` stamp. Given identical snapshots the output is identical,
//! byte for byte: all grouping uses ordered collections and every ordering
//! has a total tie-break.
//!
//! # Failure semantics
//!
//! [`EngineError`] covers invariant violations only: a request with no
//! resolvable region, or a double reservation (a corrupt topology listing
//! one space twice in a lot). On error the run's partial output is
//! discarded by the caller; nothing is persisted.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::capacity::CapacityTracker;
use crate::eligibility::RoleDirectory;
use crate::model::{Allocation, DraftAllocation, Lot, RegionKey, Request, UserId};

mod error;


pub use error::EngineError;

/// Runs one allocation pass for `target_date` over the supplied snapshots.
///
/// Returns the new allocations as drafts, in deterministic order (regions
/// ascending, then lot fill order). The caller persists them atomically;
/// nothing is written here.
///
/// Requests whose `requested_date` differs from `target_date` are ignored,
/// so an over-fetched snapshot may be passed unchanged.
///
/// # Errors
///
/// Returns [`EngineError`] only for invariant violations; see the module
/// docs. All expected empty/partial outcomes are `Ok` results.
pub fn allocate(
    target_date: NaiveDate,
    pending: &[Request],
    existing: &[Allocation],
    lots: &[Lot],
    directory: &RoleDirectory,
    allocated_at: DateTime<Utc>,
) -> Result<Vec<DraftAllocation>, EngineError> {
    let already_allocated: BTreeSet<UserId> = existing
        .iter()
        .filter(|a| a.allocated_date == target_date)
        .map(|a| a.requester)
        .collect();

    // Bucket the surviving requests by region. Ordered keys keep region
    // processing deterministic.
    let mut requests_by_region: BTreeMap<RegionKey, Vec<&Request>> = BTreeMap::new();
    for request in pending {
        if request.requested_date != target_date {
            continue;
        }
        if request.region.is_unspecified() {
            return Err(EngineError::MissingRegion {
                request_id: request.id,
            });
        }
        if already_allocated.contains(&request.requester) {
            continue;
        }
        if !directory.has_roles(request.requester) {
            debug!(requester = %request.requester, "requester holds no roles; skipping");
            continue;
        }
        requests_by_region
            .entry(request.region.clone())
            .or_default()
            .push(request);
    }

    if requests_by_region.is_empty() {
        return Ok(Vec::new());
    }

    let mut lots_by_region: BTreeMap<&RegionKey, Vec<&Lot>> = BTreeMap::new();
    for lot in lots {
        lots_by_region.entry(&lot.region).or_default().push(lot);
    }
    for region_lots in lots_by_region.values_mut() {
        region_lots.sort_by_key(|l| (l.priority_rank, l.id));
    }

    let mut tracker = CapacityTracker::seeded(existing, target_date);
    // Global across regions: a user with duplicate requests in different
    // regions still gets at most one space per date.
    let mut satisfied: BTreeSet<UserId> = BTreeSet::new();
    let mut drafts = Vec::new();

    for (region, mut requests) in requests_by_region {
        requests.sort_by_key(|r| {
            // has_roles was checked above, so the rank is always present.
            let rank = directory.priority_rank(r.requester).unwrap_or(i32::MAX);
            (rank, r.requested_at, r.id)
        });
        // First request per user wins; later duplicates are dropped.
        let mut seen = BTreeSet::new();
        requests.retain(|r| seen.insert(r.requester));

        let Some(region_lots) = lots_by_region.get(&region) else {
            debug!(%region, pending = requests.len(), "no lots in region");
            continue;
        };

        for lot in region_lots {
            if requests.iter().all(|r| satisfied.contains(&r.requester)) {
                break;
            }
            let free = tracker.free_spaces(lot);
            if free.is_empty() {
                continue;
            }
            let eligible: Vec<&Request> = requests
                .iter()
                .filter(|r| !satisfied.contains(&r.requester))
                .filter(|r| directory.eligible_for_lot(r.requester, lot))
                .copied()
                .collect();
            if eligible.is_empty() {
                continue;
            }

            // Stable pairing: zip truncates to min(|eligible|, |free|).
            for (request, space) in eligible.iter().zip(free) {
                tracker.reserve(space.id)?;
                satisfied.insert(request.requester);
                drafts.push(DraftAllocation::new(
                    request.requester,
                    space.id,
                    target_date,
                    allocated_at,
                ));
            }
        }
    }

    debug!(
        date = %target_date,
        allocated = drafts.len(),
        "allocation pass complete"
    );
    Ok(drafts)
}
