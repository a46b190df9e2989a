//! Core data model for parking allocation.
//!
//! This module defines the records the allocator operates on:
//! - [`Request`]: a user's request for a space on a specific date
//! - [`Lot`] / [`Space`]: the parking topology, static per run
//! - [`Role`]: a named role with an allocation priority rank
//! - [`Allocation`] / [`DraftAllocation`]: the allocator's output, before and
//!   after the store assigns an id
//! - [`RegionKey`]: the (country, city) pair scoping request/lot matching
//!
//! All records are plain data passed into the engine as immutable snapshots.
//! There is no live object graph: cross-record references are explicit ids.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Well-known role names seeded by deployments.
pub mod role_names {
    pub const VISITOR: &str = "Visitor";
    pub const EMPLOYEE: &str = "Employee";
    pub const MANAGER: &str = "Manager";
    pub const ADMIN: &str = "Admin";
}

/// Well-known lot names seeded by deployments.
pub mod lot_names {
    pub const HQ: &str = "HQ";
    pub const PARKBEE: &str = "Parkbee";
    pub const PUBLIC: &str = "Public";
}

/// Identifier of a registered user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user-{}", self.0)
    }
}

/// Identifier of a parking request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RequestId(pub i64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request-{}", self.0)
    }
}

/// Identifier of a parking lot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct LotId(pub i64);

impl fmt::Display for LotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lot-{}", self.0)
    }
}

/// Identifier of a parking space.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct SpaceId(pub i64);

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "space-{}", self.0)
    }
}

/// Identifier of a persisted allocation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct AllocationId(pub i64);

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "allocation-{}", self.0)
    }
}

/// Geographic scope of a request or lot: an ISO country code plus a city.
///
/// Requests are only ever matched against lots in the same region. The
/// ordering derive makes the key usable for deterministic grouping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionKey {
    /// ISO 3166-1 alpha-2 country code, e.g. `NL`.
    pub country_code: String,

    /// City name as entered at request time.
    pub city: String,
}

impl RegionKey {
    /// Creates a new region key.
    #[must_use]
    pub fn new(country_code: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            city: city.into(),
        }
    }

    /// Returns `true` if either component is blank.
    ///
    /// A request carrying an unspecified region cannot be matched against
    /// any lot; the engine treats it as an invariant violation.
    #[must_use]
    pub fn is_unspecified(&self) -> bool {
        self.country_code.trim().is_empty() || self.city.trim().is_empty()
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.country_code, self.city)
    }
}

/// A named role with an allocation priority rank.
///
/// Lower rank is served first. A user holding several roles is ranked by the
/// minimum rank across them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role name, unique per deployment.
    pub name: String,

    /// Allocation precedence; lower values are served first.
    pub priority_rank: i32,
}

impl Role {
    /// Creates a new role.
    #[must_use]
    pub fn new(name: impl Into<String>, priority_rank: i32) -> Self {
        Self {
            name: name.into(),
            priority_rank,
        }
    }
}

/// An individual parking space inside a [`Lot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Space id, unique across all lots.
    pub id: SpaceId,

    /// The lot this space belongs to.
    pub lot_id: LotId,

    /// Human-readable label, e.g. `A101` or `Visitor 3`.
    pub label: String,

    /// Marks spaces reserved for prioritized use (EV charging, accessible).
    pub is_priority: bool,

    /// Free-form notes about the space.
    pub notes: Option<String>,
}

impl Space {
    /// Creates a new space.
    #[must_use]
    pub fn new(id: SpaceId, lot_id: LotId, label: impl Into<String>) -> Self {
        Self {
            id,
            lot_id,
            label: label.into(),
            is_priority: false,
            notes: None,
        }
    }
}

/// A parking lot: an addressable group of spaces with a priority rank and a
/// set of roles allowed to park in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    /// Lot id.
    pub id: LotId,

    /// Display name, e.g. `HQ`.
    pub name: String,

    /// Street address, if known.
    pub address: Option<String>,

    /// Fill order among lots in the same region; lower fills first.
    pub priority_rank: i32,

    /// Region this lot serves.
    pub region: RegionKey,

    /// Role names allowed to park here.
    pub eligible_roles: BTreeSet<String>,

    /// The spaces owned by this lot.
    pub spaces: Vec<Space>,
}

impl Lot {
    /// Creates a new lot with no spaces and no eligible roles.
    #[must_use]
    pub fn new(id: LotId, name: impl Into<String>, priority_rank: i32, region: RegionKey) -> Self {
        Self {
            id,
            name: name.into(),
            address: None,
            priority_rank,
            region,
            eligible_roles: BTreeSet::new(),
            spaces: Vec::new(),
        }
    }

    /// Returns `true` if the given role name may park in this lot.
    #[must_use]
    pub fn allows_role(&self, role_name: &str) -> bool {
        self.eligible_roles.contains(role_name)
    }

    /// Looks up a space of this lot by id.
    #[must_use]
    pub fn space(&self, space_id: SpaceId) -> Option<&Space> {
        self.spaces.iter().find(|s| s.id == space_id)
    }
}

/// A user's request for a parking space on a specific date.
///
/// Immutable once created; withdrawal before allocation is a store-level
/// delete guarded by ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Request id.
    pub id: RequestId,

    /// The requesting user.
    pub requester: UserId,

    /// The date parking is requested for.
    pub requested_date: NaiveDate,

    /// Submission time; the FIFO tie-break among equal-priority requesters.
    pub requested_at: DateTime<Utc>,

    /// Region the requester wants to park in.
    pub region: RegionKey,
}

/// A not-yet-persisted request, as submitted by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
    /// The requesting user.
    pub requester: UserId,

    /// The date parking is requested for.
    pub requested_date: NaiveDate,

    /// Submission time.
    pub requested_at: DateTime<Utc>,

    /// Region the requester wants to park in.
    pub region: RegionKey,
}

/// A persisted assignment of a space to a user for a date.
///
/// Created exclusively by the allocation run. At most one allocation exists
/// per `(requester, allocated_date)` and per `(space_id, allocated_date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Allocation id, assigned by the store.
    pub id: AllocationId,

    /// The user the space was assigned to.
    pub requester: UserId,

    /// The assigned space.
    pub space_id: SpaceId,

    /// The date the space is held for.
    pub allocated_date: NaiveDate,

    /// When the allocation run produced this record.
    pub allocated_at: DateTime<Utc>,
}

/// An allocation produced by the engine but not yet persisted.
///
/// The store assigns the id when the run's output is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftAllocation {
    /// The user the space was assigned to.
    pub requester: UserId,

    /// The assigned space.
    pub space_id: SpaceId,

    /// The date the space is held for.
    pub allocated_date: NaiveDate,

    /// When the allocation run produced this record.
    pub allocated_at: DateTime<Utc>,
}

impl DraftAllocation {
    /// Creates a new draft allocation.
    #[must_use]
    pub const fn new(
        requester: UserId,
        space_id: SpaceId,
        allocated_date: NaiveDate,
        allocated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            requester,
            space_id,
            allocated_date,
            allocated_at,
        }
    }

    /// Promotes this draft to a persisted allocation with a store-assigned id.
    #[must_use]
    pub fn into_allocation(self, id: AllocationId) -> Allocation {
        Allocation {
            id,
            requester: self.requester,
            space_id: self.space_id,
            allocated_date: self.allocated_date,
            allocated_at: self.allocated_at,
        }
    }
}

/// An allocation joined with display data about its space and lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationDetails {
    /// The underlying allocation record.
    pub allocation: Allocation,

    /// Label of the assigned space.
    pub space_label: String,

    /// Name of the lot the space belongs to.
    pub lot_name: String,

    /// Address of the lot, if known.
    pub lot_address: Option<String>,
}

impl AllocationDetails {
    /// Joins an allocation with the lot topology it was made against.
    ///
    /// Returns `None` if the allocation's space is not present in `lots`,
    /// which indicates a stale topology snapshot.
    #[must_use]
    pub fn resolve(allocation: &Allocation, lots: &[Lot]) -> Option<Self> {
        let (lot, space) = lots
            .iter()
            .find_map(|lot| lot.space(allocation.space_id).map(|space| (lot, space)))?;
        Some(Self {
            allocation: allocation.clone(),
            space_label: space.label.clone(),
            lot_name: lot.name.clone(),
            lot_address: lot.address.clone(),
        })
    }
}
