//! Assignment engine error types.

use thiserror::Error;

use crate::capacity::SpaceAlreadyReserved;
use crate::model::RequestId;

/// Invariant violations raised by the assignment engine.
///
/// Expected edge cases (no capacity, no eligible lot, empty input) are
/// normal return paths, never errors. Anything surfacing here means the run
/// must be discarded without persisting.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// A pending request carries a blank country code or city.
    #[error("request {request_id} has no resolvable region")]
    MissingRegion {
        /// The offending request.
        request_id: RequestId,
    },

    /// A space was reserved twice within one run.
    ///
    /// Indicates a double-booking bug, typically a lot in the topology
    /// snapshot listing the same space id twice.
    #[error(transparent)]
    SpaceAlreadyReserved(#[from] SpaceAlreadyReserved),
}
