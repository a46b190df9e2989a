//! Core allocation engine for the parkd parking service.
//!
//! Users submit per-day parking requests; a scheduled run assigns available
//! spaces to requesters under capacity, priority, and regional constraints.
//! This crate is the deterministic heart of that workflow:
//!
//! - [`model`]: the records the allocator operates on
//! - [`eligibility`]: role snapshots, derived priority ranks, lot eligibility
//! - [`capacity`]: per-run occupied-space tracking
//! - [`engine`]: the assignment algorithm itself
//! - [`schedule`]: business-week window arithmetic for the weekly trigger
//! - [`store`]: the persistence interface and an in-memory backend
//! - [`run`]: fetch-compute-commit orchestration around the engine
//!
//! The engine performs no I/O: snapshots in, drafts out. Persistence,
//! scheduling, and any transport live in the surrounding crates.

pub mod capacity;
pub mod eligibility;
pub mod engine;
pub mod model;
pub mod run;
pub mod schedule;
pub mod store;

pub use capacity::CapacityTracker;
pub use eligibility::RoleDirectory;
pub use engine::{EngineError, allocate};
pub use run::{RunError, RunReport, run_for_date, run_for_request, run_week};
pub use schedule::{BusinessWeek, next_business_week};
pub use store::{AllocationStore, MemoryStore, StoreError};
