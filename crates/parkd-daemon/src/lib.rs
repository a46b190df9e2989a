//! Daemon-side building blocks for parkd: configuration and the durable
//! `SQLite` store. The `parkd` binary wires these around the allocation
//! runs in `parkd-core`.

pub mod config;
pub mod store;
