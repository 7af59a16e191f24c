//! PTP-style clock synchronization: roles, round results, and the per-node
//! synchronizer with its jitter-bounded readiness predicate.

pub mod models;
pub mod synchronizer;

pub use models::{ClockOffset, ClockRole, SyncResult, SyncState};
pub use synchronizer::ClockSynchronizer;
