//! Ignition protocol: event records, run statistics, and the five-phase
//! coordinator.

pub mod coordinator;
pub mod event;
pub mod stats;

pub use coordinator::EsgtCoordinator;
pub use event::{EsgtEvent, EsgtPhase, EventOutcome};
pub use stats::CoordinatorStats;
