//! Error types for the synchronization engine.

use thiserror::Error;

use crate::clock::SyncState;
use crate::trigger::TriggerGate;

/// Errors surfaced by the Kuramoto network, clock, and coordinator.
///
/// Failures inside an ignition attempt (trigger rejection, synchronization
/// timeout) are typed variants rather than panics; the coordinator records
/// them in its statistics and always returns the network to baseline.
#[derive(Error, Debug)]
pub enum EsgtError {
    #[error("core error: {0}")]
    Core(#[from] esgt_core::CoreError),

    #[error("coordinator is not running")]
    NotRunning,

    /// A second ignition attempt was issued while one is in flight.
    #[error("an ignition attempt is already in flight")]
    AttemptInFlight,

    /// The clock is not ESGT-ready and the coordinator requires it.
    #[error("clock not ready for ESGT (state: {state:?})")]
    ClockNotReady { state: SyncState },

    /// A trigger gate rejected the attempt; no event was created.
    #[error("trigger rejected at {gate:?} gate: {reason}")]
    TriggerRejected { gate: TriggerGate, reason: String },

    /// Target coherence was not reached within the bounded timeout.
    #[error("synchronization timed out: r = {achieved:.3} < {target:.3}")]
    SynchronizationTimeout { achieved: f64, target: f64 },

    /// A recruited node became ineligible mid-flight; the attempt was
    /// downgraded to dissolution.
    #[error("ignition aborted: {0}")]
    Aborted(String),
}

/// Result alias used throughout the engine crate.
pub type EsgtResult<T> = Result<T, EsgtError>;
