//! ESGT Synchronization Engine
//!
//! Implements the emergent synchronization / global transmission protocol
//! over a node fabric: a Kuramoto oscillator network drives recruited nodes
//! toward phase coherence, a PTP-style clock synchronizer keeps their time
//! bases comparable, a four-gate trigger validator decides when ignition
//! may start, and the five-phase coordinator ties them together.
//!
//! # Architecture
//!
//! - [`kuramoto`]: per-node oscillators, the coupled network, coherence
//!   measurement
//! - [`clock`]: clock roles, sync rounds, jitter-bounded readiness
//! - [`trigger`]: salience/resource/temporal/arousal gates
//! - [`ignition`]: event records, statistics, and the coordinator running
//!   PREPARE -> SYNCHRONIZE -> BROADCAST -> SUSTAIN -> DISSOLVE
//! - [`metrics`]: observability snapshot
//!
//! Domain types, collaborator traits, and configuration live in
//! `esgt-core`.
//!
//! # Example
//!
//! ```
//! use esgt_core::{CoherenceBands, OscillatorConfig};
//! use esgt_sync::kuramoto::{KuramotoNetwork, Topology};
//!
//! let mut network = KuramotoNetwork::with_seed(
//!     OscillatorConfig::default(),
//!     CoherenceBands::default(),
//!     7,
//! );
//! network.add_oscillator("node-0");
//! network.add_oscillator("node-1");
//!
//! let topology: Topology = [
//!     ("node-0".to_string(), vec!["node-1".to_string()]),
//!     ("node-1".to_string(), vec!["node-0".to_string()]),
//! ]
//! .into_iter()
//! .collect();
//!
//! let coherence = network.update_network(&topology, None, 0.005);
//! assert!(coherence.order_parameter <= 1.0);
//! ```

pub mod clock;
pub mod error;
pub mod ignition;
pub mod kuramoto;
pub mod metrics;
pub mod trigger;

// Re-exports for convenience
pub use clock::{ClockOffset, ClockRole, ClockSynchronizer, SyncResult, SyncState};
pub use error::{EsgtError, EsgtResult};
pub use ignition::{CoordinatorStats, EsgtCoordinator, EsgtEvent, EsgtPhase, EventOutcome};
pub use kuramoto::{
    CoherenceQuality, CoherenceSample, CouplingWeights, KuramotoNetwork, Oscillator,
    OscillatorLifecycle, PhaseCoherence, SynchronizationDynamics, Topology,
};
pub use metrics::EsgtMetrics;
pub use trigger::{ResourceSnapshot, TriggerDecision, TriggerGate, TriggerValidator};
