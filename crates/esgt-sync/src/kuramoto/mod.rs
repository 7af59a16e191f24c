//! Kuramoto phase-oscillator simulation.
//!
//! One oscillator per recruited fabric node, coupled through a topology the
//! coordinator supplies, with coherence measured as the order parameter of
//! the phase population.

pub mod coherence;
pub mod network;
pub mod oscillator;

pub use coherence::{
    CoherenceQuality, CoherenceSample, PhaseCoherence, SynchronizationDynamics,
    MAX_COHERENCE_SAMPLES,
};
pub use network::{CouplingWeights, KuramotoNetwork, Topology};
pub use oscillator::{Oscillator, OscillatorLifecycle, MAX_HISTORY_SAMPLES};
