//! Single phase-coupled oscillator.
//!
//! Each participating fabric node is represented by one oscillator,
//! analogous to a cortical population with gamma-band rhythms (~40 Hz).
//! Phase dynamics follow the Kuramoto model:
//!
//! ```text
//! dθᵢ/dt = 2π·ωᵢ + (K/N) Σⱼ wⱼ sin(θⱼ - θᵢ) + noise
//! ```
//!
//! with ωᵢ the natural frequency in Hz, K the coupling strength, N the
//! active oscillator count, and wⱼ an optional per-link weight.

use std::collections::VecDeque;
use std::f64::consts::PI;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use esgt_core::{IntegrationMethod, OscillatorConfig};

/// Phase/frequency samples retained per oscillator.
pub const MAX_HISTORY_SAMPLES: usize = 1000;

/// Wrap a phase into [0, 2π).
#[inline]
pub(crate) fn wrap_phase(phase: f64) -> f64 {
    phase.rem_euclid(2.0 * PI)
}

/// Lifecycle tag of an oscillator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OscillatorLifecycle {
    /// Not currently driven by network updates.
    Idle,
    /// Participating in coupled phase dynamics.
    Coupling,
}

/// One phase-coupled oscillator owned by a [`KuramotoNetwork`].
///
/// [`KuramotoNetwork`]: crate::kuramoto::KuramotoNetwork
#[derive(Debug, Clone)]
pub struct Oscillator {
    node_id: String,
    config: OscillatorConfig,
    phase: f64,
    /// Instantaneous frequency estimate in Hz.
    frequency: f64,
    lifecycle: OscillatorLifecycle,
    phase_history: VecDeque<f64>,
    frequency_history: VecDeque<f64>,
    noise: Option<Normal<f64>>,
}

impl Oscillator {
    /// Create an oscillator at an independent uniform-random phase.
    pub fn new(node_id: impl Into<String>, config: OscillatorConfig, rng: &mut impl Rng) -> Self {
        let phase = rng.gen_range(0.0..2.0 * PI);
        let noise = if config.phase_noise > 0.0 {
            Normal::new(0.0, config.phase_noise).ok()
        } else {
            None
        };

        let mut phase_history = VecDeque::with_capacity(MAX_HISTORY_SAMPLES);
        phase_history.push_back(phase);
        let mut frequency_history = VecDeque::with_capacity(MAX_HISTORY_SAMPLES);
        frequency_history.push_back(config.natural_frequency);

        Self {
            node_id: node_id.into(),
            frequency: config.natural_frequency,
            config,
            phase,
            lifecycle: OscillatorLifecycle::Idle,
            phase_history,
            frequency_history,
            noise,
        }
    }

    /// Phase velocity at `at_phase` against resolved neighbor
    /// (phase, weight) pairs.
    pub fn phase_velocity(&self, at_phase: f64, neighbors: &[(f64, f64)], n: usize) -> f64 {
        let mut velocity = 2.0 * PI * self.config.natural_frequency;

        if !neighbors.is_empty() {
            let coupling_sum: f64 = neighbors
                .iter()
                .map(|(phase, weight)| weight * (phase - at_phase).sin())
                .sum();
            velocity += self.config.coupling_strength * coupling_sum / n.max(1) as f64;
        }

        velocity
    }

    /// Draw this step's Gaussian phase noise. Zero when noise is disabled.
    pub fn sample_noise(&self, rng: &mut impl Rng) -> f64 {
        match &self.noise {
            Some(dist) => dist.sample(rng),
            None => 0.0,
        }
    }

    /// Advance one step against frozen neighbor phases, honoring this
    /// oscillator's configured integrator. `noise` must be sampled once for
    /// the whole step, never per RK stage.
    pub fn integrate(&mut self, neighbors: &[(f64, f64)], n: usize, dt: f64, noise: f64) {
        let new_phase = match self.config.integration_method {
            IntegrationMethod::Euler => {
                let velocity = self.phase_velocity(self.phase, neighbors, n);
                self.phase + (velocity + noise) * dt
            }
            IntegrationMethod::Rk4 => {
                let k1 = dt * self.phase_velocity(self.phase, neighbors, n);
                let k2 = dt * self.phase_velocity(self.phase + 0.5 * k1, neighbors, n);
                let k3 = dt * self.phase_velocity(self.phase + 0.5 * k2, neighbors, n);
                let k4 = dt * self.phase_velocity(self.phase + k3, neighbors, n);
                self.phase + (k1 + 2.0 * k2 + 2.0 * k3 + k4) / 6.0 + noise * dt
            }
        };

        let instantaneous = self.phase_velocity(new_phase, neighbors, n) / (2.0 * PI);
        self.apply_update(new_phase, instantaneous);
    }

    /// Commit an externally integrated step (used by the network's staged
    /// RK4 path). Wraps the phase and records history.
    pub fn apply_update(&mut self, new_phase: f64, instantaneous_freq_hz: f64) {
        self.lifecycle = OscillatorLifecycle::Coupling;
        self.phase = wrap_phase(new_phase);
        self.frequency = instantaneous_freq_hz;

        self.phase_history.push_back(self.phase);
        self.frequency_history.push_back(self.frequency);
        while self.phase_history.len() > MAX_HISTORY_SAMPLES {
            self.phase_history.pop_front();
        }
        while self.frequency_history.len() > MAX_HISTORY_SAMPLES {
            self.frequency_history.pop_front();
        }
    }

    /// Return to an independent uniform-random phase with fresh history.
    pub fn reset(&mut self, rng: &mut impl Rng) {
        self.phase = rng.gen_range(0.0..2.0 * PI);
        self.frequency = self.config.natural_frequency;
        self.lifecycle = OscillatorLifecycle::Idle;
        self.phase_history.clear();
        self.phase_history.push_back(self.phase);
        self.frequency_history.clear();
        self.frequency_history.push_back(self.frequency);
    }

    #[inline]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    #[inline]
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Set the phase explicitly, wrapped into [0, 2π).
    pub fn set_phase(&mut self, phase: f64) {
        self.phase = wrap_phase(phase);
    }

    #[inline]
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    #[inline]
    pub fn lifecycle(&self) -> OscillatorLifecycle {
        self.lifecycle
    }

    #[inline]
    pub fn config(&self) -> &OscillatorConfig {
        &self.config
    }

    #[inline]
    pub fn coupling_strength(&self) -> f64 {
        self.config.coupling_strength
    }

    /// Set the coupling strength K, clamped to [0, 10].
    pub fn set_coupling_strength(&mut self, k: f64) {
        self.config.coupling_strength = k.clamp(0.0, 10.0);
    }

    #[inline]
    pub fn history_len(&self) -> usize {
        self.phase_history.len()
    }

    pub fn phase_history(&self) -> impl Iterator<Item = f64> + '_ {
        self.phase_history.iter().copied()
    }
}
