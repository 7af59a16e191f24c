//! Coherence measurement types: order parameter snapshots, quality bands,
//! and the per-episode synchronization dynamics log.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use esgt_core::CoherenceBands;

/// Coherence samples retained in a dynamics log.
pub const MAX_COHERENCE_SAMPLES: usize = 1000;

/// Qualitative coherence band derived from the order parameter r.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoherenceQuality {
    /// r below the preconscious threshold: no global integration.
    Unconscious,
    /// Partial synchronization; content is not yet broadcast-worthy.
    Preconscious,
    /// Conscious-level coherence; ignition broadcast proceeds.
    Conscious,
    /// Near-total phase lock.
    Deep,
}

impl CoherenceQuality {
    /// Map an order parameter to its band under the given thresholds.
    ///
    /// Boundaries are inclusive on the upper band: r equal to a threshold
    /// belongs to the band the threshold names.
    pub fn from_order_parameter(r: f64, bands: &CoherenceBands) -> Self {
        if r >= bands.deep {
            CoherenceQuality::Deep
        } else if r >= bands.conscious {
            CoherenceQuality::Conscious
        } else if r >= bands.preconscious {
            CoherenceQuality::Preconscious
        } else {
            CoherenceQuality::Unconscious
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CoherenceQuality::Unconscious => "phases effectively random",
            CoherenceQuality::Preconscious => "partial clustering, below broadcast threshold",
            CoherenceQuality::Conscious => "globally integrated, broadcast-capable",
            CoherenceQuality::Deep => "near-total phase lock",
        }
    }

    /// Whether this band clears the conscious threshold.
    pub fn is_conscious(&self) -> bool {
        matches!(self, CoherenceQuality::Conscious | CoherenceQuality::Deep)
    }
}

/// One order-parameter measurement over the whole network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseCoherence {
    /// Magnitude of the mean resultant vector, in [0, 1].
    pub order_parameter: f64,
    /// Argument of the mean resultant vector, radians.
    pub mean_phase: f64,
    /// Population variance of the raw phases.
    pub phase_variance: f64,
    pub quality: CoherenceQuality,
    pub timestamp: DateTime<Utc>,
}

/// One (r, t) point in a dynamics log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoherenceSample {
    pub order_parameter: f64,
    pub timestamp: DateTime<Utc>,
}

/// Accumulated dynamics of one synchronization run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynchronizationDynamics {
    /// Simulated time at which target coherence was first reached.
    pub time_to_sync: Option<Duration>,
    /// Cumulative simulated time spent at or above target coherence.
    pub sustained_duration: Duration,
    samples: VecDeque<CoherenceSample>,
}

impl SynchronizationDynamics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a coherence sample, evicting the oldest beyond the cap.
    pub fn add_sample(&mut self, order_parameter: f64, timestamp: DateTime<Utc>) {
        self.samples.push_back(CoherenceSample {
            order_parameter,
            timestamp,
        });
        if self.samples.len() > MAX_COHERENCE_SAMPLES {
            self.samples.pop_front();
        }
    }

    pub fn samples(&self) -> impl Iterator<Item = &CoherenceSample> {
        self.samples.iter()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn latest(&self) -> Option<&CoherenceSample> {
        self.samples.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bands() -> CoherenceBands {
        CoherenceBands::default()
    }

    #[test]
    fn test_band_boundaries_are_exact() {
        let b = bands();
        assert_eq!(
            CoherenceQuality::from_order_parameter(0.29, &b),
            CoherenceQuality::Unconscious
        );
        assert_eq!(
            CoherenceQuality::from_order_parameter(0.30, &b),
            CoherenceQuality::Preconscious
        );
        assert_eq!(
            CoherenceQuality::from_order_parameter(0.69, &b),
            CoherenceQuality::Preconscious
        );
        assert_eq!(
            CoherenceQuality::from_order_parameter(0.70, &b),
            CoherenceQuality::Conscious
        );
        assert_eq!(
            CoherenceQuality::from_order_parameter(0.89, &b),
            CoherenceQuality::Conscious
        );
        assert_eq!(
            CoherenceQuality::from_order_parameter(0.90, &b),
            CoherenceQuality::Deep
        );
    }

    #[test]
    fn test_band_extremes() {
        let b = bands();
        assert_eq!(
            CoherenceQuality::from_order_parameter(0.0, &b),
            CoherenceQuality::Unconscious
        );
        assert_eq!(
            CoherenceQuality::from_order_parameter(1.0, &b),
            CoherenceQuality::Deep
        );
    }

    #[test]
    fn test_conscious_predicate() {
        assert!(!CoherenceQuality::Unconscious.is_conscious());
        assert!(!CoherenceQuality::Preconscious.is_conscious());
        assert!(CoherenceQuality::Conscious.is_conscious());
        assert!(CoherenceQuality::Deep.is_conscious());
    }

    #[test]
    fn test_custom_bands_move_boundaries() {
        let custom = CoherenceBands {
            preconscious: 0.20,
            conscious: 0.50,
            deep: 0.80,
        };
        assert_eq!(
            CoherenceQuality::from_order_parameter(0.55, &custom),
            CoherenceQuality::Conscious
        );
        assert_eq!(
            CoherenceQuality::from_order_parameter(0.55, &bands()),
            CoherenceQuality::Preconscious
        );
    }

    #[test]
    fn test_dynamics_sample_log_is_bounded() {
        let mut dynamics = SynchronizationDynamics::new();
        for i in 0..(MAX_COHERENCE_SAMPLES + 250) {
            dynamics.add_sample(i as f64 / 2000.0, Utc::now());
        }
        assert_eq!(dynamics.sample_count(), MAX_COHERENCE_SAMPLES);

        // Oldest samples were evicted, newest retained.
        let last = dynamics.latest().unwrap();
        assert!(last.order_parameter > 0.6);
    }

    #[test]
    fn test_quality_serde_snake_case() {
        let json = serde_json::to_string(&CoherenceQuality::Preconscious).unwrap();
        assert_eq!(json, "\"preconscious\"");
    }
}
