//! Salience scoring for ignition candidates.
//!
//! Salience is the first trigger gate: content below the configured
//! threshold never starts a synchronization episode. The four factors are
//! supplied by upstream collaborators as opaque scalars; this module only
//! combines them.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Relative weighting of the four salience factors.
///
/// Weights must sum to 1.0 (validated, tolerance 1e-6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalienceWeights {
    pub novelty: f64,
    pub emotional_relevance: f64,
    pub goal_relevance: f64,
    pub urgency: f64,
}

impl Default for SalienceWeights {
    fn default() -> Self {
        Self {
            novelty: 0.3,
            emotional_relevance: 0.2,
            goal_relevance: 0.3,
            urgency: 0.2,
        }
    }
}

impl SalienceWeights {
    pub fn validate(&self) -> CoreResult<()> {
        for (name, w) in [
            ("novelty", self.novelty),
            ("emotional_relevance", self.emotional_relevance),
            ("goal_relevance", self.goal_relevance),
            ("urgency", self.urgency),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(CoreError::InvalidConfig(format!(
                    "salience weight {} must be in [0, 1], got {}",
                    name, w
                )));
            }
        }
        let sum = self.novelty + self.emotional_relevance + self.goal_relevance + self.urgency;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(CoreError::InvalidConfig(format!(
                "salience weights must sum to 1.0, got {}",
                sum
            )));
        }
        Ok(())
    }
}

/// Multi-factor salience of a content payload. Each factor is clamped to
/// [0, 1] at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalienceScore {
    pub novelty: f64,
    pub emotional_relevance: f64,
    pub goal_relevance: f64,
    pub urgency: f64,
}

impl SalienceScore {
    pub fn new(novelty: f64, emotional_relevance: f64, goal_relevance: f64, urgency: f64) -> Self {
        Self {
            novelty: novelty.clamp(0.0, 1.0),
            emotional_relevance: emotional_relevance.clamp(0.0, 1.0),
            goal_relevance: goal_relevance.clamp(0.0, 1.0),
            urgency: urgency.clamp(0.0, 1.0),
        }
    }

    /// Weighted composite using the default weights.
    pub fn composite(&self) -> f64 {
        self.composite_with(&SalienceWeights::default())
    }

    /// Weighted composite using explicit weights.
    pub fn composite_with(&self, weights: &SalienceWeights) -> f64 {
        let total = self.novelty * weights.novelty
            + self.emotional_relevance * weights.emotional_relevance
            + self.goal_relevance * weights.goal_relevance
            + self.urgency * weights.urgency;
        total.clamp(0.0, 1.0)
    }

    /// Qualitative band for the default-weighted composite.
    pub fn level(&self) -> SalienceLevel {
        SalienceLevel::from_composite(self.composite())
    }
}

/// Qualitative salience band derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalienceLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl SalienceLevel {
    pub fn from_composite(composite: f64) -> Self {
        if composite < 0.4 {
            SalienceLevel::Low
        } else if composite < 0.6 {
            SalienceLevel::Moderate
        } else if composite < 0.85 {
            SalienceLevel::High
        } else {
            SalienceLevel::Critical
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SalienceLevel::Low => "background-level content, not ignition-worthy",
            SalienceLevel::Moderate => "noteworthy but below typical thresholds",
            SalienceLevel::High => "strong ignition candidate",
            SalienceLevel::Critical => "urgent content demanding immediate ignition",
        }
    }
}
