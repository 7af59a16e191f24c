//! Ignition event records.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use esgt_core::SalienceScore;

/// Phase of the ignition protocol. Strictly linear; the only backward
/// motion is abandonment straight to `Dissolve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EsgtPhase {
    Prepare,
    Synchronize,
    Broadcast,
    Sustain,
    Dissolve,
}

impl EsgtPhase {
    pub fn description(&self) -> &'static str {
        match self {
            EsgtPhase::Prepare => "trigger gates and resource checks",
            EsgtPhase::Synchronize => "driving oscillators toward target coherence",
            EsgtPhase::Broadcast => "content handed to recruited nodes",
            EsgtPhase::Sustain => "holding full coupling, sampling coherence",
            EsgtPhase::Dissolve => "relaxing coupling and resetting to baseline",
        }
    }
}

/// How an ignition attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// Attempt still running.
    InFlight,
    /// Full protocol completed through dissolution.
    Completed,
    /// Target coherence not reached within the bounded timeout.
    SyncTimeout,
    /// Downgraded to dissolution mid-flight (resource loss, stop, or
    /// broadcast failure).
    Aborted,
}

/// One ignition episode, retained in the coordinator's bounded history.
///
/// `participating_nodes` is frozen once SYNCHRONIZE begins and never
/// mutated afterwards, even if fabric membership changes mid-flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsgtEvent {
    pub event_id: String,
    pub content: serde_json::Value,
    pub salience: SalienceScore,
    pub participating_nodes: BTreeSet<String>,
    /// Order-parameter samples from BROADCAST onward, one per integration
    /// step.
    pub coherence_history: Vec<f64>,
    /// Highest order parameter observed over the episode.
    pub achieved_coherence: f64,
    pub phase_timestamps: BTreeMap<EsgtPhase, DateTime<Utc>>,
    pub outcome: EventOutcome,
    pub created_at: DateTime<Utc>,
}

impl EsgtEvent {
    pub fn new(content: serde_json::Value, salience: SalienceScore) -> Self {
        Self {
            event_id: format!("esgt-{}", Uuid::new_v4()),
            content,
            salience,
            participating_nodes: BTreeSet::new(),
            coherence_history: Vec::new(),
            achieved_coherence: 0.0,
            phase_timestamps: BTreeMap::new(),
            outcome: EventOutcome::InFlight,
            created_at: Utc::now(),
        }
    }

    /// Stamp entry into a phase. Re-entry overwrites, which never happens
    /// for the linear protocol.
    pub fn record_phase(&mut self, phase: EsgtPhase) {
        self.phase_timestamps.insert(phase, Utc::now());
    }

    pub fn phase_entered_at(&self, phase: EsgtPhase) -> Option<DateTime<Utc>> {
        self.phase_timestamps.get(&phase).copied()
    }

    /// Record a coherence sample and keep the running peak.
    pub fn record_coherence(&mut self, order_parameter: f64) {
        self.coherence_history.push(order_parameter);
        if order_parameter > self.achieved_coherence {
            self.achieved_coherence = order_parameter;
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome != EventOutcome::InFlight
    }

    /// Wall-clock duration from creation to the latest phase entry, ms.
    pub fn duration_ms(&self) -> f64 {
        let last = self.phase_timestamps.values().max().copied();
        match last {
            Some(t) => (t - self.created_at)
                .num_microseconds()
                .map_or(0.0, |us| us as f64 / 1000.0),
            None => 0.0,
        }
    }
}
