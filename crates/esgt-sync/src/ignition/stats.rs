//! Coordinator run statistics.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trigger::TriggerGate;

/// Counters accumulated across every ignition attempt.
///
/// Rejections never create an event but still count as attempts; the
/// per-gate buckets show which precondition is doing the gating.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorStats {
    pub total_attempts: u64,
    pub successful: u64,
    pub failed_synchronizations: u64,
    pub aborted: u64,
    pub rejections_by_gate: HashMap<TriggerGate, u64>,
    /// Running mean of `time_to_sync` across successful attempts, ms.
    pub avg_time_to_sync_ms: f64,
    /// When the last attempt that produced an event finished.
    pub last_event_at: Option<DateTime<Utc>>,
}

impl CoordinatorStats {
    pub fn record_rejection(&mut self, gate: TriggerGate) {
        self.total_attempts += 1;
        *self.rejections_by_gate.entry(gate).or_insert(0) += 1;
    }

    pub fn record_success(&mut self, time_to_sync_ms: f64) {
        self.total_attempts += 1;
        self.successful += 1;
        let n = self.successful as f64;
        self.avg_time_to_sync_ms += (time_to_sync_ms - self.avg_time_to_sync_ms) / n;
        self.last_event_at = Some(Utc::now());
    }

    pub fn record_sync_timeout(&mut self) {
        self.total_attempts += 1;
        self.failed_synchronizations += 1;
        self.last_event_at = Some(Utc::now());
    }

    pub fn record_abort(&mut self) {
        self.total_attempts += 1;
        self.aborted += 1;
        self.last_event_at = Some(Utc::now());
    }

    /// Successful attempts over all attempts, 0.0 before the first.
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total_attempts as f64
    }

    pub fn rejections_for(&self, gate: TriggerGate) -> u64 {
        self.rejections_by_gate.get(&gate).copied().unwrap_or(0)
    }
}
