//! Clock synchronization data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role a node plays in the clock hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockRole {
    /// Reference clock; exposes monotonic time the fabric syncs against.
    GrandMaster,
    /// Follows a grand master, estimating its own offset per round.
    Slave,
}

impl ClockRole {
    pub fn description(&self) -> &'static str {
        match self {
            ClockRole::GrandMaster => "reference clock for the fabric",
            ClockRole::Slave => "estimates offset against a grand master",
        }
    }
}

/// Synchronization state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No round has completed yet.
    Unsynchronized,
    /// Rounds are running but jitter is not yet within target.
    Synchronizing,
    /// At least one round with jitter within target.
    Synchronized,
}

impl SyncState {
    pub fn description(&self) -> &'static str {
        match self {
            SyncState::Unsynchronized => "no completed synchronization round",
            SyncState::Synchronizing => "rounds running, jitter above target",
            SyncState::Synchronized => "offset locked with jitter within target",
        }
    }
}

/// Outcome of one synchronization round.
///
/// Rounds always complete: a degraded round reports a low `quality` and
/// may drop the state back to `Synchronizing` instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    /// Estimated offset to the master clock, nanoseconds.
    pub offset_ns: f64,
    /// Standard deviation of recent offset estimates, nanoseconds.
    pub jitter_ns: f64,
    /// Round quality in [0, 1].
    pub quality: f64,
}

/// Snapshot of the current best-known offset estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockOffset {
    pub offset_ns: f64,
    pub jitter_ns: f64,
    pub quality: f64,
    /// When the estimate was last refreshed; `None` before the first round.
    pub last_sync_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_state_serde_uses_snake_case() {
        let json = serde_json::to_string(&SyncState::Unsynchronized).unwrap();
        assert_eq!(json, "\"unsynchronized\"");
        let back: SyncState = serde_json::from_str("\"synchronized\"").unwrap();
        assert_eq!(back, SyncState::Synchronized);
    }

    #[test]
    fn test_role_serde_round_trip() {
        let json = serde_json::to_string(&ClockRole::GrandMaster).unwrap();
        assert_eq!(json, "\"grand_master\"");
        let back: ClockRole = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ClockRole::GrandMaster);
    }
}
