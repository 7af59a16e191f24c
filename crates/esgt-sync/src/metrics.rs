//! Observability snapshot assembled by the coordinator.

use serde::{Deserialize, Serialize};

use crate::clock::SyncState;
use crate::ignition::CoordinatorStats;

/// Point-in-time view across network, clock, and run statistics. Cheap to
/// build and safe to export; holds no live handles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsgtMetrics {
    pub coordinator_id: String,
    pub running: bool,
    pub oscillator_count: usize,
    /// Cached order parameter; 0.0 when nothing has been computed yet.
    pub current_coherence: f64,
    pub clock_state: SyncState,
    pub stats: CoordinatorStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_serialize_to_json() {
        let metrics = EsgtMetrics {
            coordinator_id: "coord-0".to_string(),
            running: true,
            oscillator_count: 5,
            current_coherence: 0.82,
            clock_state: SyncState::Synchronized,
            stats: CoordinatorStats::default(),
        };

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["coordinator_id"], "coord-0");
        assert_eq!(json["clock_state"], "synchronized");
        assert_eq!(json["stats"]["total_attempts"], 0);
    }
}
