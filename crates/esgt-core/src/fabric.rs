//! Fabric node model: the per-node state the ignition layer consumes.
//!
//! A fabric is the set of participating nodes and their peer connections.
//! The ignition layer never mutates fabric state; it reads node eligibility,
//! adjacency, and latency through the [`FabricProvider`] trait
//! (`crate::traits::FabricProvider`).
//!
//! [`FabricProvider`]: crate::traits::FabricProvider

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a fabric node.
///
/// Only `Active` and `EsgtMode` nodes are eligible for recruitment into an
/// ignition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Node is booting and has not joined the fabric yet.
    Initializing,
    /// Node is healthy and available for recruitment.
    Active,
    /// Node is currently participating in a synchronization episode.
    EsgtMode,
    /// Node is reachable but unhealthy; excluded from recruitment.
    Degraded,
    /// Node has left the fabric.
    Offline,
}

impl NodeState {
    /// Whether a node in this state may be recruited for ignition.
    pub fn is_esgt_eligible(&self) -> bool {
        matches!(self, NodeState::Active | NodeState::EsgtMode)
    }

    /// Human-readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            NodeState::Initializing => "booting, not yet joined",
            NodeState::Active => "healthy and recruitable",
            NodeState::EsgtMode => "participating in an ignition episode",
            NodeState::Degraded => "reachable but unhealthy",
            NodeState::Offline => "left the fabric",
        }
    }
}

/// One directed peer link from a node to a remote node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerConnection {
    /// Identifier of the remote endpoint.
    pub remote_node_id: String,
    /// Whether the link currently carries traffic.
    pub active: bool,
    /// Measured one-way latency in microseconds.
    pub latency_us: f64,
}

impl PeerConnection {
    pub fn new(remote_node_id: impl Into<String>, latency_us: f64) -> Self {
        Self {
            remote_node_id: remote_node_id.into(),
            active: true,
            latency_us: latency_us.max(0.0),
        }
    }
}

/// Snapshot of a single fabric node as seen by the ignition layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricNodeInfo {
    pub node_id: String,
    pub state: NodeState,
    /// Peer links keyed by remote node id.
    pub connections: HashMap<String, PeerConnection>,
}

impl FabricNodeInfo {
    pub fn new(node_id: impl Into<String>, state: NodeState) -> Self {
        Self {
            node_id: node_id.into(),
            state,
            connections: HashMap::new(),
        }
    }

    /// Remote ids of all currently active peer links.
    pub fn active_neighbors(&self) -> Vec<String> {
        self.connections
            .values()
            .filter(|c| c.active)
            .map(|c| c.remote_node_id.clone())
            .collect()
    }
}

/// Aggregate fabric health used by the resource trigger gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FabricMetrics {
    /// Total registered nodes.
    pub node_count: usize,
    /// Nodes whose state is ESGT-eligible.
    pub eligible_nodes: usize,
    /// Active peer links across the fabric (directed count).
    pub connection_count: usize,
    /// Mean latency over active links, in microseconds.
    pub avg_latency_us: f64,
}

impl FabricMetrics {
    /// Mean latency converted to milliseconds, as consumed by trigger gates.
    pub fn avg_latency_ms(&self) -> f64 {
        self.avg_latency_us / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligibility_by_state() {
        assert!(NodeState::Active.is_esgt_eligible());
        assert!(NodeState::EsgtMode.is_esgt_eligible());
        assert!(!NodeState::Initializing.is_esgt_eligible());
        assert!(!NodeState::Degraded.is_esgt_eligible());
        assert!(!NodeState::Offline.is_esgt_eligible());
    }

    #[test]
    fn test_node_state_serializes_snake_case() {
        let json = serde_json::to_string(&NodeState::EsgtMode).unwrap();
        assert_eq!(json, "\"esgt_mode\"");

        let state: NodeState = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(state, NodeState::Active);
    }

    #[test]
    fn test_active_neighbors_excludes_inactive_links() {
        let mut node = FabricNodeInfo::new("n0", NodeState::Active);
        node.connections
            .insert("n1".to_string(), PeerConnection::new("n1", 250.0));
        let mut dead = PeerConnection::new("n2", 300.0);
        dead.active = false;
        node.connections.insert("n2".to_string(), dead);

        let neighbors = node.active_neighbors();
        assert_eq!(neighbors, vec!["n1".to_string()]);
    }

    #[test]
    fn test_connection_latency_never_negative() {
        let conn = PeerConnection::new("n1", -50.0);
        assert_eq!(conn.latency_us, 0.0);
    }

    #[test]
    fn test_metrics_latency_unit_conversion() {
        let metrics = FabricMetrics {
            node_count: 4,
            eligible_nodes: 3,
            connection_count: 6,
            avg_latency_us: 1500.0,
        };
        assert!((metrics.avg_latency_ms() - 1.5).abs() < f64::EPSILON);
    }
}
