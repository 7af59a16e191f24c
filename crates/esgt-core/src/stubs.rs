//! In-memory stub implementations of the collaborator traits.
//!
//! These are real, behavior-complete implementations (no mocks): the
//! in-memory fabric tracks node states and symmetric peer links and computes
//! genuine aggregate metrics. Production deployments substitute providers
//! backed by the live fabric.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::fabric::{FabricMetrics, FabricNodeInfo, NodeState, PeerConnection};
use crate::traits::{ArousalProvider, BroadcastSink, FabricProvider};

/// Fabric held entirely in memory. Used by tests and standalone mode.
#[derive(Debug, Default)]
pub struct InMemoryFabric {
    nodes: RwLock<HashMap<String, FabricNodeInfo>>,
}

impl InMemoryFabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fabric of `n` active nodes with every pair connected.
    pub async fn fully_connected(n: usize, latency_us: f64) -> Self {
        let fabric = Self::new();
        for i in 0..n {
            fabric.register_node(format!("node-{}", i), NodeState::Active).await;
        }
        for i in 0..n {
            for j in (i + 1)..n {
                // Both nodes were just registered, so connect cannot fail.
                let _ = fabric
                    .connect_nodes(&format!("node-{}", i), &format!("node-{}", j), latency_us)
                    .await;
            }
        }
        fabric
    }

    /// Build a ring fabric: node i connects to node (i+1) mod n.
    pub async fn ring(n: usize, latency_us: f64) -> Self {
        let fabric = Self::new();
        for i in 0..n {
            fabric.register_node(format!("node-{}", i), NodeState::Active).await;
        }
        for i in 0..n {
            let _ = fabric
                .connect_nodes(
                    &format!("node-{}", i),
                    &format!("node-{}", (i + 1) % n),
                    latency_us,
                )
                .await;
        }
        fabric
    }

    pub async fn register_node(&self, node_id: impl Into<String>, state: NodeState) {
        let node_id = node_id.into();
        let mut nodes = self.nodes.write().await;
        debug!(node_id = %node_id, ?state, "fabric node registered");
        nodes.insert(node_id.clone(), FabricNodeInfo::new(node_id, state));
    }

    pub async fn set_node_state(&self, node_id: &str, state: NodeState) -> CoreResult<()> {
        let mut nodes = self.nodes.write().await;
        let node = nodes
            .get_mut(node_id)
            .ok_or_else(|| CoreError::NodeNotFound(node_id.to_string()))?;
        debug!(node_id, from = ?node.state, to = ?state, "fabric node state changed");
        node.state = state;
        Ok(())
    }

    /// Create a symmetric active link between two registered nodes.
    pub async fn connect_nodes(&self, a: &str, b: &str, latency_us: f64) -> CoreResult<()> {
        let mut nodes = self.nodes.write().await;
        if !nodes.contains_key(a) {
            return Err(CoreError::NodeNotFound(a.to_string()));
        }
        if !nodes.contains_key(b) {
            return Err(CoreError::NodeNotFound(b.to_string()));
        }
        if let Some(node) = nodes.get_mut(a) {
            node.connections
                .insert(b.to_string(), PeerConnection::new(b, latency_us));
        }
        if let Some(node) = nodes.get_mut(b) {
            node.connections
                .insert(a.to_string(), PeerConnection::new(a, latency_us));
        }
        Ok(())
    }

    /// Mark both directions of a link inactive. Missing links are ignored.
    pub async fn disconnect_nodes(&self, a: &str, b: &str) {
        let mut nodes = self.nodes.write().await;
        if let Some(node) = nodes.get_mut(a) {
            if let Some(conn) = node.connections.get_mut(b) {
                conn.active = false;
            }
        }
        if let Some(node) = nodes.get_mut(b) {
            if let Some(conn) = node.connections.get_mut(a) {
                conn.active = false;
            }
        }
    }
}

#[async_trait]
impl FabricProvider for InMemoryFabric {
    async fn node_ids(&self) -> Vec<String> {
        let nodes = self.nodes.read().await;
        let mut ids: Vec<String> = nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn node(&self, node_id: &str) -> Option<FabricNodeInfo> {
        let nodes = self.nodes.read().await;
        nodes.get(node_id).cloned()
    }

    async fn metrics(&self) -> FabricMetrics {
        let nodes = self.nodes.read().await;
        let node_count = nodes.len();
        let eligible_nodes = nodes.values().filter(|n| n.state.is_esgt_eligible()).count();

        let mut connection_count = 0usize;
        let mut latency_sum = 0.0f64;
        for node in nodes.values() {
            for conn in node.connections.values().filter(|c| c.active) {
                connection_count += 1;
                latency_sum += conn.latency_us;
            }
        }
        let avg_latency_us = if connection_count > 0 {
            latency_sum / connection_count as f64
        } else {
            0.0
        };

        FabricMetrics {
            node_count,
            eligible_nodes,
            connection_count,
            avg_latency_us,
        }
    }
}

/// Arousal provider returning a fixed value; standalone/testing mode.
#[derive(Debug, Clone, Copy)]
pub struct FixedArousal(f64);

impl FixedArousal {
    pub fn new(arousal: f64) -> Self {
        Self(arousal.clamp(0.0, 1.0))
    }
}

impl Default for FixedArousal {
    fn default() -> Self {
        Self(0.70)
    }
}

#[async_trait]
impl ArousalProvider for FixedArousal {
    async fn current_arousal(&self) -> f64 {
        self.0
    }
}

/// Broadcast sink that drops content. Standalone mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBroadcast;

#[async_trait]
impl BroadcastSink for NullBroadcast {
    async fn deliver(
        &self,
        _event_id: &str,
        _nodes: &BTreeSet<String>,
        _content: &serde_json::Value,
    ) -> CoreResult<()> {
        Ok(())
    }
}

/// One recorded delivery captured by [`RecordingBroadcast`].
#[derive(Debug, Clone)]
pub struct BroadcastRecord {
    pub event_id: String,
    pub nodes: BTreeSet<String>,
    pub content: serde_json::Value,
}

/// Broadcast sink that records every delivery for later inspection.
#[derive(Debug, Default)]
pub struct RecordingBroadcast {
    records: Mutex<Vec<BroadcastRecord>>,
}

impl RecordingBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<BroadcastRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl BroadcastSink for RecordingBroadcast {
    async fn deliver(
        &self,
        event_id: &str,
        nodes: &BTreeSet<String>,
        content: &serde_json::Value,
    ) -> CoreResult<()> {
        self.records.lock().await.push(BroadcastRecord {
            event_id: event_id.to_string(),
            nodes: nodes.clone(),
            content: content.clone(),
        });
        Ok(())
    }
}
