//! Collaborator traits consumed by the ignition layer.
//!
//! The surrounding system supplies fabric state, an affect/arousal scalar,
//! and a broadcast channel. All three are opaque here; stub implementations
//! for tests and standalone operation live in `crate::stubs`.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::fabric::{FabricMetrics, FabricNodeInfo};

/// Read-only access to fabric node state.
#[async_trait]
pub trait FabricProvider: Send + Sync {
    /// Ids of every registered node.
    async fn node_ids(&self) -> Vec<String>;

    /// Snapshot of one node, or `None` if unregistered.
    async fn node(&self, node_id: &str) -> Option<FabricNodeInfo>;

    /// Aggregate fabric health.
    async fn metrics(&self) -> FabricMetrics;

    /// Ids of nodes currently eligible for recruitment.
    async fn eligible_nodes(&self) -> Vec<String> {
        let mut eligible = Vec::new();
        for id in self.node_ids().await {
            if let Some(node) = self.node(&id).await {
                if node.state.is_esgt_eligible() {
                    eligible.push(id);
                }
            }
        }
        eligible
    }
}

/// Supplies the current arousal scalar from the affect-estimation component.
#[async_trait]
pub trait ArousalProvider: Send + Sync {
    /// Current arousal in [0, 1].
    async fn current_arousal(&self) -> f64;
}

/// Delivery channel for broadcast content once target coherence is reached.
///
/// Delivery semantics (transport, retries, ordering) are owned by the
/// implementor; the coordinator only hands content over.
#[async_trait]
pub trait BroadcastSink: Send + Sync {
    async fn deliver(
        &self,
        event_id: &str,
        nodes: &BTreeSet<String>,
        content: &serde_json::Value,
    ) -> CoreResult<()>;
}

/// Accessor for a remote peer's clock, used by synchronization rounds.
/// Returns nanoseconds; the implementation defines the epoch.
pub type TimeSourceFn = dyn Fn() -> u64 + Send + Sync;
