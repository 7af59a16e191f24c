//! Deterministic fixture generation for ignition fabric tests.
//!
//! All generators are seedable and produce real domain values (valid ranges,
//! consistent topologies), never mock objects. Tests that need a fabric use
//! the in-memory provider from `esgt_core::stubs` through the builders here.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use esgt_core::salience::SalienceScore;
use esgt_core::stubs::InMemoryFabric;
use esgt_core::NodeState;

/// Seeded RNG for reproducible test data.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Salience comfortably above every default threshold.
pub fn high_salience() -> SalienceScore {
    SalienceScore::new(0.9, 0.8, 0.9, 0.85)
}

/// Salience below the default minimum composite.
pub fn low_salience() -> SalienceScore {
    SalienceScore::new(0.1, 0.1, 0.2, 0.1)
}

/// Random salience with all factors drawn from `range`.
pub fn random_salience(rng: &mut ChaCha8Rng, range: std::ops::Range<f64>) -> SalienceScore {
    SalienceScore::new(
        rng.gen_range(range.clone()),
        rng.gen_range(range.clone()),
        rng.gen_range(range.clone()),
        rng.gen_range(range),
    )
}

/// Small JSON payload standing in for broadcast content.
pub fn sample_content(label: &str) -> serde_json::Value {
    serde_json::json!({
        "kind": "test_insight",
        "label": label,
        "confidence": 0.9,
    })
}

/// Fully connected fabric of `n` active nodes, 500us links.
pub async fn standard_fabric(n: usize) -> InMemoryFabric {
    InMemoryFabric::fully_connected(n, 500.0).await
}

/// Fabric where `degraded` of the `n` nodes are ineligible.
pub async fn partially_degraded_fabric(n: usize, degraded: usize) -> InMemoryFabric {
    let fabric = InMemoryFabric::fully_connected(n, 500.0).await;
    for i in 0..degraded.min(n) {
        // Node ids come from the fully_connected builder.
        let _ = fabric
            .set_node_state(&format!("node-{}", i), NodeState::Degraded)
            .await;
    }
    fabric
}

#[cfg(test)]
mod tests {
    use super::*;
    use esgt_core::traits::FabricProvider;

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let mut a = seeded_rng(42);
        let mut b = seeded_rng(42);
        let xs: Vec<f64> = (0..8).map(|_| a.gen_range(0.0..1.0)).collect();
        let ys: Vec<f64> = (0..8).map(|_| b.gen_range(0.0..1.0)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_fixture_salience_relative_ordering() {
        assert!(high_salience().composite() > low_salience().composite());
    }

    #[tokio::test]
    async fn test_partially_degraded_fabric_counts() {
        let fabric = partially_degraded_fabric(5, 2).await;
        let metrics = fabric.metrics().await;
        assert_eq!(metrics.node_count, 5);
        assert_eq!(metrics.eligible_nodes, 3);
    }
}
