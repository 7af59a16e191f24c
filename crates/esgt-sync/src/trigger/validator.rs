//! Multi-gate ignition precondition checks.
//!
//! Four gates, fixed order, short-circuit on first failure: salience,
//! resource, temporal, arousal. The validator is stateless; callers supply
//! every measured input, so the same validator can serve any number of
//! coordinators.

use serde::{Deserialize, Serialize};
use tracing::debug;

use esgt_core::TriggerConditions;

/// Which gate produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerGate {
    Salience,
    Resource,
    Temporal,
    Arousal,
}

impl TriggerGate {
    pub fn description(&self) -> &'static str {
        match self {
            TriggerGate::Salience => "composite salience threshold",
            TriggerGate::Resource => "fabric node count, latency, and capacity",
            TriggerGate::Temporal => "refractory period and burst limit",
            TriggerGate::Arousal => "global arousal floor",
        }
    }
}

/// Outcome of a trigger check. `gate` names the failing gate, `None` on a
/// pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDecision {
    pub passed: bool,
    pub gate: Option<TriggerGate>,
    pub reason: String,
}

impl TriggerDecision {
    pub fn pass() -> Self {
        Self {
            passed: true,
            gate: None,
            reason: "All trigger gates passed".to_string(),
        }
    }

    pub fn fail(gate: TriggerGate, reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            gate: Some(gate),
            reason: reason.into(),
        }
    }
}

/// Fabric resource measurements taken at check time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Nodes currently eligible for recruitment.
    pub eligible_nodes: usize,
    /// Mean latency across active connections, milliseconds.
    pub avg_latency_ms: f64,
    /// Available compute headroom in [0, 1].
    pub cpu_capacity: f64,
}

/// Stateless four-gate precondition checker.
#[derive(Debug, Clone)]
pub struct TriggerValidator {
    conditions: TriggerConditions,
}

impl TriggerValidator {
    pub fn new(conditions: TriggerConditions) -> Self {
        Self { conditions }
    }

    #[inline]
    pub fn conditions(&self) -> &TriggerConditions {
        &self.conditions
    }

    /// Evaluate the gates in order, stopping at the first failure; later
    /// gates are not run.
    ///
    /// `time_since_last_ms` is `None` when no ignition has happened yet,
    /// which trivially satisfies the refractory check.
    /// `events_in_last_second` counts attempts started inside the rolling
    /// one-second window, excluding the one being checked.
    pub fn check_triggers(
        &self,
        salience_composite: f64,
        resources: &ResourceSnapshot,
        time_since_last_ms: Option<f64>,
        events_in_last_second: usize,
        arousal: f64,
    ) -> TriggerDecision {
        let failure = self
            .check_salience(salience_composite)
            .or_else(|| self.check_resources(resources))
            .or_else(|| self.check_temporal(time_since_last_ms, events_in_last_second))
            .or_else(|| self.check_arousal(arousal));

        match failure {
            Some((gate, reason)) => {
                debug!(?gate, %reason, "trigger check failed");
                TriggerDecision::fail(gate, reason)
            }
            None => TriggerDecision::pass(),
        }
    }

    fn check_salience(&self, composite: f64) -> Option<(TriggerGate, String)> {
        let min = self.conditions.min_salience;
        if composite < min {
            return Some((
                TriggerGate::Salience,
                format!("Salience too low ({composite:.2} < {min:.2})"),
            ));
        }
        None
    }

    fn check_resources(&self, resources: &ResourceSnapshot) -> Option<(TriggerGate, String)> {
        let nodes = resources.eligible_nodes;
        let latency = resources.avg_latency_ms;
        let ok = nodes >= self.conditions.min_available_nodes
            && latency <= self.conditions.max_fabric_latency_ms
            && resources.cpu_capacity >= self.conditions.min_cpu_capacity;
        if !ok {
            return Some((
                TriggerGate::Resource,
                format!("Insufficient resources (nodes={nodes}, latency={latency:.1}ms)"),
            ));
        }
        None
    }

    fn check_temporal(
        &self,
        time_since_last_ms: Option<f64>,
        events_in_last_second: usize,
    ) -> Option<(TriggerGate, String)> {
        if let Some(elapsed) = time_since_last_ms {
            let refractory = self.conditions.refractory_period_ms;
            if elapsed < refractory {
                return Some((
                    TriggerGate::Temporal,
                    format!(
                        "Refractory period violation (time_since_last={elapsed:.1}ms < {refractory:.1}ms)"
                    ),
                ));
            }
        }

        if events_in_last_second >= self.conditions.max_events_per_second {
            return Some((
                TriggerGate::Temporal,
                format!("Burst limit reached ({events_in_last_second} events in 1s window)"),
            ));
        }

        None
    }

    fn check_arousal(&self, arousal: f64) -> Option<(TriggerGate, String)> {
        let min = self.conditions.min_arousal_level;
        if arousal < min {
            return Some((
                TriggerGate::Arousal,
                format!("Arousal too low ({arousal:.2} < {min:.2})"),
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> TriggerValidator {
        TriggerValidator::new(TriggerConditions::default())
    }

    fn healthy_resources() -> ResourceSnapshot {
        ResourceSnapshot {
            eligible_nodes: 5,
            avg_latency_ms: 10.0,
            cpu_capacity: 0.60,
        }
    }

    #[test]
    fn test_all_gates_pass() {
        let decision = validator().check_triggers(0.85, &healthy_resources(), None, 0, 0.70);
        assert!(decision.passed);
        assert!(decision.gate.is_none());
        assert_eq!(decision.reason, "All trigger gates passed");
    }

    #[test]
    fn test_salience_gate_fails_first() {
        // every other gate would also fail; salience must win
        let starved = ResourceSnapshot {
            eligible_nodes: 0,
            avg_latency_ms: 500.0,
            cpu_capacity: 0.0,
        };
        let decision = validator().check_triggers(0.10, &starved, Some(1.0), 100, 0.0);
        assert!(!decision.passed);
        assert_eq!(decision.gate, Some(TriggerGate::Salience));
        assert_eq!(decision.reason, "Salience too low (0.10 < 0.60)");
    }

    #[test]
    fn test_resource_gate_node_count() {
        let thin = ResourceSnapshot {
            eligible_nodes: 2,
            avg_latency_ms: 10.0,
            cpu_capacity: 0.60,
        };
        let decision = validator().check_triggers(0.85, &thin, None, 0, 0.70);
        assert_eq!(decision.gate, Some(TriggerGate::Resource));
        assert_eq!(decision.reason, "Insufficient resources (nodes=2, latency=10.0ms)");
    }

    #[test]
    fn test_resource_gate_latency_ceiling() {
        let slow = ResourceSnapshot {
            eligible_nodes: 5,
            avg_latency_ms: 25.0,
            cpu_capacity: 0.60,
        };
        let decision = validator().check_triggers(0.85, &slow, None, 0, 0.70);
        assert_eq!(decision.gate, Some(TriggerGate::Resource));
    }

    #[test]
    fn test_resource_gate_capacity_floor() {
        let busy = ResourceSnapshot {
            eligible_nodes: 5,
            avg_latency_ms: 10.0,
            cpu_capacity: 0.10,
        };
        let decision = validator().check_triggers(0.85, &busy, None, 0, 0.70);
        assert_eq!(decision.gate, Some(TriggerGate::Resource));
    }

    #[test]
    fn test_refractory_period_names_both_durations() {
        let conditions = TriggerConditions {
            refractory_period_ms: 1000.0,
            ..TriggerConditions::default()
        };
        let validator = TriggerValidator::new(conditions);

        let decision =
            validator.check_triggers(0.85, &healthy_resources(), Some(500.0), 0, 0.70);
        assert!(!decision.passed);
        assert_eq!(decision.gate, Some(TriggerGate::Temporal));
        assert_eq!(
            decision.reason,
            "Refractory period violation (time_since_last=500.0ms < 1000.0ms)"
        );
    }

    #[test]
    fn test_no_prior_ignition_skips_refractory() {
        let decision = validator().check_triggers(0.85, &healthy_resources(), None, 0, 0.70);
        assert!(decision.passed);
    }

    #[test]
    fn test_burst_limit() {
        let conditions = TriggerConditions::default();
        let cap = conditions.max_events_per_second;
        let validator = TriggerValidator::new(conditions);

        let at_cap = validator.check_triggers(0.85, &healthy_resources(), None, cap, 0.70);
        assert_eq!(at_cap.gate, Some(TriggerGate::Temporal));
        assert_eq!(at_cap.reason, format!("Burst limit reached ({cap} events in 1s window)"));

        let below = validator.check_triggers(0.85, &healthy_resources(), None, cap - 1, 0.70);
        assert!(below.passed);
    }

    #[test]
    fn test_arousal_gate() {
        let decision = validator().check_triggers(0.85, &healthy_resources(), None, 0, 0.20);
        assert_eq!(decision.gate, Some(TriggerGate::Arousal));
        assert_eq!(decision.reason, "Arousal too low (0.20 < 0.40)");
    }

    #[test]
    fn test_gate_order_is_deterministic() {
        // resource and temporal both bad: resource reports first
        let thin = ResourceSnapshot {
            eligible_nodes: 0,
            avg_latency_ms: 10.0,
            cpu_capacity: 0.60,
        };
        let decision = validator().check_triggers(0.85, &thin, Some(1.0), 100, 0.70);
        assert_eq!(decision.gate, Some(TriggerGate::Resource));

        // temporal and arousal both bad: temporal reports first
        let decision = validator().check_triggers(0.85, &healthy_resources(), Some(1.0), 0, 0.0);
        assert_eq!(decision.gate, Some(TriggerGate::Temporal));
    }
}
