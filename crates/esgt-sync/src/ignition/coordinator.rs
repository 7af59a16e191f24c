//! Five-phase ignition coordinator.
//!
//! PREPARE → SYNCHRONIZE → BROADCAST → SUSTAIN → DISSOLVE, strictly linear.
//! The coordinator composes the trigger validator, the Kuramoto network,
//! and the clock synchronizer through owned handles and narrow calls; no
//! state is shared behind its back.
//!
//! Every attempt ends at an unbiased baseline: success, timeout, and abort
//! all run dissolution before returning, so oscillators are never left
//! coupled-but-abandoned.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use esgt_core::{ArousalProvider, BroadcastSink, EsgtConfig, FabricProvider, SalienceScore};

use crate::clock::{ClockRole, ClockSynchronizer};
use crate::error::{EsgtError, EsgtResult};
use crate::ignition::event::{EsgtEvent, EsgtPhase, EventOutcome};
use crate::ignition::stats::CoordinatorStats;
use crate::kuramoto::{KuramotoNetwork, Topology};
use crate::metrics::EsgtMetrics;
use crate::trigger::{ResourceSnapshot, TriggerDecision, TriggerGate, TriggerValidator};

#[derive(Debug, Default)]
struct CoordinatorState {
    last_ignition_at: Option<DateTime<Utc>>,
    recent_starts: VecDeque<DateTime<Utc>>,
    event_history: VecDeque<EsgtEvent>,
    stats: CoordinatorStats,
    active_event: Option<EsgtEvent>,
}

/// Resets the in-flight flag on every exit path out of `ignite`.
struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Drives full ignition episodes over a node fabric.
///
/// One coordinator runs at most one attempt at a time; `ignite` is a single
/// cooperative async call that yields at integration-step boundaries and is
/// wall-clock bounded in every phase.
pub struct EsgtCoordinator {
    coordinator_id: String,
    config: EsgtConfig,
    network: Arc<RwLock<KuramotoNetwork>>,
    validator: TriggerValidator,
    clock: Arc<ClockSynchronizer>,
    fabric: Arc<dyn FabricProvider>,
    arousal: Arc<dyn ArousalProvider>,
    sink: Arc<dyn BroadcastSink>,
    running: AtomicBool,
    in_flight: AtomicBool,
    state: Mutex<CoordinatorState>,
}

impl EsgtCoordinator {
    pub fn new(
        coordinator_id: impl Into<String>,
        config: EsgtConfig,
        fabric: Arc<dyn FabricProvider>,
        arousal: Arc<dyn ArousalProvider>,
        sink: Arc<dyn BroadcastSink>,
    ) -> Self {
        let network = KuramotoNetwork::new(config.oscillator.clone(), config.bands.clone());
        Self::build(coordinator_id.into(), config, network, fabric, arousal, sink)
    }

    /// Deterministic construction: the oscillator network draws phases and
    /// noise from a seeded generator.
    pub fn with_seed(
        coordinator_id: impl Into<String>,
        config: EsgtConfig,
        seed: u64,
        fabric: Arc<dyn FabricProvider>,
        arousal: Arc<dyn ArousalProvider>,
        sink: Arc<dyn BroadcastSink>,
    ) -> Self {
        let network =
            KuramotoNetwork::with_seed(config.oscillator.clone(), config.bands.clone(), seed);
        Self::build(coordinator_id.into(), config, network, fabric, arousal, sink)
    }

    fn build(
        coordinator_id: String,
        config: EsgtConfig,
        network: KuramotoNetwork,
        fabric: Arc<dyn FabricProvider>,
        arousal: Arc<dyn ArousalProvider>,
        sink: Arc<dyn BroadcastSink>,
    ) -> Self {
        let clock = Arc::new(ClockSynchronizer::new(
            coordinator_id.clone(),
            ClockRole::Slave,
            config.clock.clone(),
        ));
        let validator = TriggerValidator::new(config.triggers.clone());

        Self {
            coordinator_id,
            config,
            network: Arc::new(RwLock::new(network)),
            validator,
            clock,
            fabric,
            arousal,
            sink,
            running: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[inline]
    pub fn coordinator_id(&self) -> &str {
        &self.coordinator_id
    }

    #[inline]
    pub fn config(&self) -> &EsgtConfig {
        &self.config
    }

    /// Shared handle to the oscillator network, for observers. Phase state
    /// is only ever mutated by the coordinator itself.
    pub fn network(&self) -> Arc<RwLock<KuramotoNetwork>> {
        self.network.clone()
    }

    pub fn clock(&self) -> Arc<ClockSynchronizer> {
        self.clock.clone()
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        self.clock.start();
        info!(coordinator_id = %self.coordinator_id, "ignition coordinator started");
    }

    /// Stop accepting attempts. An in-flight SUSTAIN notices the flag at
    /// its next step boundary and downgrades to dissolution.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.clock.stop();
        info!(coordinator_id = %self.coordinator_id, "ignition coordinator stopped");
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.guard().stats.clone()
    }

    /// Last `n` finished events, newest first.
    pub fn recent_events(&self, n: usize) -> Vec<EsgtEvent> {
        self.guard().event_history.iter().rev().take(n).cloned().collect()
    }

    /// Snapshot of the in-flight event, refreshed at phase boundaries.
    pub fn active_event(&self) -> Option<EsgtEvent> {
        self.guard().active_event.clone()
    }

    /// Observability snapshot across network, clock, and statistics.
    pub async fn metrics(&self) -> EsgtMetrics {
        let (oscillator_count, current_coherence) = {
            let network = self.network.read().await;
            (network.oscillator_count(), network.order_parameter())
        };
        EsgtMetrics {
            coordinator_id: self.coordinator_id.clone(),
            running: self.is_running(),
            oscillator_count,
            current_coherence,
            clock_state: self.clock.state(),
            stats: self.guard().stats.clone(),
        }
    }

    /// Run one full ignition episode for `content`.
    ///
    /// Returns the completed event only when every phase ran through
    /// dissolution. Gate rejections, synchronization timeouts, and
    /// mid-flight aborts come back as typed errors; the latter two leave a
    /// terminal event in history and always reset the network first.
    pub async fn ignite(
        &self,
        content: serde_json::Value,
        salience: SalienceScore,
    ) -> EsgtResult<EsgtEvent> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(EsgtError::NotRunning);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EsgtError::AttemptInFlight);
        }
        let _flight = FlightGuard { flag: &self.in_flight };

        if self.config.ignition.require_clock_sync && !self.clock.is_ready_for_esgt() {
            return Err(EsgtError::ClockNotReady {
                state: self.clock.state(),
            });
        }

        // ---- PREPARE ----
        let composite = salience.composite_with(&self.config.salience);
        let decision = self.evaluate_triggers(composite).await;
        if !decision.passed {
            let gate = decision.gate.unwrap_or(TriggerGate::Salience);
            self.guard().stats.record_rejection(gate);
            debug!(
                coordinator_id = %self.coordinator_id,
                ?gate,
                reason = %decision.reason,
                "ignition rejected"
            );
            return Err(EsgtError::TriggerRejected {
                gate,
                reason: decision.reason,
            });
        }

        let mut event = EsgtEvent::new(content, salience);
        event.record_phase(EsgtPhase::Prepare);
        let started_at = Utc::now();
        {
            let mut st = self.guard();
            st.last_ignition_at = Some(started_at);
            st.recent_starts.push_back(started_at);
            st.active_event = Some(event.clone());
        }
        info!(
            coordinator_id = %self.coordinator_id,
            event_id = %event.event_id,
            salience = composite,
            "ignition attempt started"
        );

        // ---- SYNCHRONIZE ----
        event.record_phase(EsgtPhase::Synchronize);
        let recruited = self.recruit_nodes(&event.content).await;
        if recruited.is_empty() {
            return self
                .finish_aborted(event, None, "no eligible nodes at recruitment")
                .await;
        }
        event.participating_nodes = recruited.into_iter().collect();
        let topology = self.build_topology(&event.participating_nodes).await;
        self.update_active(&event);

        let target = self.config.triggers.min_coherence;
        let dt = self.config.ignition.dt;
        let dynamics = {
            let mut network = self.network.write().await;
            align_oscillators(&mut network, &event.participating_nodes);
            network
                .synchronize(
                    &topology,
                    None,
                    self.config.ignition.sync_timeout_ms,
                    target,
                    dt,
                )
                .await
        };

        let achieved = self.network.read().await.order_parameter();
        if achieved < target {
            warn!(
                coordinator_id = %self.coordinator_id,
                event_id = %event.event_id,
                achieved,
                target,
                "synchronization timed out"
            );
            event.record_phase(EsgtPhase::Dissolve);
            event.outcome = EventOutcome::SyncTimeout;
            event.achieved_coherence = event.achieved_coherence.max(achieved);
            self.dissolve(&topology).await;
            {
                let mut st = self.guard();
                st.stats.record_sync_timeout();
                st.active_event = None;
                push_history(
                    &mut st.event_history,
                    event,
                    self.config.ignition.max_event_history,
                );
            }
            return Err(EsgtError::SynchronizationTimeout { achieved, target });
        }
        event.achieved_coherence = achieved;

        // ---- BROADCAST ----
        event.record_phase(EsgtPhase::Broadcast);
        self.update_active(&event);
        if let Err(e) = self
            .sink
            .deliver(&event.event_id, &event.participating_nodes, &event.content)
            .await
        {
            warn!(
                coordinator_id = %self.coordinator_id,
                event_id = %event.event_id,
                error = %e,
                "broadcast delivery failed"
            );
            let reason = format!("broadcast failed: {e}");
            return self.finish_aborted(event, Some(&topology), &reason).await;
        }
        event.record_coherence(achieved);
        info!(
            coordinator_id = %self.coordinator_id,
            event_id = %event.event_id,
            nodes = event.participating_nodes.len(),
            coherence = achieved,
            "content broadcast to recruited nodes"
        );

        // ---- SUSTAIN ----
        event.record_phase(EsgtPhase::Sustain);
        self.update_active(&event);
        let sustain_steps =
            ((self.config.ignition.sustain_duration_ms / 1000.0) / dt).ceil() as usize;
        let step_pause = Duration::from_secs_f64(dt);

        for step in 0..sustain_steps {
            // stop() and resource loss take effect here, never mid-step
            if !self.running.load(Ordering::SeqCst) {
                return self
                    .finish_aborted(event, Some(&topology), "coordinator stopped during sustain")
                    .await;
            }
            if step % 10 == 0
                && !self
                    .participants_still_eligible(&event.participating_nodes)
                    .await
            {
                return self
                    .finish_aborted(event, Some(&topology), "recruited node lost mid-flight")
                    .await;
            }

            let coherence = {
                let mut network = self.network.write().await;
                network.update_network(&topology, None, dt)
            };
            event.record_coherence(coherence.order_parameter);
            tokio::time::sleep(step_pause).await;
        }

        // ---- DISSOLVE ----
        event.record_phase(EsgtPhase::Dissolve);
        self.update_active(&event);
        self.dissolve(&topology).await;

        event.outcome = EventOutcome::Completed;
        let time_to_sync_ms = dynamics
            .time_to_sync
            .map_or(0.0, |d| d.as_secs_f64() * 1000.0);
        {
            let mut st = self.guard();
            st.stats.record_success(time_to_sync_ms);
            st.active_event = None;
            push_history(
                &mut st.event_history,
                event.clone(),
                self.config.ignition.max_event_history,
            );
        }
        info!(
            coordinator_id = %self.coordinator_id,
            event_id = %event.event_id,
            achieved_coherence = event.achieved_coherence,
            time_to_sync_ms,
            "ignition completed"
        );
        Ok(event)
    }

    /// Gate inputs are measured here so the validator itself stays
    /// stateless.
    async fn evaluate_triggers(&self, composite: f64) -> TriggerDecision {
        let eligible = self.fabric.eligible_nodes().await;
        let fabric_metrics = self.fabric.metrics().await;
        let resources = ResourceSnapshot {
            eligible_nodes: eligible.len(),
            avg_latency_ms: fabric_metrics.avg_latency_ms(),
            cpu_capacity: self.config.ignition.cpu_capacity,
        };
        let arousal = self.arousal.current_arousal().await;

        let now = Utc::now();
        let (time_since_last_ms, recent_starts) = {
            let mut st = self.guard();
            prune_window(&mut st.recent_starts, now);
            let elapsed = st.last_ignition_at.map(|t| {
                (now - t)
                    .num_microseconds()
                    .map_or(f64::MAX, |us| us as f64 / 1000.0)
            });
            (elapsed, st.recent_starts.len())
        };

        self.validator.check_triggers(
            composite,
            &resources,
            time_since_last_ms,
            recent_starts,
            arousal,
        )
    }

    /// Select nodes for this attempt. Capability-based today: every
    /// ESGT-eligible node joins. Content-relevance scoring slots in here.
    async fn recruit_nodes(&self, _content: &serde_json::Value) -> Vec<String> {
        self.fabric.eligible_nodes().await
    }

    /// Adjacency from each recruited node's active connections, restricted
    /// to the recruited set.
    async fn build_topology(&self, recruited: &BTreeSet<String>) -> Topology {
        let mut topology = Topology::new();
        for id in recruited {
            let neighbors = match self.fabric.node(id).await {
                Some(info) => info
                    .active_neighbors()
                    .into_iter()
                    .filter(|peer| recruited.contains(peer))
                    .collect(),
                None => Vec::new(),
            };
            topology.insert(id.clone(), neighbors);
        }
        topology
    }

    async fn participants_still_eligible(&self, nodes: &BTreeSet<String>) -> bool {
        for id in nodes {
            match self.fabric.node(id).await {
                Some(info) if info.state.is_esgt_eligible() => {}
                _ => return false,
            }
        }
        true
    }

    /// Halve coupling, drive a short tail at reduced strength, then reset
    /// every oscillator to a random phase at the configured coupling
    /// strength.
    async fn dissolve(&self, topology: &Topology) {
        let dt = self.config.ignition.dt;
        let tail_steps = self.config.ignition.dissolve_tail_steps();
        let step_pause = Duration::from_secs_f64(dt);

        self.network.write().await.scale_coupling(0.5);
        for _ in 0..tail_steps {
            {
                let mut network = self.network.write().await;
                network.update_network(topology, None, dt);
            }
            tokio::time::sleep(step_pause).await;
        }
        {
            // the halving above is per-attempt; it must not compound
            let mut network = self.network.write().await;
            network.reset_all();
            network.set_coupling_strength(self.config.oscillator.coupling_strength);
        }
        debug!(
            coordinator_id = %self.coordinator_id,
            tail_steps,
            "network dissolved to baseline"
        );
    }

    async fn finish_aborted(
        &self,
        mut event: EsgtEvent,
        topology: Option<&Topology>,
        reason: &str,
    ) -> EsgtResult<EsgtEvent> {
        warn!(
            coordinator_id = %self.coordinator_id,
            event_id = %event.event_id,
            reason,
            "ignition aborted, dissolving"
        );
        event.record_phase(EsgtPhase::Dissolve);
        event.outcome = EventOutcome::Aborted;
        match topology {
            Some(topology) => self.dissolve(topology).await,
            None => self.network.write().await.reset_all(),
        }
        {
            let mut st = self.guard();
            st.stats.record_abort();
            st.active_event = None;
            push_history(
                &mut st.event_history,
                event,
                self.config.ignition.max_event_history,
            );
        }
        Err(EsgtError::Aborted(reason.to_string()))
    }

    fn update_active(&self, event: &EsgtEvent) {
        self.guard().active_event = Some(event.clone());
    }
}

/// Register oscillators for newly recruited nodes and drop ones whose node
/// is no longer recruited, so coherence is measured over exactly the
/// participating set.
fn align_oscillators(network: &mut KuramotoNetwork, recruited: &BTreeSet<String>) {
    for stale in network
        .node_ids()
        .into_iter()
        .filter(|id| !recruited.contains(id))
    {
        network.remove_oscillator(&stale);
    }
    for id in recruited {
        if !network.contains(id) {
            network.add_oscillator(id.clone());
        }
    }
}

/// Drop attempt timestamps older than the rolling one-second burst window.
fn prune_window(window: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
    let cutoff = now - chrono::Duration::seconds(1);
    while let Some(front) = window.front() {
        if *front < cutoff {
            window.pop_front();
        } else {
            break;
        }
    }
}

fn push_history(history: &mut VecDeque<EsgtEvent>, event: EsgtEvent, cap: usize) {
    history.push_back(event);
    while history.len() > cap {
        history.pop_front();
    }
}
