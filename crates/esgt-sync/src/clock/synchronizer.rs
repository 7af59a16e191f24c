//! PTP-style clock synchronization.
//!
//! Each node runs one synchronizer. A grand master exposes a monotonic
//! reference time; slaves estimate their offset against a supplied time
//! accessor using round-trip midpoint estimation:
//!
//! ```text
//! offset = t_master - (t1 + t4) / 2,   delay = t4 - t1
//! ```
//!
//! Jitter is the standard deviation across a bounded window of recent
//! offset estimates. Coherence math upstream assumes comparable time bases,
//! so the coordinator gates ignition on `is_ready_for_esgt`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info};

use esgt_core::{ClockConfig, TimeSourceFn};

use super::models::{ClockOffset, ClockRole, SyncResult, SyncState};

/// Spread of the simulated master offset used when no time source is
/// supplied (standalone/testing mode), nanoseconds.
const SIMULATED_OFFSET_SPREAD_NS: f64 = 500.0;

#[derive(Debug)]
struct ClockState {
    sync_state: SyncState,
    offset_ns: f64,
    jitter_ns: f64,
    quality: f64,
    offsets: VecDeque<f64>,
    last_sync_at: Option<DateTime<Utc>>,
    rounds: u64,
}

/// Per-node clock synchronizer.
///
/// All methods take `&self`; interior state sits behind a mutex that is
/// never held across an await point, so the synchronizer can be shared via
/// `Arc` between the coordinator and a background `continuous_sync` task.
#[derive(Debug)]
pub struct ClockSynchronizer {
    node_id: String,
    role: ClockRole,
    config: ClockConfig,
    state: Mutex<ClockState>,
    running: AtomicBool,
    /// Wall-clock nanoseconds captured at construction; combined with a
    /// monotonic `Instant` so reported time never goes backwards.
    wall_base_ns: u64,
    started: Instant,
}

impl ClockSynchronizer {
    pub fn new(node_id: impl Into<String>, role: ClockRole, config: ClockConfig) -> Self {
        let wall_base_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(1, |d| d.as_nanos() as u64);

        Self {
            node_id: node_id.into(),
            role,
            config,
            state: Mutex::new(ClockState {
                sync_state: SyncState::Unsynchronized,
                offset_ns: 0.0,
                jitter_ns: 0.0,
                quality: 0.0,
                offsets: VecDeque::new(),
                last_sync_at: None,
                rounds: 0,
            }),
            running: AtomicBool::new(false),
            wall_base_ns,
            started: Instant::now(),
        }
    }

    fn guard(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Monotonic reference time in nanoseconds, always positive.
    #[inline]
    pub fn get_time_ns(&self) -> u64 {
        self.wall_base_ns + self.started.elapsed().as_nanos() as u64
    }

    #[inline]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    #[inline]
    pub fn role(&self) -> ClockRole {
        self.role
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        let mut st = self.guard();
        if st.sync_state == SyncState::Unsynchronized {
            st.sync_state = SyncState::Synchronizing;
        }
        drop(st);
        info!(node_id = %self.node_id, role = ?self.role, "clock synchronizer started");
    }

    /// Stop background rounds. The last good offset estimate is kept.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!(node_id = %self.node_id, "clock synchronizer stopped");
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SyncState {
        self.guard().sync_state
    }

    /// Current best-known offset estimate.
    pub fn offset(&self) -> ClockOffset {
        let st = self.guard();
        ClockOffset {
            offset_ns: st.offset_ns,
            jitter_ns: st.jitter_ns,
            quality: st.quality,
            last_sync_at: st.last_sync_at,
        }
    }

    /// Completed synchronization rounds.
    pub fn sync_rounds(&self) -> u64 {
        self.guard().rounds
    }

    /// Offset estimates currently in the jitter window.
    pub fn offset_sample_count(&self) -> usize {
        self.guard().offsets.len()
    }

    /// Round quality, monotonically decreasing in jitter and delay and
    /// clamped to [0, 1].
    pub fn quality(&self, jitter_ns: f64, delay_ns: f64) -> f64 {
        let jitter = jitter_ns.max(0.0);
        let delay = delay_ns.max(0.0);
        let target = self.config.target_jitter_ns;
        let jitter_factor = target / (target + jitter);
        let delay_factor = 1.0 / (1.0 + delay / 1e6);
        (jitter_factor * delay_factor).clamp(0.0, 1.0)
    }

    /// True only when synchronized with jitter within target.
    pub fn is_ready_for_esgt(&self) -> bool {
        let st = self.guard();
        st.sync_state == SyncState::Synchronized && st.jitter_ns <= self.config.target_jitter_ns
    }

    /// Run one synchronization round against `peer_id`.
    ///
    /// Never fails: a missing `time_source` falls back to an internally
    /// simulated master offset, and a degraded round simply lowers the
    /// quality and may drop the state back to `Synchronizing`.
    pub async fn sync_to_master(
        &self,
        peer_id: &str,
        time_source: Option<&TimeSourceFn>,
    ) -> SyncResult {
        let t1 = self.get_time_ns() as f64;

        // The yield marks the request/response boundary of the round.
        tokio::task::yield_now().await;

        let master_time = match time_source {
            Some(source) => source() as f64,
            None => {
                let noise = rand::thread_rng()
                    .gen_range(-SIMULATED_OFFSET_SPREAD_NS..SIMULATED_OFFSET_SPREAD_NS);
                self.get_time_ns() as f64 + noise
            }
        };

        let t4 = self.get_time_ns() as f64;
        let delay_ns = (t4 - t1).max(0.0);
        let offset_ns = master_time - (t1 + t4) / 2.0;

        let (jitter_ns, quality, sync_state) = {
            let mut st = self.guard();
            st.offsets.push_back(offset_ns);
            while st.offsets.len() > self.config.offset_window {
                st.offsets.pop_front();
            }
            let jitter_ns = stddev(&st.offsets);
            let quality = self.quality(jitter_ns, delay_ns);

            st.offset_ns = offset_ns;
            st.jitter_ns = jitter_ns;
            st.quality = quality;
            st.last_sync_at = Some(Utc::now());
            st.rounds += 1;
            st.sync_state = if jitter_ns <= self.config.target_jitter_ns {
                SyncState::Synchronized
            } else {
                SyncState::Synchronizing
            };
            (jitter_ns, quality, st.sync_state)
        };

        debug!(
            node_id = %self.node_id,
            peer_id,
            offset_ns,
            jitter_ns,
            quality,
            state = ?sync_state,
            "clock sync round complete"
        );

        SyncResult {
            success: true,
            offset_ns,
            jitter_ns,
            quality,
        }
    }

    /// Repeat `sync_to_master` on a fixed cadence until `stop` is called or
    /// the owning task is aborted. Aborting between rounds leaves the last
    /// good offset intact.
    pub async fn continuous_sync(
        &self,
        peer_id: &str,
        interval: Duration,
        time_source: Option<Arc<TimeSourceFn>>,
    ) {
        info!(
            node_id = %self.node_id,
            peer_id,
            interval_ms = interval.as_millis() as u64,
            "continuous clock sync started"
        );

        while self.running.load(Ordering::SeqCst) {
            self.sync_to_master(peer_id, time_source.as_deref()).await;
            tokio::time::sleep(interval).await;
        }

        info!(node_id = %self.node_id, peer_id, "continuous clock sync stopped");
    }
}

/// Population standard deviation; zero below two samples.
fn stddev(samples: &VecDeque<f64>) -> f64 {
    let n = samples.len();
    if n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let mean = samples.iter().sum::<f64>() / nf;
    let variance = samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / nf;
    variance.sqrt()
}
