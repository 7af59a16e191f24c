//! Layered configuration for the ESGT ignition fabric.
//!
//! Sources, later wins:
//! 1. Built-in defaults (every section implements `Default`)
//! 2. Optional TOML file `config/{ESGT_ENV}.toml` (default env name: `default`)
//! 3. Environment overrides with prefix `ESGT`, separator `__`
//!    (e.g. `ESGT_IGNITION__DT=0.001`)
//!
//! All loaded configuration passes through [`EsgtConfig::validate`] before
//! use; components receive their section explicitly at construction, never
//! through a global.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::salience::SalienceWeights;

/// Numerical integrator used for oscillator phase updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    /// Single-evaluation explicit update. Cheap, adequate for small dt.
    Euler,
    /// 4th-order Runge-Kutta. Stable at gamma-band step sizes.
    Rk4,
}

/// Per-oscillator dynamics parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscillatorConfig {
    /// Natural frequency in Hz. Default 40.0 (gamma band).
    pub natural_frequency: f64,
    /// Coupling strength K. Clamped to [0, 10] wherever it is set.
    pub coupling_strength: f64,
    /// Std-dev of Gaussian phase noise, sampled once per step.
    pub phase_noise: f64,
    pub integration_method: IntegrationMethod,
}

impl Default for OscillatorConfig {
    fn default() -> Self {
        Self {
            natural_frequency: 40.0,
            coupling_strength: 2.0,
            phase_noise: 0.01,
            integration_method: IntegrationMethod::Rk4,
        }
    }
}

impl OscillatorConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.natural_frequency <= 0.0 || !self.natural_frequency.is_finite() {
            return Err(CoreError::InvalidConfig(format!(
                "oscillator.natural_frequency must be positive, got {}",
                self.natural_frequency
            )));
        }
        if !(0.0..=10.0).contains(&self.coupling_strength) {
            return Err(CoreError::InvalidConfig(format!(
                "oscillator.coupling_strength must be in [0, 10], got {}",
                self.coupling_strength
            )));
        }
        if self.phase_noise < 0.0 || !self.phase_noise.is_finite() {
            return Err(CoreError::InvalidConfig(format!(
                "oscillator.phase_noise must be non-negative, got {}",
                self.phase_noise
            )));
        }
        Ok(())
    }
}

/// Order-parameter thresholds mapping r to a coherence quality band.
///
/// These are empirical tuning constants, not invariants; deployments may
/// move them as long as the ordering holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoherenceBands {
    /// r at or above this is at least preconscious.
    pub preconscious: f64,
    /// r at or above this is at least conscious.
    pub conscious: f64,
    /// r at or above this is deep coherence.
    pub deep: f64,
}

impl Default for CoherenceBands {
    fn default() -> Self {
        Self {
            preconscious: 0.30,
            conscious: 0.70,
            deep: 0.90,
        }
    }
}

impl CoherenceBands {
    pub fn validate(&self) -> CoreResult<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.preconscious) || !in_unit(self.conscious) || !in_unit(self.deep) {
            return Err(CoreError::InvalidConfig(format!(
                "bands must lie in [0, 1], got {:?}",
                self
            )));
        }
        if !(self.preconscious < self.conscious && self.conscious < self.deep) {
            return Err(CoreError::InvalidConfig(format!(
                "bands must be strictly ascending (preconscious < conscious < deep), got {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// Preconditions gating an ignition attempt. All gates must pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConditions {
    /// Minimum composite salience.
    pub min_salience: f64,
    /// Target coherence an attempt must reach.
    pub min_coherence: f64,
    /// Minimum ESGT-eligible nodes in the fabric.
    pub min_available_nodes: usize,
    /// Ceiling on mean fabric latency.
    pub max_fabric_latency_ms: f64,
    /// Floor on available compute capacity.
    pub min_cpu_capacity: f64,
    /// Minimum gap since the previous ignition.
    pub refractory_period_ms: f64,
    /// Cap on events started within a rolling one-second window.
    pub max_events_per_second: usize,
    /// Minimum externally supplied arousal.
    pub min_arousal_level: f64,
}

impl Default for TriggerConditions {
    fn default() -> Self {
        Self {
            min_salience: 0.60,
            min_coherence: 0.70,
            min_available_nodes: 3,
            max_fabric_latency_ms: 10.0,
            min_cpu_capacity: 0.30,
            refractory_period_ms: 200.0,
            max_events_per_second: 5,
            min_arousal_level: 0.40,
        }
    }
}

impl TriggerConditions {
    pub fn validate(&self) -> CoreResult<()> {
        for (name, v) in [
            ("min_salience", self.min_salience),
            ("min_coherence", self.min_coherence),
            ("min_cpu_capacity", self.min_cpu_capacity),
            ("min_arousal_level", self.min_arousal_level),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(CoreError::InvalidConfig(format!(
                    "triggers.{} must be in [0, 1], got {}",
                    name, v
                )));
            }
        }
        if self.min_available_nodes == 0 {
            return Err(CoreError::InvalidConfig(
                "triggers.min_available_nodes must be at least 1".to_string(),
            ));
        }
        if self.max_fabric_latency_ms <= 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "triggers.max_fabric_latency_ms must be positive, got {}",
                self.max_fabric_latency_ms
            )));
        }
        if self.refractory_period_ms < 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "triggers.refractory_period_ms must be non-negative, got {}",
                self.refractory_period_ms
            )));
        }
        if self.max_events_per_second == 0 {
            return Err(CoreError::InvalidConfig(
                "triggers.max_events_per_second must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Clock synchronization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Jitter target in nanoseconds; readiness requires jitter within this.
    pub target_jitter_ns: f64,
    /// Cadence for `continuous_sync`.
    pub sync_interval_ms: u64,
    /// Number of recent offset estimates retained for jitter computation.
    pub offset_window: usize,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            target_jitter_ns: 1000.0,
            sync_interval_ms: 100,
            offset_window: 32,
        }
    }
}

impl ClockConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.target_jitter_ns <= 0.0 || !self.target_jitter_ns.is_finite() {
            return Err(CoreError::InvalidConfig(format!(
                "clock.target_jitter_ns must be positive, got {}",
                self.target_jitter_ns
            )));
        }
        if self.sync_interval_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "clock.sync_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.offset_window < 4 {
            return Err(CoreError::InvalidConfig(format!(
                "clock.offset_window must be at least 4, got {}",
                self.offset_window
            )));
        }
        Ok(())
    }
}

/// Ignition episode timing and bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnitionConfig {
    /// Wall bound on the SYNCHRONIZE phase.
    pub sync_timeout_ms: f64,
    /// SUSTAIN phase duration at full coupling.
    pub sustain_duration_ms: f64,
    /// DISSOLVE tail at halved coupling before reset.
    pub dissolve_tail_ms: f64,
    /// Integration step size in seconds.
    pub dt: f64,
    /// Assumed compute capacity for the resource gate.
    // TODO: replace with a host metrics probe once one is exposed by the fabric.
    pub cpu_capacity: f64,
    /// Completed/failed events retained for inspection.
    pub max_event_history: usize,
    /// Refuse ignition while the clock is not ESGT-ready.
    pub require_clock_sync: bool,
}

impl Default for IgnitionConfig {
    fn default() -> Self {
        Self {
            sync_timeout_ms: 500.0,
            sustain_duration_ms: 200.0,
            dissolve_tail_ms: 50.0,
            dt: 0.005,
            cpu_capacity: 0.60,
            max_event_history: 100,
            require_clock_sync: true,
        }
    }
}

impl IgnitionConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.dt > 0.0 && self.dt <= 0.05) {
            return Err(CoreError::InvalidConfig(format!(
                "ignition.dt must be in (0, 0.05] seconds, got {}",
                self.dt
            )));
        }
        for (name, v) in [
            ("sync_timeout_ms", self.sync_timeout_ms),
            ("sustain_duration_ms", self.sustain_duration_ms),
            ("dissolve_tail_ms", self.dissolve_tail_ms),
        ] {
            if v <= 0.0 || !v.is_finite() {
                return Err(CoreError::InvalidConfig(format!(
                    "ignition.{} must be positive, got {}",
                    name, v
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.cpu_capacity) {
            return Err(CoreError::InvalidConfig(format!(
                "ignition.cpu_capacity must be in [0, 1], got {}",
                self.cpu_capacity
            )));
        }
        if self.max_event_history == 0 {
            return Err(CoreError::InvalidConfig(
                "ignition.max_event_history must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Integration steps covering the dissolve tail (`tail_ms / dt`).
    pub fn dissolve_tail_steps(&self) -> usize {
        ((self.dissolve_tail_ms / 1000.0) / self.dt).ceil() as usize
    }
}

/// Defaults used when constructing in-memory fabrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    /// Link latency assigned to stub connections, in microseconds.
    pub default_latency_us: f64,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            default_latency_us: 500.0,
        }
    }
}

impl FabricConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.default_latency_us < 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "fabric.default_latency_us must be non-negative, got {}",
                self.default_latency_us
            )));
        }
        Ok(())
    }
}

/// Root configuration for the ignition fabric.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EsgtConfig {
    #[serde(default)]
    pub oscillator: OscillatorConfig,
    #[serde(default)]
    pub bands: CoherenceBands,
    #[serde(default)]
    pub triggers: TriggerConditions,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub ignition: IgnitionConfig,
    #[serde(default)]
    pub fabric: FabricConfig,
    #[serde(default)]
    pub salience: SalienceWeights,
}

impl EsgtConfig {
    /// Load configuration from the layered sources described in the module
    /// docs, then validate.
    pub fn load() -> CoreResult<Self> {
        let env = std::env::var("ESGT_ENV").unwrap_or_else(|_| "default".to_string());
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("ESGT").separator("__"))
            .build()?;

        let cfg: EsgtConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an explicit TOML file, then validate.
    pub fn from_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let cfg: EsgtConfig = toml::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Semantic validation across all sections.
    pub fn validate(&self) -> CoreResult<()> {
        self.oscillator.validate()?;
        self.bands.validate()?;
        self.triggers.validate()?;
        self.clock.validate()?;
        self.ignition.validate()?;
        self.fabric.validate()?;
        self.salience.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = EsgtConfig::default();
        cfg.validate().unwrap();
    }

    #[test]
    fn test_default_values_match_policy() {
        let cfg = EsgtConfig::default();
        assert_eq!(cfg.oscillator.natural_frequency, 40.0);
        assert_eq!(cfg.oscillator.coupling_strength, 2.0);
        assert_eq!(cfg.oscillator.integration_method, IntegrationMethod::Rk4);
        assert_eq!(cfg.bands.preconscious, 0.30);
        assert_eq!(cfg.bands.conscious, 0.70);
        assert_eq!(cfg.bands.deep, 0.90);
        assert!(cfg.triggers.min_salience > 0.0);
        assert!(cfg.triggers.min_coherence > 0.0);
        assert_eq!(cfg.ignition.dt, 0.005);
        assert_eq!(cfg.clock.target_jitter_ns, 1000.0);
    }

    #[test]
    fn test_dissolve_tail_steps_follow_dt() {
        let mut ignition = IgnitionConfig::default();
        assert_eq!(ignition.dissolve_tail_steps(), 10); // 50ms / 5ms

        ignition.dt = 0.001;
        assert_eq!(ignition.dissolve_tail_steps(), 50); // 50ms / 1ms
    }

    #[test]
    fn test_integration_method_serde_names() {
        assert_eq!(
            serde_json::to_string(&IntegrationMethod::Rk4).unwrap(),
            "\"rk4\""
        );
        assert_eq!(
            serde_json::to_string(&IntegrationMethod::Euler).unwrap(),
            "\"euler\""
        );
        let method: IntegrationMethod = serde_json::from_str("\"rk4\"").unwrap();
        assert_eq!(method, IntegrationMethod::Rk4);
    }

    #[test]
    fn test_bands_reject_wrong_ordering() {
        let bands = CoherenceBands {
            preconscious: 0.70,
            conscious: 0.30,
            deep: 0.90,
        };
        let err = bands.validate().unwrap_err();
        assert!(err.to_string().contains("ascending"));
    }

    #[test]
    fn test_bands_reject_out_of_unit_range() {
        let bands = CoherenceBands {
            preconscious: 0.30,
            conscious: 0.70,
            deep: 1.20,
        };
        assert!(bands.validate().is_err());
    }

    #[test]
    fn test_oscillator_rejects_bad_values() {
        let mut cfg = OscillatorConfig::default();
        cfg.natural_frequency = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = OscillatorConfig::default();
        cfg.coupling_strength = 11.0;
        assert!(cfg.validate().is_err());

        let mut cfg = OscillatorConfig::default();
        cfg.phase_noise = -0.1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_ignition_rejects_bad_dt() {
        let mut cfg = IgnitionConfig::default();
        cfg.dt = 0.0;
        assert!(cfg.validate().is_err());

        cfg.dt = 0.2;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_triggers_reject_zero_nodes() {
        let mut cfg = TriggerConditions::default();
        cfg.min_available_nodes = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_clock_rejects_small_window() {
        let mut cfg = ClockConfig::default();
        cfg.offset_window = 2;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_from_file_partial_sections_use_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[oscillator]
natural_frequency = 8.0
coupling_strength = 1.5
phase_noise = 0.0
integration_method = "euler"

[ignition]
sync_timeout_ms = 250.0
sustain_duration_ms = 100.0
dissolve_tail_ms = 50.0
dt = 0.001
cpu_capacity = 0.5
max_event_history = 10
require_clock_sync = false
"#
        )
        .unwrap();

        let cfg = EsgtConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.oscillator.natural_frequency, 8.0);
        assert_eq!(cfg.oscillator.integration_method, IntegrationMethod::Euler);
        assert_eq!(cfg.ignition.dt, 0.001);
        assert!(!cfg.ignition.require_clock_sync);
        // Untouched sections fall back to defaults.
        assert_eq!(cfg.bands, CoherenceBands::default());
        assert_eq!(cfg.triggers, TriggerConditions::default());
    }

    #[test]
    fn test_from_file_sparse_fields_within_a_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[oscillator]
coupling_strength = 3.0
"#
        )
        .unwrap();

        let cfg = EsgtConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.oscillator.coupling_strength, 3.0);
        // Unnamed fields in a named section still default.
        assert_eq!(cfg.oscillator.natural_frequency, 40.0);
        assert_eq!(cfg.oscillator.integration_method, IntegrationMethod::Rk4);
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[bands]
preconscious = 0.9
conscious = 0.7
deep = 0.95
"#
        )
        .unwrap();

        let err = EsgtConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_file_rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml [[[").unwrap();

        let err = EsgtConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, CoreError::TomlParse(_)));
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let cfg = EsgtConfig::default();
        let raw = toml::to_string(&cfg).unwrap();
        let back: EsgtConfig = toml::from_str(&raw).unwrap();
        assert_eq!(back, cfg);
    }
}
