//! ESGT Core Library
//!
//! Provides the domain types, collaborator traits, configuration, and stub
//! implementations shared by the ESGT (emergent synchronization / global
//! transmission) ignition fabric.
//!
//! # Architecture
//!
//! This crate defines:
//! - Fabric node model (`FabricNodeInfo`, `NodeState`, `FabricMetrics`)
//! - Salience model (`SalienceScore`, `SalienceWeights`, `SalienceLevel`)
//! - Collaborator traits (`FabricProvider`, `ArousalProvider`, `BroadcastSink`)
//! - Error types and result aliases (`CoreError`, `CoreResult`)
//! - Layered configuration (`EsgtConfig` and its sections)
//! - In-memory stubs for tests and standalone operation
//!
//! The synchronization engine itself (Kuramoto network, clock synchronizer,
//! trigger validator, ignition coordinator) lives in the `esgt-sync` crate.
//!
//! # Example
//!
//! ```
//! use esgt_core::salience::SalienceScore;
//!
//! let salience = SalienceScore::new(0.8, 0.6, 0.7, 0.9);
//! assert!(salience.composite() > 0.6);
//! ```

pub mod config;
pub mod error;
pub mod fabric;
pub mod salience;
pub mod stubs;
pub mod traits;

// Re-exports for convenience
pub use config::{
    ClockConfig, CoherenceBands, EsgtConfig, FabricConfig, IgnitionConfig, IntegrationMethod,
    OscillatorConfig, TriggerConditions,
};
pub use error::{CoreError, CoreResult};
pub use fabric::{FabricMetrics, FabricNodeInfo, NodeState, PeerConnection};
pub use salience::{SalienceLevel, SalienceScore, SalienceWeights};
pub use traits::{ArousalProvider, BroadcastSink, FabricProvider, TimeSourceFn};
