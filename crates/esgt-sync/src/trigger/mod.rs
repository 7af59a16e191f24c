//! Ignition trigger gates: the stateless validator and its decision types.

pub mod validator;

pub use validator::{ResourceSnapshot, TriggerDecision, TriggerGate, TriggerValidator};
