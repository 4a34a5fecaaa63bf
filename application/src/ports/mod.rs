//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod call_telemetry;
pub mod model_backend;
pub mod round_guard;
pub mod round_store;
