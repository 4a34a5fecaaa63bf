//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod fan_out;
pub mod ranking;
pub mod resilient_caller;
pub mod shared;
pub mod stream_coordinator;
pub mod synthesis;
