//! Application-level configuration.
//!
//! This module provides configuration types that control how use cases behave:
//!
//! - [`CallPolicy`]: per-call timeout and retry/backoff
//! - [`DeliberationConfig`]: models, quorum, keepalive, and judgment weighting

pub mod call_policy;
pub mod deliberation_config;

pub use call_policy::CallPolicy;
pub use deliberation_config::DeliberationConfig;
