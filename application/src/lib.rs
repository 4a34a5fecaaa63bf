//! Application layer for council
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{CallPolicy, DeliberationConfig};
pub use ports::{
    call_telemetry::{CallPurpose, CallRecord, CallTelemetry, NoCallTelemetry},
    model_backend::{
        BackendChunk, BackendError, BackendErrorKind, BackendReply, ChunkStream, InvokeOptions,
        ModelBackend,
    },
    round_guard::{NoRoundGuard, RoundGuard},
    round_store::{NoRoundStore, RoundStore, StoreError},
};
pub use use_cases::fan_out::{FanOutError, FanOutStage, QuorumError};
pub use use_cases::ranking::{RankingError, RankingOutcome, RankingStage};
pub use use_cases::resilient_caller::{CallError, ResilientCaller};
pub use use_cases::shared::RoundContext;
pub use use_cases::stream_coordinator::{
    RoundError, RoundHandle, RoundRequest, StreamCoordinator,
};
pub use use_cases::synthesis::{SynthesisError, SynthesisStage};
