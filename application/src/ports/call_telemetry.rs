//! Port for per-call telemetry.
//!
//! Every call made by the resilient caller produces one [`CallRecord`]
//! covering all of its attempts. This is separate from `tracing`-based
//! operation logs: tracing handles human-readable diagnostics, while this
//! port captures latency and outcome in a machine-readable format (JSONL).

use council_domain::TokenUsage;
use serde::Serialize;

/// What a call was for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPurpose {
    Answer,
    Ranking,
    Synthesis,
}

impl CallPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallPurpose::Answer => "answer",
            CallPurpose::Ranking => "ranking",
            CallPurpose::Synthesis => "synthesis",
        }
    }
}

/// Outcome of one resilient call.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    pub round_id: String,
    pub model: String,
    pub purpose: CallPurpose,
    pub attempts: u32,
    /// `ok`, a backend error code (`rate_limited`, `auth`, ...), `cancelled`,
    /// `stream_interrupted`, or `empty_prompt`.
    pub outcome: &'static str,
    pub latency_ms: u64,
    pub usage: TokenUsage,
}

/// Port for recording call telemetry.
///
/// The `record` method is synchronous and non-fallible so that telemetry
/// never disrupts a call; write failures are ignored by implementations.
pub trait CallTelemetry: Send + Sync {
    fn record(&self, record: &CallRecord);
}

/// No-op implementation for tests and when telemetry is disabled.
pub struct NoCallTelemetry;

impl CallTelemetry for NoCallTelemetry {
    fn record(&self, _record: &CallRecord) {}
}
