//! Logging infrastructure: machine-readable call telemetry.
//!
//! Provides [`JsonlCallTelemetry`], a JSONL file writer that implements
//! the [`CallTelemetry`](council_application::CallTelemetry) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlCallTelemetry;
