//! Persistence locations from TOML (`[storage]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage configuration
///
/// # Example
///
/// ```toml
/// [storage]
/// data_dir = "data/rounds"
/// telemetry_log = "logs/calls.jsonl"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    /// Directory holding one `{round_id}.json` per round
    pub data_dir: PathBuf,
    /// JSONL file receiving one record per model call
    pub telemetry_log: Option<PathBuf>,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/rounds"),
            telemetry_log: None,
        }
    }
}
