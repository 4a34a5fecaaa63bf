//! Infrastructure layer for council
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod logging;
pub mod openrouter;
pub mod round_guard;
pub mod storage;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileBackendConfig, FileConfig, FileDeliberationConfig,
    FileModelsConfig, FileStorageConfig,
};
pub use logging::JsonlCallTelemetry;
pub use openrouter::{OpenRouterBackend, OpenRouterError, OpenRouterSettings};
pub use round_guard::InMemoryRoundGuard;
pub use storage::LocalRoundStore;
