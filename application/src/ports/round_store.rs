//! Round persistence port
//!
//! The coordinator hands the store the cumulative [`DeliberationRound`] after
//! every stage. Store failures never interrupt the outbound stream; they mark
//! the round as degraded.

use async_trait::async_trait;
use council_domain::DeliberationRound;
use thiserror::Error;

/// Errors from a round store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid round id: {0}")]
    InvalidRoundId(String),
}

/// Persistence collaborator for deliberation rounds
#[async_trait]
pub trait RoundStore: Send + Sync {
    /// Write the current state of a round, replacing any earlier version.
    async fn save(&self, round: &DeliberationRound) -> Result<(), StoreError>;

    /// Read a round back.
    async fn load(&self, round_id: &str) -> Result<Option<DeliberationRound>, StoreError>;
}

/// No-op store for tests and when persistence is disabled.
pub struct NoRoundStore;

#[async_trait]
impl RoundStore for NoRoundStore {
    async fn save(&self, _round: &DeliberationRound) -> Result<(), StoreError> {
        Ok(())
    }

    async fn load(&self, _round_id: &str) -> Result<Option<DeliberationRound>, StoreError> {
        Ok(None)
    }
}
