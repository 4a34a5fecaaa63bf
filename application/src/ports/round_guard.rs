//! Round guard port
//!
//! At most one pipeline run may be in flight per round id. The guard is an
//! injected collaborator so that a multi-process deployment can back it with
//! shared external state instead of process memory.

use async_trait::async_trait;

/// Exclusive claim on a round id
#[async_trait]
pub trait RoundGuard: Send + Sync {
    /// Claim `round_id`. Returns `false` if another run holds it.
    async fn try_acquire(&self, round_id: &str) -> bool;

    /// Release a claim taken with [`try_acquire`](RoundGuard::try_acquire).
    async fn release(&self, round_id: &str);
}

/// Guard that grants every claim; for tests and single-shot CLI runs.
pub struct NoRoundGuard;

#[async_trait]
impl RoundGuard for NoRoundGuard {
    async fn try_acquire(&self, _round_id: &str) -> bool {
        true
    }

    async fn release(&self, _round_id: &str) {}
}
