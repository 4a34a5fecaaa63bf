//! Shared utilities for use cases.
//!
//! [`RoundContext`] carries the round id, the round's cancellation scope,
//! and the channel stages use to emit events toward the coordinator.

use council_domain::DeliberationEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Stand-in for "never" when a deadline would overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `from + after`, saturating to roughly thirty years out.
pub(crate) fn deadline_after(from: Instant, after: Duration) -> Instant {
    from.checked_add(after).unwrap_or_else(|| from + FAR_FUTURE)
}

/// Per-round context threaded through every stage and call.
///
/// Clones share the same cancellation token and event channel.
#[derive(Clone)]
pub struct RoundContext {
    round_id: String,
    cancel: CancellationToken,
    events: mpsc::Sender<DeliberationEvent>,
}

impl RoundContext {
    pub fn new(
        round_id: impl Into<String>,
        cancel: CancellationToken,
        events: mpsc::Sender<DeliberationEvent>,
    ) -> Self {
        Self {
            round_id: round_id.into(),
            cancel,
            events,
        }
    }

    pub fn round_id(&self) -> &str {
        &self.round_id
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the round is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Emit a stage event. Dropped silently once the round is cancelled.
    pub async fn emit(&self, event: DeliberationEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        // The receiver lives as long as the coordinator
        let _ = self.events.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_suppressed_after_cancel() {
        let (tx, mut rx) = mpsc::channel(4);
        let ctx = RoundContext::new("r1", CancellationToken::new(), tx);

        ctx.emit(DeliberationEvent::Keepalive).await;
        ctx.cancellation_token().cancel();
        ctx.emit(DeliberationEvent::Keepalive).await;
        drop(ctx);

        assert!(matches!(rx.recv().await, Some(DeliberationEvent::Keepalive)));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_deadline_saturates_instead_of_overflowing() {
        let now = Instant::now();
        assert_eq!(deadline_after(now, Duration::from_secs(5)), now + Duration::from_secs(5));
        assert_eq!(deadline_after(now, Duration::MAX), now + FAR_FUTURE);
        assert_eq!(
            deadline_after(now, Duration::from_secs(u64::MAX)),
            now + FAR_FUTURE
        );
    }

    #[test]
    fn test_clones_share_cancellation() {
        let (tx, _rx) = mpsc::channel(1);
        let ctx = RoundContext::new("r1", CancellationToken::new(), tx);
        let clone = ctx.clone();
        ctx.cancellation_token().cancel();
        assert!(clone.is_cancelled());
        assert_eq!(clone.round_id(), "r1");
    }
}
