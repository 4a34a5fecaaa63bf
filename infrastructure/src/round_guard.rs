//! Single-process [`RoundGuard`].

use async_trait::async_trait;
use council_application::RoundGuard;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::warn;

/// Tracks round ids with a run in flight, in memory.
///
/// Only guards rounds started through the same instance; a multi-process
/// deployment needs a shared implementation.
#[derive(Default)]
pub struct InMemoryRoundGuard {
    active: Mutex<HashSet<String>>,
}

impl InMemoryRoundGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, round_id: &str) -> bool {
        self.active
            .lock()
            .map(|active| active.contains(round_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl RoundGuard for InMemoryRoundGuard {
    async fn try_acquire(&self, round_id: &str) -> bool {
        match self.active.lock() {
            Ok(mut active) => active.insert(round_id.to_string()),
            Err(_) => {
                warn!(round_id, "Round guard lock poisoned, refusing round");
                false
            }
        }
    }

    async fn release(&self, round_id: &str) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(round_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_second_acquire_is_refused_until_release() {
        let guard = InMemoryRoundGuard::new();

        assert!(guard.try_acquire("msg-1").await);
        assert!(!guard.try_acquire("msg-1").await);
        assert!(guard.try_acquire("msg-2").await);
        assert!(guard.is_active("msg-1"));

        guard.release("msg-1").await;
        assert!(!guard.is_active("msg-1"));
        assert!(guard.try_acquire("msg-1").await);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_admits_one() {
        let guard = Arc::new(InMemoryRoundGuard::new());
        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let guard = Arc::clone(&guard);
                tokio::spawn(async move { guard.try_acquire("contended").await })
            })
            .collect();

        let mut admitted = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }
}
