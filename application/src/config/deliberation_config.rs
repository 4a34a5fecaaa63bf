//! Deliberation configuration: the runtime options of a council.

use crate::config::CallPolicy;
use council_domain::{JudgmentWeights, ModelSelection};
use std::time::Duration;

/// Runtime configuration of the deliberation pipeline.
///
/// Built once at startup from the loaded config file; individual rounds may
/// narrow the model selection but never widen it.
#[derive(Debug, Clone)]
pub struct DeliberationConfig {
    /// Configured members (in order) and the lead model.
    pub selection: ModelSelection,
    /// Minimum successful Stage 1 answers; `None` means majority (minimum 2).
    pub quorum: Option<usize>,
    /// Idle time after which a keepalive event is emitted.
    pub keepalive_interval: Duration,
    /// Multiplier for the lead model's own ranking judgment.
    pub lead_judgment_weight: f64,
    /// Timeout and retry policy for every backend call.
    pub call: CallPolicy,
}

impl DeliberationConfig {
    pub fn new(selection: ModelSelection) -> Self {
        Self {
            selection,
            quorum: None,
            keepalive_interval: Duration::from_secs(15),
            lead_judgment_weight: 1.0,
            call: CallPolicy::default(),
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = Some(quorum);
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn with_lead_judgment_weight(mut self, weight: f64) -> Self {
        self.lead_judgment_weight = weight;
        self
    }

    pub fn with_call_policy(mut self, call: CallPolicy) -> Self {
        self.call = call;
        self
    }

    // ==================== Derived Values ====================

    /// Quorum for a round using `selection`, clamped to its member count.
    pub fn effective_quorum(&self, selection: &ModelSelection) -> usize {
        let members = selection.members().len();
        self.quorum
            .unwrap_or_else(|| selection.default_quorum())
            .clamp(1, members.max(1))
    }

    /// Judgment weights for a round led by `selection.lead()`.
    pub fn judgment_weights(&self, selection: &ModelSelection) -> JudgmentWeights {
        JudgmentWeights::with_lead(selection.lead().clone(), self.lead_judgment_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::ModelIdentity;

    fn selection(n: usize) -> ModelSelection {
        let members = (0..n).map(|i| ModelIdentity::member(format!("m{i}"))).collect();
        ModelSelection::new(members, ModelIdentity::lead("m0")).unwrap()
    }

    #[test]
    fn test_default_quorum_is_majority() {
        let config = DeliberationConfig::new(selection(3));
        assert_eq!(config.effective_quorum(&selection(3)), 2);
        assert_eq!(config.effective_quorum(&selection(4)), 3);
        assert_eq!(config.keepalive_interval, Duration::from_secs(15));
    }

    #[test]
    fn test_configured_quorum_is_clamped() {
        let config = DeliberationConfig::new(selection(5)).with_quorum(4);
        assert_eq!(config.effective_quorum(&selection(5)), 4);
        assert_eq!(config.effective_quorum(&selection(2)), 2);
    }

    #[test]
    fn test_lead_weight() {
        let config = DeliberationConfig::new(selection(3)).with_lead_judgment_weight(0.5);
        let weights = config.judgment_weights(&config.selection);
        assert_eq!(weights.weight_for(&ModelIdentity::member("m0")), 0.5);
        assert_eq!(weights.weight_for(&ModelIdentity::member("m1")), 1.0);
    }
}
