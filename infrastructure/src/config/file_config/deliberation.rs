//! Round behaviour from TOML (`[deliberation]` section)

use council_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Round behaviour configuration
///
/// # Example
///
/// ```toml
/// [deliberation]
/// quorum = 3                    # default: majority of members, at least 2
/// keepalive_interval_secs = 15
/// lead_judgment_weight = 1.0    # >1.0 favours the lead's own ranking
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDeliberationConfig {
    /// Minimum successful Stage 1 answers
    pub quorum: Option<usize>,
    /// Idle time before a keepalive is emitted
    pub keepalive_interval_secs: u64,
    /// Multiplier for the points of the lead model's judgment
    pub lead_judgment_weight: f64,
}

impl Default for FileDeliberationConfig {
    fn default() -> Self {
        Self {
            quorum: None,
            keepalive_interval_secs: 15,
            lead_judgment_weight: 1.0,
        }
    }
}

impl FileDeliberationConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.quorum == Some(0) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::QuorumOutOfRange,
                "deliberation.quorum: must be at least 1",
            ));
        }
        if self.keepalive_interval_secs == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroDuration,
                "deliberation.keepalive_interval_secs: cannot be 0",
            ));
        }
        if !self.lead_judgment_weight.is_finite() || self.lead_judgment_weight < 0.0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidWeight,
                format!(
                    "deliberation.lead_judgment_weight: {} is not a non-negative number",
                    self.lead_judgment_weight
                ),
            ));
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FileDeliberationConfig::default();
        assert_eq!(config.quorum, None);
        assert_eq!(config.keepalive_interval(), Duration::from_secs(15));
        assert_eq!(config.lead_judgment_weight, 1.0);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_invalid_values() {
        let config = FileDeliberationConfig {
            quorum: Some(0),
            keepalive_interval_secs: 0,
            lead_judgment_weight: -1.0,
        };
        let codes: Vec<ConfigIssueCode> = config.validate().iter().map(|i| i.code).collect();
        assert_eq!(
            codes,
            vec![
                ConfigIssueCode::QuorumOutOfRange,
                ConfigIssueCode::ZeroDuration,
                ConfigIssueCode::InvalidWeight
            ]
        );
    }
}
