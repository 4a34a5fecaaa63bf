//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application types once
//! validated.

mod backend;
mod deliberation;
mod models;
mod storage;

pub use backend::FileBackendConfig;
pub use deliberation::FileDeliberationConfig;
pub use models::FileModelsConfig;
pub use storage::FileStorageConfig;

use council_application::DeliberationConfig;
use council_domain::{ConfigIssue, ConfigIssueCode, DomainError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("invalid configuration:\n{}", format_issues(.0))]
    Invalid(Vec<ConfigIssue>),

    #[error(transparent)]
    Selection(#[from] DomainError),
}

fn format_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("  {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Council members and lead
    pub models: FileModelsConfig,
    /// Quorum, keepalive and ranking weights
    pub deliberation: FileDeliberationConfig,
    /// OpenRouter connection and retry policy
    pub backend: FileBackendConfig,
    /// Round store and telemetry locations
    pub storage: FileStorageConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        issues.extend(self.models.validate());
        issues.extend(self.backend.validate());
        issues.extend(self.deliberation.validate());

        if let Some(quorum) = self.deliberation.quorum {
            let members = self.models.distinct_members();
            if quorum > members {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::QuorumOutOfRange,
                    format!(
                        "deliberation.quorum: {quorum} exceeds the {members} configured members"
                    ),
                ));
            }
        }

        issues
    }

    /// Build the runtime configuration, failing on any error-level issue.
    pub fn to_deliberation_config(&self) -> Result<DeliberationConfig, ConfigValidationError> {
        let errors: Vec<ConfigIssue> = self
            .validate()
            .into_iter()
            .filter(ConfigIssue::is_error)
            .collect();
        if !errors.is_empty() {
            return Err(ConfigValidationError::Invalid(errors));
        }

        let mut config = DeliberationConfig::new(self.models.to_selection()?)
            .with_keepalive_interval(self.deliberation.keepalive_interval())
            .with_lead_judgment_weight(self.deliberation.lead_judgment_weight)
            .with_call_policy(self.backend.call_policy());
        if let Some(quorum) = self.deliberation.quorum {
            config = config.with_quorum(quorum);
        }
        Ok(config)
    }
}
