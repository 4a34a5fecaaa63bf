//! Council membership from TOML (`[models]` section)

use council_domain::{ConfigIssue, ConfigIssueCode, DomainError, ModelIdentity, ModelSelection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Council membership configuration from TOML
///
/// # Example
///
/// ```toml
/// [models]
/// members = ["openai/gpt-5.1", "google/gemini-3-pro-preview", "anthropic/claude-sonnet-4.5"]
/// lead = "google/gemini-3-pro-preview"
///
/// [models.display_names]
/// "openai/gpt-5.1" = "GPT-5.1"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileModelsConfig {
    /// OpenRouter model ids; order is the Stage 1 index order and the
    /// ranking tie-break
    pub members: Vec<String>,
    /// Model that writes the final answer
    pub lead: String,
    /// Optional display names keyed by model id
    pub display_names: BTreeMap<String, String>,
}

impl Default for FileModelsConfig {
    fn default() -> Self {
        Self {
            members: vec![
                "openai/gpt-5.1".to_string(),
                "google/gemini-3-pro-preview".to_string(),
                "anthropic/claude-sonnet-4.5".to_string(),
                "x-ai/grok-4".to_string(),
            ],
            lead: "google/gemini-3-pro-preview".to_string(),
            display_names: BTreeMap::new(),
        }
    }
}

impl FileModelsConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        let mut seen = HashSet::new();
        for id in &self.members {
            if id.trim().is_empty() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::EmptyModelId,
                    "models.members: model id cannot be empty",
                ));
            } else if !seen.insert(id.as_str()) {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::DuplicateModel,
                    format!("models.members: '{id}' is listed more than once, keeping the first"),
                ));
            }
        }

        if seen.len() < 2 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::TooFewMembers,
                format!(
                    "models.members: at least 2 distinct members are required, got {}",
                    seen.len()
                ),
            ));
        }

        if self.lead.trim().is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::EmptyModelId,
                "models.lead: model id cannot be empty",
            ));
        } else if !seen.contains(self.lead.as_str()) {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::LeadNotMember,
                format!(
                    "models.lead: '{}' is not a member; it will only synthesize",
                    self.lead
                ),
            ));
        }

        issues
    }

    /// Number of distinct, non-empty member ids.
    pub fn distinct_members(&self) -> usize {
        self.members
            .iter()
            .filter(|id| !id.trim().is_empty())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Build the validated selection (duplicates dropped, roles assigned).
    pub fn to_selection(&self) -> Result<ModelSelection, DomainError> {
        let members = self
            .members
            .iter()
            .map(|id| self.identity(id, ModelIdentity::member(id.as_str())))
            .collect();
        let lead = self.identity(&self.lead, ModelIdentity::lead(self.lead.as_str()));
        ModelSelection::new(members, lead)
    }

    fn identity(&self, id: &str, base: ModelIdentity) -> ModelIdentity {
        match self.display_names.get(id) {
            Some(name) => base.with_display_name(name.as_str()),
            None => base,
        }
    }
}
