//! Model identity value object

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Role a model plays in a deliberation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    /// Answers the question and judges peers (Stage 1 and Stage 2).
    Member,
    /// Performs the Stage 3 synthesis.
    Lead,
}

/// A configured backend model (Value Object)
///
/// Identity is the backend identifier alone: the lead and a member with the
/// same `id` compare equal, so the lead can also take part as a peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelIdentity {
    id: String,
    display_name: String,
    role: ModelRole,
}

impl ModelIdentity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, role: ModelRole) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            role,
        }
    }

    /// A member model whose display name is derived from its id.
    ///
    /// `openai/gpt-5.1` is displayed as `gpt-5.1`.
    pub fn member(id: impl Into<String>) -> Self {
        let id = id.into();
        let display_name = default_display_name(&id);
        Self::new(id, display_name, ModelRole::Member)
    }

    /// A lead model whose display name is derived from its id.
    pub fn lead(id: impl Into<String>) -> Self {
        let id = id.into();
        let display_name = default_display_name(&id);
        Self::new(id, display_name, ModelRole::Lead)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn role(&self) -> ModelRole {
        self.role
    }

    pub fn is_lead(&self) -> bool {
        self.role == ModelRole::Lead
    }

    /// Same identity with a different role.
    pub fn with_role(mut self, role: ModelRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }
}

fn default_display_name(id: &str) -> String {
    id.rsplit('/').next().unwrap_or(id).to_string()
}

impl PartialEq for ModelIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModelIdentity {}

impl Hash for ModelIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
