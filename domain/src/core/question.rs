//! Question value object

use super::error::DomainError;
use serde::{Deserialize, Serialize};

/// The user's question (Value Object)
///
/// Sent verbatim to every member in Stage 1 and quoted again in the
/// ranking and synthesis prompts. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Question(String);

impl Question {
    /// Build a question from known-good input.
    ///
    /// # Panics
    /// Panics on blank input; use [`Question::parse`] for untrusted text.
    pub fn new(content: impl Into<String>) -> Self {
        match Self::parse(content) {
            Ok(question) => question,
            Err(e) => panic!("{e}"),
        }
    }

    /// Validate untrusted input.
    pub fn parse(content: impl Into<String>) -> Result<Self, DomainError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::InvalidQuestion(
                "question cannot be empty".to_string(),
            ));
        }
        Ok(Self(content))
    }

    pub fn content(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
