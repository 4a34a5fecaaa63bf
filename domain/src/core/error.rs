//! Domain error types

use thiserror::Error;

/// Domain-level errors
///
/// The first two reject a request before a round starts; the last one is
/// a programming error in the stage sequence.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    #[error("Invalid model selection: {0}")]
    InvalidModelSelection(String),

    #[error("Invalid round transition from {from} ({action})")]
    InvalidTransition { from: String, action: &'static str },
}

impl DomainError {
    /// Whether the error comes from caller input rather than pipeline logic
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidQuestion(_) | DomainError::InvalidModelSelection(_)
        )
    }
}
