//! Round state machine

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Stage of a deliberation round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Every member answers the question
    Stage1,
    /// Members rank each other's anonymized answers
    Stage2,
    /// The lead model synthesizes the final answer
    Stage3,
}

impl Stage {
    pub fn as_str(&self) -> &str {
        match self {
            Stage::Stage1 => "stage1",
            Stage::Stage2 => "stage2",
            Stage::Stage3 => "stage3",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Stage::Stage1 => "Collect Responses",
            Stage::Stage2 => "Peer Ranking",
            Stage::Stage3 => "Synthesis",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Lifecycle of a round
///
/// ```text
/// Idle → Stage1 → Stage2 → Stage3 → Done
///   └───────┴────────┴────────┴──→ Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    Idle,
    Stage1,
    Stage2,
    Stage3,
    Done,
    Aborted,
}

impl RoundState {
    /// The following state on successful resolution of the current one.
    pub fn next(self) -> Result<RoundState, DomainError> {
        match self {
            RoundState::Idle => Ok(RoundState::Stage1),
            RoundState::Stage1 => Ok(RoundState::Stage2),
            RoundState::Stage2 => Ok(RoundState::Stage3),
            RoundState::Stage3 => Ok(RoundState::Done),
            RoundState::Done | RoundState::Aborted => Err(DomainError::InvalidTransition {
                from: self.as_str().to_string(),
                action: "advance",
            }),
        }
    }

    /// Abort from any non-terminal state.
    pub fn abort(self) -> Result<RoundState, DomainError> {
        if self.is_terminal() {
            return Err(DomainError::InvalidTransition {
                from: self.as_str().to_string(),
                action: "abort",
            });
        }
        Ok(RoundState::Aborted)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RoundState::Done | RoundState::Aborted)
    }

    /// The stage being worked on, if any.
    pub fn active_stage(&self) -> Option<Stage> {
        match self {
            RoundState::Stage1 => Some(Stage::Stage1),
            RoundState::Stage2 => Some(Stage::Stage2),
            RoundState::Stage3 => Some(Stage::Stage3),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RoundState::Idle => "idle",
            RoundState::Stage1 => "stage1",
            RoundState::Stage2 => "stage2",
            RoundState::Stage3 => "stage3",
            RoundState::Done => "done",
            RoundState::Aborted => "aborted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_sequence() {
        let mut state = RoundState::Idle;
        let mut seen = vec![state];
        while !state.is_terminal() {
            state = state.next().unwrap();
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                RoundState::Idle,
                RoundState::Stage1,
                RoundState::Stage2,
                RoundState::Stage3,
                RoundState::Done
            ]
        );
    }

    #[test]
    fn test_abort_from_any_non_terminal() {
        for state in [RoundState::Idle, RoundState::Stage1, RoundState::Stage2, RoundState::Stage3] {
            assert_eq!(state.abort().unwrap(), RoundState::Aborted);
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for state in [RoundState::Done, RoundState::Aborted] {
            assert!(state.next().is_err());
            assert!(state.abort().is_err());
        }
    }

    #[test]
    fn test_active_stage() {
        assert_eq!(RoundState::Stage2.active_stage(), Some(Stage::Stage2));
        assert_eq!(RoundState::Idle.active_stage(), None);
        assert_eq!(RoundState::Done.active_stage(), None);
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Stage::Stage1).unwrap(), "\"stage1\"");
        assert_eq!(Stage::Stage3.as_str(), "stage3");
    }
}
