//! DeliberationRound aggregate

use super::entities::RoundState;
use super::value_objects::{
    AggregateRanking, RankingJudgment, StageOneResult, SynthesisResult, TokenUsage,
};
use crate::core::error::DomainError;
use crate::core::question::Question;
use serde::{Deserialize, Serialize};

/// Stable classification of a round-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundErrorKind {
    /// Too few members answered in Stage 1.
    QuorumNotMet,
    /// The lead model failed during synthesis.
    LeadModelFailed,
    /// Another run for the same round id is in flight.
    RoundInProgress,
    /// The request itself was invalid (question or model selection).
    InvalidRequest,
    /// Anything else.
    Internal,
}

impl RoundErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            RoundErrorKind::QuorumNotMet => "quorum_not_met",
            RoundErrorKind::LeadModelFailed => "lead_model_failed",
            RoundErrorKind::RoundInProgress => "round_in_progress",
            RoundErrorKind::InvalidRequest => "invalid_request",
            RoundErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for RoundErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a round ended in [`RoundState::Aborted`] without an explicit abort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundFailure {
    pub kind: RoundErrorKind,
    pub message: String,
}

/// One complete execution of the three-stage pipeline (Aggregate Root)
///
/// Stage outputs may only be recorded while the round is in the matching
/// state, and nothing may be recorded once the round is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliberationRound {
    pub round_id: String,
    pub question: Question,
    pub state: RoundState,
    pub stage_one: Vec<StageOneResult>,
    pub judgments: Vec<RankingJudgment>,
    pub ranking: Option<AggregateRanking>,
    pub synthesis: Option<SynthesisResult>,
    pub failure: Option<RoundFailure>,
    /// Set when a persistence write failed; the stream was still delivered.
    pub degraded: bool,
}

impl DeliberationRound {
    pub fn new(round_id: impl Into<String>, question: Question) -> Self {
        Self {
            round_id: round_id.into(),
            question,
            state: RoundState::Idle,
            stage_one: Vec::new(),
            judgments: Vec::new(),
            ranking: None,
            synthesis: None,
            failure: None,
            degraded: false,
        }
    }

    /// Move to the next state.
    pub fn advance(&mut self) -> Result<RoundState, DomainError> {
        self.state = self.state.next()?;
        Ok(self.state)
    }

    /// Explicit abort (consumer disconnect or abort request).
    pub fn abort(&mut self) -> Result<(), DomainError> {
        self.state = self.state.abort()?;
        Ok(())
    }

    /// Abort with a recorded round-level failure.
    pub fn fail(&mut self, kind: RoundErrorKind, message: impl Into<String>) -> Result<(), DomainError> {
        self.state = self.state.abort()?;
        self.failure = Some(RoundFailure {
            kind,
            message: message.into(),
        });
        Ok(())
    }

    pub fn record_stage_one(&mut self, results: Vec<StageOneResult>) -> Result<(), DomainError> {
        self.expect_state(RoundState::Stage1, "record stage one")?;
        self.stage_one = results;
        Ok(())
    }

    pub fn record_ranking(
        &mut self,
        judgments: Vec<RankingJudgment>,
        ranking: AggregateRanking,
    ) -> Result<(), DomainError> {
        self.expect_state(RoundState::Stage2, "record ranking")?;
        self.judgments = judgments;
        self.ranking = Some(ranking);
        Ok(())
    }

    pub fn record_synthesis(&mut self, synthesis: SynthesisResult) -> Result<(), DomainError> {
        self.expect_state(RoundState::Stage3, "record synthesis")?;
        self.synthesis = Some(synthesis);
        Ok(())
    }

    pub fn mark_degraded(&mut self) {
        self.degraded = true;
    }

    pub fn is_complete(&self) -> bool {
        self.state == RoundState::Done
    }

    /// Token usage summed over every stage.
    pub fn total_usage(&self) -> TokenUsage {
        let stage_one = self.stage_one.iter().map(|r| r.usage);
        let judgments = self.judgments.iter().map(|j| j.usage);
        let synthesis = self.synthesis.iter().map(|s| s.usage);
        stage_one
            .chain(judgments)
            .chain(synthesis)
            .fold(TokenUsage::default(), |acc, u| acc + u)
    }

    fn expect_state(&self, expected: RoundState, action: &'static str) -> Result<(), DomainError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                from: self.state.as_str().to_string(),
                action,
            })
        }
    }
}
