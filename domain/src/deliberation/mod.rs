//! Deliberation domain - one council round and its stage results.
//!
//! A round moves through three strictly sequential stages:
//!
//! 1. **Stage 1** - every member answers the question ([`StageOneResult`])
//! 2. **Stage 2** - members rank each other's anonymized answers
//!    ([`RankingJudgment`], [`AggregateRanking`])
//! 3. **Stage 3** - the lead model synthesizes a final answer ([`SynthesisResult`])
//!
//! [`DeliberationRound`] aggregates the results and enforces the
//! [`RoundState`] machine.

pub mod anonymize;
pub mod entities;
pub mod round;
pub mod value_objects;

pub use anonymize::{AnonymizedEntry, AnonymizingMapper, LabelMap};
pub use entities::{RoundState, Stage};
pub use round::{DeliberationRound, RoundErrorKind, RoundFailure};
pub use value_objects::{
    AggregateRanking, FailureKind, FailureReason, RankedModel, RankingJudgment, StageOneResult,
    SynthesisResult, TokenUsage,
};
