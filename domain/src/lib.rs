//! Domain layer for council
//!
//! This crate contains the core deliberation types and algorithms.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Council round
//!
//! A question is answered by several member models (Stage 1), the answers
//! are ranked by the members under anonymous labels (Stage 2), and a lead
//! model writes the final answer from all of them (Stage 3).
//!
//! ## Anonymization
//!
//! Judges see `Response A`, `Response B`, ... with a fresh random label
//! assignment per round. Only the aggregation step reverses the labels.

pub mod config;
pub mod core;
pub mod deliberation;
pub mod event;
pub mod prompt;
pub mod ranking;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigIssueCode, Severity};
pub use core::{
    error::DomainError,
    model::{ModelIdentity, ModelRole},
    question::Question,
    selection::ModelSelection,
};
pub use deliberation::{
    AggregateRanking, AnonymizedEntry, AnonymizingMapper, DeliberationRound, FailureKind,
    FailureReason, LabelMap, RankedModel, RankingJudgment, RoundErrorKind, RoundFailure,
    RoundState, Stage, StageOneResult, SynthesisResult, TokenUsage,
};
pub use event::DeliberationEvent;
pub use prompt::{Prompt, PromptTemplate};
pub use ranking::{JudgmentWeights, ParseError, aggregate_rankings, parse_judgment};
