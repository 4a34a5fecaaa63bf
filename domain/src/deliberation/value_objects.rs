//! Deliberation value objects

use crate::core::model::ModelIdentity;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Token counts reported by a backend for one reply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: Self) -> Self::Output {
        TokenUsage {
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Broad class of a failed model call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Retries were exhausted on rate limits, server errors, or network errors.
    Transient,
    /// The backend rejected the request (bad request, auth, credits).
    Fatal,
    /// The round was cancelled while the call was in flight.
    Cancelled,
}

/// Why a single model call produced no usable output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureReason {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "cancelled")
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// One member's answer to the question (Stage 1)
///
/// Always produced for every configured member. A failed call yields a
/// result with `error` set and an empty `response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOneResult {
    pub model: ModelIdentity,
    pub response: String,
    pub latency_ms: u64,
    pub error: Option<FailureReason>,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl StageOneResult {
    pub fn success(
        model: ModelIdentity,
        response: impl Into<String>,
        latency_ms: u64,
        usage: TokenUsage,
    ) -> Self {
        Self {
            model,
            response: response.into(),
            latency_ms,
            error: None,
            usage,
        }
    }

    pub fn failure(model: ModelIdentity, reason: FailureReason, latency_ms: u64) -> Self {
        Self {
            model,
            response: String::new(),
            latency_ms,
            error: Some(reason),
            usage: TokenUsage::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// One judge's ranking of the anonymized answers (Stage 2)
///
/// `order` holds opaque labels, best first. It is empty unless `parsed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingJudgment {
    pub judge: ModelIdentity,
    pub order: Vec<String>,
    pub raw_text: String,
    pub parsed: bool,
    pub error: Option<FailureReason>,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl RankingJudgment {
    pub fn parsed(
        judge: ModelIdentity,
        order: Vec<String>,
        raw_text: impl Into<String>,
        usage: TokenUsage,
    ) -> Self {
        Self {
            judge,
            order,
            raw_text: raw_text.into(),
            parsed: true,
            error: None,
            usage,
        }
    }

    /// The judge replied, but no valid permutation could be extracted.
    pub fn unparsed(judge: ModelIdentity, raw_text: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            judge,
            order: Vec::new(),
            raw_text: raw_text.into(),
            parsed: false,
            error: None,
            usage,
        }
    }

    /// The ranking call itself failed.
    pub fn failed(judge: ModelIdentity, reason: FailureReason) -> Self {
        Self {
            judge,
            order: Vec::new(),
            raw_text: String::new(),
            parsed: false,
            error: Some(reason),
            usage: TokenUsage::default(),
        }
    }

    /// Whether this judgment takes part in aggregation.
    pub fn is_valid(&self) -> bool {
        self.parsed && self.error.is_none()
    }
}

/// A model's place in the aggregate ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedModel {
    pub model: ModelIdentity,
    /// Sum of weighted positional points across valid judgments.
    pub score: f64,
    /// Mean 1-based position across valid judgments, if any ranked it.
    pub average_rank: Option<f64>,
    /// Number of valid judgments that ranked this model.
    pub votes: usize,
}

/// Consensus order of Stage 1 responses (Stage 2 output)
///
/// Contains every model with a successful Stage 1 result exactly once.
/// When `ranking_available` is false the order is configuration order and
/// all scores are zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateRanking {
    pub entries: Vec<RankedModel>,
    pub ranking_available: bool,
    pub valid_judgments: usize,
}

impl AggregateRanking {
    /// Models in aggregate order, best first.
    pub fn order(&self) -> impl Iterator<Item = &ModelIdentity> {
        self.entries.iter().map(|e| &e.model)
    }

    /// 1-based aggregate position of a model.
    pub fn position_of(&self, model: &ModelIdentity) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| &e.model == model)
            .map(|i| i + 1)
    }
}

/// The lead model's final answer (Stage 3)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub lead: ModelIdentity,
    /// Chunks in arrival order; their concatenation is `text` on success.
    #[serde(skip_serializing, default)]
    pub chunks: Vec<String>,
    pub text: String,
    pub error: Option<FailureReason>,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl SynthesisResult {
    pub fn new(lead: ModelIdentity) -> Self {
        Self {
            lead,
            chunks: Vec::new(),
            text: String::new(),
            error: None,
            usage: TokenUsage::default(),
        }
    }

    pub fn push_chunk(&mut self, chunk: impl Into<String>) {
        let chunk = chunk.into();
        self.text.push_str(&chunk);
        self.chunks.push(chunk);
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_sum() {
        let mut total = TokenUsage::new(10, 5);
        total += TokenUsage::new(3, 2);
        assert_eq!(total, TokenUsage::new(13, 7));
        assert_eq!(total.total(), 20);
    }

    #[test]
    fn test_stage_one_failure_has_empty_response() {
        let result = StageOneResult::failure(
            ModelIdentity::member("a/x"),
            FailureReason::new(FailureKind::Fatal, "401 unauthorized"),
            12,
        );
        assert!(!result.is_success());
        assert!(result.response.is_empty());
    }

    #[test]
    fn test_judgment_validity() {
        let judge = ModelIdentity::member("a/x");
        let ok = RankingJudgment::parsed(judge.clone(), vec!["Response A".into()], "..", TokenUsage::default());
        assert!(ok.is_valid());
        assert!(!RankingJudgment::unparsed(judge.clone(), "meh", TokenUsage::default()).is_valid());
        assert!(!RankingJudgment::failed(judge, FailureReason::cancelled()).is_valid());
    }

    #[test]
    fn test_synthesis_chunks_accumulate() {
        let mut result = SynthesisResult::new(ModelIdentity::lead("a/x"));
        result.push_chunk("Hello, ");
        result.push_chunk("world");
        assert_eq!(result.text, "Hello, world");
        assert_eq!(result.chunks.len(), 2);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("chunks").is_none());
        assert_eq!(json["text"], "Hello, world");
    }

    #[test]
    fn test_aggregate_position() {
        let a = ModelIdentity::member("a");
        let b = ModelIdentity::member("b");
        let ranking = AggregateRanking {
            entries: vec![
                RankedModel { model: b.clone(), score: 4.0, average_rank: Some(1.0), votes: 2 },
                RankedModel { model: a.clone(), score: 2.0, average_rank: Some(2.0), votes: 2 },
            ],
            ranking_available: true,
            valid_judgments: 2,
        };
        assert_eq!(ranking.position_of(&b), Some(1));
        assert_eq!(ranking.position_of(&a), Some(2));
        assert_eq!(ranking.position_of(&ModelIdentity::member("c")), None);
    }
}
