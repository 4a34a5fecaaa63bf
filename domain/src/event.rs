//! Outbound deliberation events.
//!
//! [`DeliberationEvent`] is the single ordered stream a consumer sees for
//! one round. It serializes as JSON with a `type` tag. The label map never
//! appears in any event.

use crate::deliberation::entities::Stage;
use crate::deliberation::round::RoundErrorKind;
use crate::deliberation::value_objects::{
    AggregateRanking, RankingJudgment, StageOneResult, SynthesisResult,
};
use serde::{Deserialize, Serialize};

/// An event on the outbound stream of a round.
///
/// Every round ends with exactly one terminal event: `Stage3Done`,
/// `Error`, or `Aborted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliberationEvent {
    /// One member's Stage 1 outcome; `index` is its configuration position.
    #[serde(rename = "stage1_result")]
    Stage1Result { index: usize, result: StageOneResult },

    /// Aggregate ranking plus every judgment (labels only, never identities).
    #[serde(rename = "stage2_ranking")]
    Stage2Ranking {
        ranking: AggregateRanking,
        judgments: Vec<RankingJudgment>,
    },

    /// A text fragment from the lead model.
    #[serde(rename = "stage3_chunk")]
    Stage3Chunk { text: String },

    /// Synthesis finished. `degraded` is set if a persistence write failed.
    #[serde(rename = "stage3_done")]
    Stage3Done {
        result: SynthesisResult,
        degraded: bool,
    },

    /// Emitted when nothing else was sent for a keepalive interval.
    Keepalive,

    /// Round-level failure.
    Error { kind: RoundErrorKind, message: String },

    /// The round was cancelled; `stage` is where it stopped.
    Aborted { stage: Option<Stage> },
}

impl DeliberationEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliberationEvent::Stage3Done { .. }
                | DeliberationEvent::Error { .. }
                | DeliberationEvent::Aborted { .. }
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            DeliberationEvent::Stage1Result { .. } => "stage1_result",
            DeliberationEvent::Stage2Ranking { .. } => "stage2_ranking",
            DeliberationEvent::Stage3Chunk { .. } => "stage3_chunk",
            DeliberationEvent::Stage3Done { .. } => "stage3_done",
            DeliberationEvent::Keepalive => "keepalive",
            DeliberationEvent::Error { .. } => "error",
            DeliberationEvent::Aborted { .. } => "aborted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ModelIdentity;
    use crate::deliberation::value_objects::TokenUsage;

    #[test]
    fn test_stage1_result_wire_format() {
        let event = DeliberationEvent::Stage1Result {
            index: 2,
            result: StageOneResult::success(ModelIdentity::member("x-ai/grok-4"), "hi", 40, TokenUsage::new(3, 1)),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stage1_result");
        assert_eq!(json["index"], 2);
        assert_eq!(json["result"]["model"]["id"], "x-ai/grok-4");
        assert_eq!(json["result"]["usage"]["prompt_tokens"], 3);
    }

    #[test]
    fn test_unit_and_error_wire_format() {
        let keepalive = serde_json::to_string(&DeliberationEvent::Keepalive).unwrap();
        assert_eq!(keepalive, r#"{"type":"keepalive"}"#);

        let error = DeliberationEvent::Error {
            kind: RoundErrorKind::QuorumNotMet,
            message: "1 of 3".to_string(),
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "quorum_not_met");

        let aborted = serde_json::to_string(&DeliberationEvent::Aborted {
            stage: Some(Stage::Stage1),
        })
        .unwrap();
        assert_eq!(aborted, r#"{"type":"aborted","stage":"stage1"}"#);
    }

    #[test]
    fn test_terminal_events() {
        assert!(DeliberationEvent::Aborted { stage: None }.is_terminal());
        assert!(!DeliberationEvent::Keepalive.is_terminal());
        assert!(
            !DeliberationEvent::Stage3Chunk {
                text: "x".to_string()
            }
            .is_terminal()
        );
    }

    #[test]
    fn test_type_name_matches_tag() {
        let event = DeliberationEvent::Stage3Chunk {
            text: "partial".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.type_name());
    }
}
