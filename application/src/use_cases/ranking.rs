//! Stage 2: anonymous peer ranking.

use crate::ports::call_telemetry::CallPurpose;
use crate::ports::model_backend::{BackendReply, ModelBackend};
use crate::use_cases::resilient_caller::{CallError, ResilientCaller};
use crate::use_cases::shared::RoundContext;
use council_domain::core::string::preview;
use council_domain::{
    AggregateRanking, AnonymizedEntry, JudgmentWeights, LabelMap, ModelIdentity, PromptTemplate,
    Question, RankingJudgment, aggregate_rankings, parse_judgment,
};
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that end Stage 2
///
/// Unparseable or failed judgments are not errors; they are recorded and
/// left out of aggregation.
#[derive(Error, Debug)]
pub enum RankingError {
    #[error("stage 2 cancelled")]
    Cancelled { judgments: Vec<RankingJudgment> },
}

/// Result of Stage 2
#[derive(Debug, Clone)]
pub struct RankingOutcome {
    /// One judgment per judge, in judge order.
    pub judgments: Vec<RankingJudgment>,
    pub ranking: AggregateRanking,
}

/// Asks every judge to rank the anonymized answers and aggregates the result.
pub struct RankingStage<B: ModelBackend + 'static> {
    caller: ResilientCaller<B>,
    weights: JudgmentWeights,
}

impl<B: ModelBackend + 'static> RankingStage<B> {
    pub fn new(caller: ResilientCaller<B>, weights: JudgmentWeights) -> Self {
        Self { caller, weights }
    }

    /// Run Stage 2.
    ///
    /// `judges` are the members with a successful Stage 1 answer, in
    /// configuration order; they are also the ranking candidates.
    pub async fn run(
        &self,
        question: &Question,
        labels: &LabelMap,
        entries: &[AnonymizedEntry],
        judges: &[ModelIdentity],
        ctx: &RoundContext,
    ) -> Result<RankingOutcome, RankingError> {
        info!(
            round_id = ctx.round_id(),
            judges = judges.len(),
            entries = entries.len(),
            "Stage 2: peer ranking"
        );

        let prompt = PromptTemplate::ranking(question, entries);
        let calls = judges.iter().map(|judge| {
            let prompt = &prompt;
            async move {
                let outcome = self
                    .caller
                    .call(judge, prompt, CallPurpose::Ranking, ctx)
                    .await;
                self.judge(judge, labels, outcome)
            }
        });
        let judgments = join_all(calls).await;

        if ctx.is_cancelled() {
            return Err(RankingError::Cancelled { judgments });
        }

        let ranking = aggregate_rankings(&judgments, labels, judges, &self.weights);
        if !ranking.ranking_available {
            warn!("No valid ranking judgments; falling back to configuration order");
        }
        info!(
            valid_judgments = ranking.valid_judgments,
            total = judgments.len(),
            "Stage 2 resolved"
        );

        Ok(RankingOutcome { judgments, ranking })
    }

    fn judge(
        &self,
        judge: &ModelIdentity,
        labels: &LabelMap,
        outcome: Result<BackendReply, CallError>,
    ) -> RankingJudgment {
        match outcome {
            Ok(reply) => match parse_judgment(&reply.text, labels.labels()) {
                Ok(order) => {
                    debug!(judge = %judge, order = ?order, "Parsed ranking judgment");
                    RankingJudgment::parsed(judge.clone(), order, reply.text, reply.usage)
                }
                Err(e) => {
                    warn!(
                        judge = %judge,
                        error = %e,
                        reply = %preview(&reply.text, 120),
                        "Discarding unparseable ranking judgment"
                    );
                    RankingJudgment::unparsed(judge.clone(), reply.text, reply.usage)
                }
            },
            Err(e) => {
                if !e.is_cancelled() {
                    warn!(judge = %judge, error = %e, "Ranking call failed");
                }
                RankingJudgment::failed(judge.clone(), e.failure_reason())
            }
        }
    }
}
