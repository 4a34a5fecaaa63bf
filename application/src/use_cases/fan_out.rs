//! Stage 1: fan out the question to every member.

use crate::ports::call_telemetry::CallPurpose;
use crate::ports::model_backend::ModelBackend;
use crate::use_cases::resilient_caller::ResilientCaller;
use crate::use_cases::shared::RoundContext;
use council_domain::{
    DeliberationEvent, FailureKind, FailureReason, ModelIdentity, PromptTemplate, Question,
    StageOneResult,
};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, warn};

/// Too few members answered in Stage 1
///
/// Carries every result, so the caller can report each failed model and
/// its reason.
#[derive(Debug, Clone)]
pub struct QuorumError {
    pub required: usize,
    pub results: Vec<StageOneResult>,
}

impl QuorumError {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Failed models with their reasons, in configuration order.
    pub fn failures(&self) -> impl Iterator<Item = (&ModelIdentity, &FailureReason)> {
        self.results
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| (&r.model, e)))
    }
}

impl std::fmt::Display for QuorumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "quorum not met: {} of {} members answered, {} required",
            self.succeeded(),
            self.results.len(),
            self.required
        )?;
        for (model, reason) in self.failures() {
            write!(f, "; {model}: {reason}")?;
        }
        Ok(())
    }
}

impl std::error::Error for QuorumError {}

/// Errors that end Stage 1
#[derive(Error, Debug)]
pub enum FanOutError {
    #[error(transparent)]
    Quorum(#[from] QuorumError),

    /// The round was cancelled; `results` holds whatever had settled.
    #[error("stage 1 cancelled")]
    Cancelled { results: Vec<StageOneResult> },
}

/// Queries every member in parallel and collects one result per member.
pub struct FanOutStage<B: ModelBackend + 'static> {
    caller: ResilientCaller<B>,
    quorum: usize,
}

impl<B: ModelBackend + 'static> FanOutStage<B> {
    pub fn new(caller: ResilientCaller<B>, quorum: usize) -> Self {
        Self { caller, quorum }
    }

    /// Run Stage 1.
    ///
    /// Emits a `stage1_result` event as each member settles. The returned
    /// results are in `models` order regardless of completion order.
    pub async fn run(
        &self,
        question: &Question,
        models: &[ModelIdentity],
        ctx: &RoundContext,
    ) -> Result<Vec<StageOneResult>, FanOutError> {
        info!(
            round_id = ctx.round_id(),
            members = models.len(),
            quorum = self.quorum,
            "Stage 1: collecting responses"
        );

        let prompt = PromptTemplate::answer(question);
        let mut join_set = JoinSet::new();

        for (index, model) in models.iter().enumerate() {
            let caller = self.caller.clone();
            let model = model.clone();
            let prompt = prompt.clone();
            let ctx = ctx.clone();

            join_set.spawn(async move {
                let started = Instant::now();
                let outcome = caller.call(&model, &prompt, CallPurpose::Answer, &ctx).await;
                let latency_ms = started.elapsed().as_millis() as u64;
                let result = match outcome {
                    Ok(reply) => StageOneResult::success(model, reply.text, latency_ms, reply.usage),
                    Err(e) => StageOneResult::failure(model, e.failure_reason(), latency_ms),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<StageOneResult>> = models.iter().map(|_| None).collect();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    match &result.error {
                        None => info!(model = %result.model, latency_ms = result.latency_ms, "Member responded"),
                        Some(e) => warn!(model = %result.model, error = %e, "Member failed"),
                    }
                    ctx.emit(DeliberationEvent::Stage1Result {
                        index,
                        result: result.clone(),
                    })
                    .await;
                    slots[index] = Some(result);
                }
                Err(e) => {
                    warn!("Task join error: {}", e);
                }
            }
        }

        let results: Vec<StageOneResult> = slots
            .into_iter()
            .zip(models)
            .map(|(slot, model)| {
                slot.unwrap_or_else(|| {
                    StageOneResult::failure(
                        model.clone(),
                        FailureReason::new(FailureKind::Fatal, "task did not complete"),
                        0,
                    )
                })
            })
            .collect();

        if ctx.is_cancelled() {
            return Err(FanOutError::Cancelled { results });
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        if succeeded < self.quorum {
            return Err(QuorumError {
                required: self.quorum,
                results,
            }
            .into());
        }

        info!(succeeded, total = results.len(), "Stage 1 resolved");
        Ok(results)
    }
}
