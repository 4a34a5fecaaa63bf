//! Stream coordinator
//!
//! Drives one round through Stage 1 → Stage 2 → Stage 3 with strict
//! barriers between stages, and multiplexes everything the stages produce
//! onto a single outbound event stream.
//!
//! # Outbound stream
//!
//! | Event | When |
//! |-------|------|
//! | `stage1_result` | each member settles (completion order, with its index) |
//! | `stage2_ranking` | Stage 2 resolves |
//! | `stage3_chunk` | each synthesis fragment |
//! | `keepalive` | nothing else was sent for `keepalive_interval` |
//! | `stage3_done` / `error` / `aborted` | exactly one, last |
//!
//! Closing the receiving side cancels the round: every in-flight call in
//! the active stage stops, and nothing after the cancellation is emitted
//! except the terminal `aborted` event.

use crate::config::DeliberationConfig;
use crate::ports::call_telemetry::CallTelemetry;
use crate::ports::model_backend::ModelBackend;
use crate::ports::round_guard::{NoRoundGuard, RoundGuard};
use crate::ports::round_store::{NoRoundStore, RoundStore};
use crate::use_cases::fan_out::{FanOutError, FanOutStage, QuorumError};
use crate::use_cases::ranking::{RankingError, RankingStage};
use crate::use_cases::resilient_caller::ResilientCaller;
use crate::use_cases::shared::{RoundContext, deadline_after};
use crate::use_cases::synthesis::{SynthesisError, SynthesisStage};
use council_domain::{
    AnonymizingMapper, DeliberationEvent, DeliberationRound, DomainError, ModelIdentity,
    ModelSelection, Question, RoundErrorKind, Stage, SynthesisResult,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

/// Capacity of the outbound event channel.
const OUTBOUND_BUFFER: usize = 64;

/// Capacity of the internal stage → coordinator channel.
const STAGE_BUFFER: usize = 64;

/// Round-level failure, delivered as the terminal `error` event
#[derive(Error, Debug)]
pub enum RoundError {
    #[error(transparent)]
    QuorumNotMet(#[from] QuorumError),

    #[error("{0}")]
    LeadModelFailed(String),

    #[error("round {0} is already in progress")]
    InProgress(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RoundError {
    /// Stable kind reported to consumers.
    pub fn kind(&self) -> RoundErrorKind {
        match self {
            RoundError::QuorumNotMet(_) => RoundErrorKind::QuorumNotMet,
            RoundError::LeadModelFailed(_) => RoundErrorKind::LeadModelFailed,
            RoundError::InProgress(_) => RoundErrorKind::RoundInProgress,
            RoundError::InvalidRequest(_) => RoundErrorKind::InvalidRequest,
            RoundError::Internal(_) => RoundErrorKind::Internal,
        }
    }
}

impl From<DomainError> for RoundError {
    fn from(e: DomainError) -> Self {
        if e.is_invalid_request() {
            RoundError::InvalidRequest(e.to_string())
        } else {
            RoundError::Internal(e.to_string())
        }
    }
}

/// A request to run one round
#[derive(Debug, Clone)]
pub struct RoundRequest {
    /// Caller-owned identifier (e.g. a message id).
    pub round_id: String,
    pub question: String,
    /// Subset of configured members; `None` uses all of them.
    pub models: Option<Vec<String>>,
    /// Lead override; must be a configured member or the configured lead.
    pub lead: Option<String>,
}

impl RoundRequest {
    pub fn new(round_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            round_id: round_id.into(),
            question: question.into(),
            models: None,
            lead: None,
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = Some(models);
        self
    }

    pub fn with_lead(mut self, lead: impl Into<String>) -> Self {
        self.lead = Some(lead.into());
        self
    }
}

/// Handle to a running round
pub struct RoundHandle {
    pub round_id: String,
    /// The outbound event stream. Closing or dropping it cancels the round.
    pub events: mpsc::Receiver<DeliberationEvent>,
    cancel: CancellationToken,
    task: JoinHandle<Result<DeliberationRound, RoundError>>,
}

impl RoundHandle {
    /// Request an explicit abort; the stream ends with `aborted`.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// The round's cancellation scope.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the round to end.
    ///
    /// Drops the event receiver first, so drain `events` before calling
    /// this unless the round should be cancelled. A round that started
    /// returns `Ok` even if it failed or was aborted (see its `state` and
    /// `failure`); `Err` means the request was rejected before Stage 1.
    pub async fn finish(self) -> Result<DeliberationRound, RoundError> {
        drop(self.events);
        self.task
            .await
            .map_err(|e| RoundError::Internal(format!("round task failed: {e}")))?
    }
}

/// How a round ended
enum Ending {
    Done(SynthesisResult),
    Failed(RoundError),
    Aborted(Option<Stage>),
}

/// Runs deliberation rounds
///
/// Cheap to clone; every round shares the same backend, store, guard and
/// telemetry sink.
pub struct StreamCoordinator<B: ModelBackend + 'static> {
    caller: ResilientCaller<B>,
    config: Arc<DeliberationConfig>,
    store: Arc<dyn RoundStore>,
    guard: Arc<dyn RoundGuard>,
}

impl<B: ModelBackend + 'static> Clone for StreamCoordinator<B> {
    fn clone(&self) -> Self {
        Self {
            caller: self.caller.clone(),
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
            guard: Arc::clone(&self.guard),
        }
    }
}

impl<B: ModelBackend + 'static> StreamCoordinator<B> {
    pub fn new(backend: Arc<B>, config: DeliberationConfig) -> Self {
        Self {
            caller: ResilientCaller::new(backend, config.call.clone()),
            config: Arc::new(config),
            store: Arc::new(NoRoundStore),
            guard: Arc::new(NoRoundGuard),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn RoundStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_guard(mut self, guard: Arc<dyn RoundGuard>) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn CallTelemetry>) -> Self {
        self.caller = self.caller.with_telemetry(telemetry);
        self
    }

    pub fn config(&self) -> &DeliberationConfig {
        &self.config
    }

    /// Start a round in the background.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, request: RoundRequest) -> RoundHandle {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        let round_id = request.round_id.clone();
        let span = info_span!("round", round_id = %round_id);

        let this = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { this.execute(request, token, tx).await }.instrument(span));

        RoundHandle {
            round_id,
            events: rx,
            cancel,
            task,
        }
    }

    async fn execute(
        self,
        request: RoundRequest,
        cancel: CancellationToken,
        tx: mpsc::Sender<DeliberationEvent>,
    ) -> Result<DeliberationRound, RoundError> {
        let mut out = Outbound::new(tx, cancel.clone(), self.config.keepalive_interval);

        let (question, selection) = match self.prepare(&request) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(error = %e, "Rejecting round");
                out.finish(error_event(&e)).await;
                return Err(e);
            }
        };

        if !self.guard.try_acquire(&request.round_id).await {
            let e = RoundError::InProgress(request.round_id.clone());
            warn!(error = %e, "Rejecting round");
            out.finish(error_event(&e)).await;
            return Err(e);
        }

        let round = self
            .drive(request.round_id.clone(), question, selection, cancel, &mut out)
            .await;

        self.guard.release(&request.round_id).await;
        Ok(round)
    }

    fn prepare(&self, request: &RoundRequest) -> Result<(Question, ModelSelection), RoundError> {
        if request.round_id.trim().is_empty() {
            return Err(RoundError::InvalidRequest("round id cannot be empty".to_string()));
        }
        let question = Question::parse(request.question.clone())?;
        let selection = self
            .config
            .selection
            .restrict(request.models.as_deref(), request.lead.as_deref())?;
        Ok((question, selection))
    }

    async fn drive(
        &self,
        round_id: String,
        question: Question,
        selection: ModelSelection,
        cancel: CancellationToken,
        out: &mut Outbound,
    ) -> DeliberationRound {
        let (stage_tx, mut stage_rx) = mpsc::channel(STAGE_BUFFER);
        let ctx = RoundContext::new(round_id.clone(), cancel, stage_tx);
        let mut round = DeliberationRound::new(round_id, question);

        info!(
            members = selection.members().len(),
            lead = %selection.lead(),
            "Starting round"
        );

        let ending = match self
            .run_stages(&mut round, &selection, &ctx, out, &mut stage_rx)
            .await
        {
            Ok(ending) => ending,
            Err(e) => Ending::Failed(e.into()),
        };

        if !round.state.is_terminal() {
            let settled = match &ending {
                Ending::Failed(e) => round.fail(e.kind(), e.to_string()),
                _ => round.abort(),
            };
            if let Err(e) = settled {
                warn!(error = %e, "Could not settle round state");
            }
        }
        self.persist(&mut round, out, &mut stage_rx).await;

        let event = match ending {
            Ending::Done(result) => {
                info!(tokens = round.total_usage().total(), "Round complete");
                DeliberationEvent::Stage3Done {
                    result,
                    degraded: round.degraded,
                }
            }
            Ending::Failed(e) => {
                warn!(kind = %e.kind(), error = %e, "Round failed");
                error_event(&e)
            }
            Ending::Aborted(stage) => {
                info!(stage = ?stage, "Round aborted");
                DeliberationEvent::Aborted { stage }
            }
        };
        out.finish(event).await;

        round
    }

    async fn run_stages(
        &self,
        round: &mut DeliberationRound,
        selection: &ModelSelection,
        ctx: &RoundContext,
        out: &mut Outbound,
        stage_rx: &mut mpsc::Receiver<DeliberationEvent>,
    ) -> Result<Ending, DomainError> {
        let question = round.question.clone();

        // Stage 1
        round.advance()?;
        let fan_out = FanOutStage::new(self.caller.clone(), self.config.effective_quorum(selection));
        let results = match out
            .pump(fan_out.run(&question, selection.members(), ctx), stage_rx)
            .await
        {
            Ok(results) => results,
            Err(FanOutError::Cancelled { results }) => {
                round.record_stage_one(results)?;
                return Ok(Ending::Aborted(Some(Stage::Stage1)));
            }
            Err(FanOutError::Quorum(err)) => {
                round.record_stage_one(err.results.clone())?;
                return Ok(Ending::Failed(err.into()));
            }
        };
        round.record_stage_one(results)?;
        self.persist(round, out, stage_rx).await;
        round.advance()?;

        // Stage 2
        if ctx.is_cancelled() {
            return Ok(Ending::Aborted(Some(Stage::Stage2)));
        }
        let judges: Vec<ModelIdentity> = round
            .stage_one
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.model.clone())
            .collect();
        let ranked = {
            // The label map lives only for this block
            let (labels, entries) = AnonymizingMapper::anonymize(&round.stage_one);
            let ranking = RankingStage::new(self.caller.clone(), self.config.judgment_weights(selection));
            out.pump(ranking.run(&question, &labels, &entries, &judges, ctx), stage_rx)
                .await
        };
        let outcome = match ranked {
            Ok(outcome) => outcome,
            Err(RankingError::Cancelled { .. }) => return Ok(Ending::Aborted(Some(Stage::Stage2))),
        };
        round.record_ranking(outcome.judgments.clone(), outcome.ranking.clone())?;
        out.send(DeliberationEvent::Stage2Ranking {
            ranking: outcome.ranking.clone(),
            judgments: outcome.judgments,
        })
        .await;
        self.persist(round, out, stage_rx).await;
        round.advance()?;

        // Stage 3
        if ctx.is_cancelled() {
            return Ok(Ending::Aborted(Some(Stage::Stage3)));
        }
        let synthesis = SynthesisStage::new(self.caller.clone());
        let synthesized = out
            .pump(
                synthesis.run(&question, &round.stage_one, &outcome.ranking, selection.lead(), ctx),
                stage_rx,
            )
            .await;
        match synthesized {
            Ok(result) => {
                round.record_synthesis(result.clone())?;
                round.advance()?;
                Ok(Ending::Done(result))
            }
            Err(SynthesisError::Cancelled { partial }) => {
                round.record_synthesis(*partial)?;
                Ok(Ending::Aborted(Some(Stage::Stage3)))
            }
            Err(err @ SynthesisError::LeadFailed { .. }) => {
                let message = err.to_string();
                if let SynthesisError::LeadFailed { partial, .. } = err {
                    round.record_synthesis(*partial)?;
                }
                Ok(Ending::Failed(RoundError::LeadModelFailed(message)))
            }
        }
    }

    /// Hand the cumulative round to the store; failures only degrade it.
    ///
    /// The write is pumped like a stage so a slow store still gets
    /// keepalives and disconnect detection.
    async fn persist(
        &self,
        round: &mut DeliberationRound,
        out: &mut Outbound,
        stage_rx: &mut mpsc::Receiver<DeliberationEvent>,
    ) {
        let saved = out.pump(self.store.save(round), stage_rx).await;
        if let Err(e) = saved {
            warn!(error = %e, state = round.state.as_str(), "Failed to persist round, continuing degraded");
            round.mark_degraded();
        }
    }
}

fn error_event(e: &RoundError) -> DeliberationEvent {
    DeliberationEvent::Error {
        kind: e.kind(),
        message: e.to_string(),
    }
}

/// Outbound side of a round: keepalives, disconnect detection, and
/// suppression of events after cancellation.
struct Outbound {
    tx: mpsc::Sender<DeliberationEvent>,
    cancel: CancellationToken,
    keepalive: Duration,
    last_emit: Instant,
    disconnected: bool,
}

impl Outbound {
    fn new(tx: mpsc::Sender<DeliberationEvent>, cancel: CancellationToken, keepalive: Duration) -> Self {
        Self {
            tx,
            cancel,
            keepalive,
            last_emit: Instant::now(),
            disconnected: false,
        }
    }

    /// Send a non-terminal event unless the round is cancelled.
    async fn send(&mut self, event: DeliberationEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.deliver(event).await;
    }

    /// Send the terminal event. Delivered even after an explicit abort.
    async fn finish(&mut self, event: DeliberationEvent) {
        self.deliver(event).await;
    }

    async fn deliver(&mut self, event: DeliberationEvent) {
        if self.disconnected {
            return;
        }
        if self.tx.send(event).await.is_ok() {
            self.last_emit = Instant::now();
        } else {
            self.on_disconnect();
        }
    }

    fn on_disconnect(&mut self) {
        if !self.disconnected {
            info!("Consumer disconnected, cancelling round");
            self.disconnected = true;
            self.cancel.cancel();
        }
    }

    /// Drive a stage to completion while forwarding its events, injecting
    /// keepalives, and watching for the consumer going away.
    async fn pump<F: Future>(
        &mut self,
        stage: F,
        stage_rx: &mut mpsc::Receiver<DeliberationEvent>,
    ) -> F::Output {
        tokio::pin!(stage);
        loop {
            let keepalive_at = deadline_after(self.last_emit, self.keepalive);
            let idle = !self.disconnected && !self.cancel.is_cancelled();
            tokio::select! {
                biased;
                output = &mut stage => {
                    while let Ok(event) = stage_rx.try_recv() {
                        self.send(event).await;
                    }
                    return output;
                }
                Some(event) = stage_rx.recv() => self.send(event).await,
                _ = self.tx.closed(), if !self.disconnected => self.on_disconnect(),
                _ = tokio::time::sleep_until(keepalive_at), if idle => {
                    debug!("Sending keepalive");
                    self.send(DeliberationEvent::Keepalive).await;
                }
            }
        }
    }
}
