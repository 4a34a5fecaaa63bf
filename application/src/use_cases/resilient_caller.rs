//! Resilient caller
//!
//! Issues a single logical request to one model: per-attempt timeout,
//! exponential backoff with jitter for transient failures, immediate return
//! for fatal ones, and prompt abort when the round is cancelled.

use crate::config::CallPolicy;
use crate::ports::call_telemetry::{CallPurpose, CallRecord, CallTelemetry, NoCallTelemetry};
use crate::ports::model_backend::{
    BackendChunk, BackendError, BackendReply, InvokeOptions, ModelBackend,
};
use crate::use_cases::shared::{RoundContext, deadline_after};
use council_domain::{FailureKind, FailureReason, ModelIdentity, Prompt};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Failure of a call after the retry policy has run its course
#[derive(Error, Debug, Clone)]
pub enum CallError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("gave up after {attempts} attempts: {last}")]
    Transient { attempts: u32, last: BackendError },

    #[error("{0}")]
    Fatal(BackendError),

    #[error("stream interrupted after partial output: {0}")]
    StreamInterrupted(BackendError),

    #[error("call cancelled")]
    Cancelled,
}

impl CallError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CallError::Cancelled)
    }

    /// Stable code used in telemetry.
    pub fn outcome_code(&self) -> &'static str {
        match self {
            CallError::EmptyPrompt => "empty_prompt",
            CallError::Transient { last, .. } => last.kind.code(),
            CallError::Fatal(e) => e.kind.code(),
            CallError::StreamInterrupted(_) => "stream_interrupted",
            CallError::Cancelled => "cancelled",
        }
    }

    /// The failure as recorded on a stage result.
    pub fn failure_reason(&self) -> FailureReason {
        let kind = match self {
            CallError::Transient { .. } => FailureKind::Transient,
            CallError::StreamInterrupted(e) if e.is_transient() => FailureKind::Transient,
            CallError::Cancelled => FailureKind::Cancelled,
            _ => FailureKind::Fatal,
        };
        FailureReason::new(kind, self.to_string())
    }
}

/// Outcome of one attempt
enum AttemptError {
    /// Nothing was delivered; the retry policy decides.
    Failed(BackendError),
    /// Chunks were already forwarded, so the attempt cannot be replayed.
    Interrupted(BackendError),
    Cancelled,
}

/// Calls a backend under a [`CallPolicy`].
///
/// Cheap to clone; clones share the backend (and its connection pool) and
/// the telemetry sink.
pub struct ResilientCaller<B: ModelBackend + 'static> {
    backend: Arc<B>,
    policy: CallPolicy,
    telemetry: Arc<dyn CallTelemetry>,
}

impl<B: ModelBackend + 'static> Clone for ResilientCaller<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            policy: self.policy.clone(),
            telemetry: Arc::clone(&self.telemetry),
        }
    }
}

impl<B: ModelBackend + 'static> ResilientCaller<B> {
    pub fn new(backend: Arc<B>, policy: CallPolicy) -> Self {
        Self {
            backend,
            policy,
            telemetry: Arc::new(NoCallTelemetry),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn CallTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn policy(&self) -> &CallPolicy {
        &self.policy
    }

    /// Call `model` and wait for the complete reply.
    pub async fn call(
        &self,
        model: &ModelIdentity,
        prompt: &Prompt,
        purpose: CallPurpose,
        ctx: &RoundContext,
    ) -> Result<BackendReply, CallError> {
        let options = self.options();
        let options = &options;
        self.run(model, prompt, purpose, ctx, || {
            self.invoke_once(model, prompt, options, ctx)
        })
        .await
    }

    /// Call `model` in streaming mode, forwarding each text fragment to `chunks`.
    ///
    /// A failure before any fragment was forwarded is retried like
    /// [`call`](Self::call). A failure after that ends the call with
    /// [`CallError::StreamInterrupted`].
    pub async fn call_streaming(
        &self,
        model: &ModelIdentity,
        prompt: &Prompt,
        purpose: CallPurpose,
        ctx: &RoundContext,
        chunks: &mpsc::Sender<String>,
    ) -> Result<BackendReply, CallError> {
        let options = self.options();
        let options = &options;
        self.run(model, prompt, purpose, ctx, || {
            self.stream_once(model, prompt, options, ctx, chunks)
        })
        .await
    }

    fn options(&self) -> InvokeOptions {
        InvokeOptions {
            timeout: self.policy.per_call_timeout,
        }
    }

    async fn run<F, Fut>(
        &self,
        model: &ModelIdentity,
        prompt: &Prompt,
        purpose: CallPurpose,
        ctx: &RoundContext,
        attempt: F,
    ) -> Result<BackendReply, CallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<BackendReply, AttemptError>>,
    {
        let started = Instant::now();
        let (result, attempts) = if prompt.is_empty() {
            (Err(CallError::EmptyPrompt), 0)
        } else {
            self.with_retries(model, purpose, ctx, attempt).await
        };
        let latency = started.elapsed();

        match &result {
            Ok(reply) => debug!(
                model = %model,
                purpose = purpose.as_str(),
                attempts,
                latency_ms = latency.as_millis() as u64,
                tokens = reply.usage.total(),
                "Call succeeded"
            ),
            Err(CallError::Cancelled) => debug!(model = %model, purpose = purpose.as_str(), "Call cancelled"),
            Err(e) => warn!(model = %model, purpose = purpose.as_str(), attempts, error = %e, "Call failed"),
        }

        self.telemetry.record(&CallRecord {
            round_id: ctx.round_id().to_string(),
            model: model.id().to_string(),
            purpose,
            attempts,
            outcome: match &result {
                Ok(_) => "ok",
                Err(e) => e.outcome_code(),
            },
            latency_ms: latency.as_millis() as u64,
            usage: result.as_ref().map(|r| r.usage).unwrap_or_default(),
        });

        result
    }

    async fn with_retries<F, Fut>(
        &self,
        model: &ModelIdentity,
        purpose: CallPurpose,
        ctx: &RoundContext,
        mut attempt: F,
    ) -> (Result<BackendReply, CallError>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<BackendReply, AttemptError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = 0;

        let result = loop {
            attempts += 1;
            let err = match attempt().await {
                Ok(reply) => break Ok(reply),
                Err(AttemptError::Cancelled) => break Err(CallError::Cancelled),
                Err(AttemptError::Interrupted(e)) => break Err(CallError::StreamInterrupted(e)),
                Err(AttemptError::Failed(e)) => e,
            };

            if !err.is_transient() {
                break Err(CallError::Fatal(err));
            }
            if attempts >= max_attempts {
                break Err(CallError::Transient { attempts, last: err });
            }
            let delay = self.retry_delay(attempts - 1, &err);

            warn!(
                model = %model,
                purpose = purpose.as_str(),
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient backend error, retrying"
            );

            tokio::select! {
                biased;
                _ = ctx.cancelled() => break Err(CallError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        };

        (result, attempts)
    }

    /// Server-provided delay (capped at the ceiling), else jittered backoff.
    fn retry_delay(&self, retry: u32, err: &BackendError) -> Duration {
        match err.retry_after {
            Some(server) => self.policy.server_delay(server),
            None => {
                let unit = rand::thread_rng().gen_range(0.0..1.0);
                self.policy.jittered_delay(retry, unit)
            }
        }
    }

    async fn invoke_once(
        &self,
        model: &ModelIdentity,
        prompt: &Prompt,
        options: &InvokeOptions,
        ctx: &RoundContext,
    ) -> Result<BackendReply, AttemptError> {
        let call = tokio::time::timeout(options.timeout, self.backend.invoke(model, prompt, options));
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(AttemptError::Cancelled),
            result = call => match result {
                Ok(Ok(reply)) => Ok(reply),
                Ok(Err(e)) => Err(AttemptError::Failed(e)),
                Err(_) => Err(AttemptError::Failed(BackendError::timeout(options.timeout))),
            },
        }
    }

    async fn stream_once(
        &self,
        model: &ModelIdentity,
        prompt: &Prompt,
        options: &InvokeOptions,
        ctx: &RoundContext,
        chunks: &mpsc::Sender<String>,
    ) -> Result<BackendReply, AttemptError> {
        let deadline = deadline_after(Instant::now(), options.timeout);
        let open = tokio::time::timeout_at(
            deadline,
            self.backend.invoke_streaming(model, prompt, options),
        );

        let mut stream = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(AttemptError::Cancelled),
            result = open => match result {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => return Err(AttemptError::Failed(e)),
                Err(_) => return Err(AttemptError::Failed(BackendError::timeout(options.timeout))),
            },
        };

        let mut text = String::new();
        let fail = |e: BackendError, text: &str| {
            if text.is_empty() {
                AttemptError::Failed(e)
            } else {
                AttemptError::Interrupted(e)
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(AttemptError::Cancelled),
                next = tokio::time::timeout_at(deadline, stream.receiver.recv()) => next,
            };

            match next {
                Err(_) => return Err(fail(BackendError::timeout(options.timeout), &text)),
                Ok(None) => {
                    let e = BackendError::network("stream ended without completion");
                    return Err(fail(e, &text));
                }
                Ok(Some(BackendChunk::Delta(delta))) => {
                    if delta.is_empty() {
                        continue;
                    }
                    text.push_str(&delta);
                    let _ = chunks.send(delta).await;
                }
                Ok(Some(BackendChunk::Completed(mut reply))) => {
                    if text.is_empty() {
                        // Non-streaming backend: deliver the whole reply as one chunk
                        if !reply.text.is_empty() {
                            let _ = chunks.send(reply.text.clone()).await;
                        }
                    } else {
                        reply.text = text;
                    }
                    return Ok(reply);
                }
                Ok(Some(BackendChunk::Error(e))) => return Err(fail(e, &text)),
            }
        }
    }
}
