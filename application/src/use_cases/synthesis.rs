//! Stage 3: the lead model writes the final answer.

use crate::ports::call_telemetry::CallPurpose;
use crate::ports::model_backend::ModelBackend;
use crate::use_cases::resilient_caller::{CallError, ResilientCaller};
use crate::use_cases::shared::RoundContext;
use council_domain::{
    AggregateRanking, DeliberationEvent, ModelIdentity, PromptTemplate, Question, StageOneResult,
    SynthesisResult,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Errors that end Stage 3
#[derive(Error, Debug)]
pub enum SynthesisError {
    /// The lead call failed. `partial` holds any chunks already streamed.
    #[error("lead model {} failed: {source}", .partial.lead)]
    LeadFailed {
        partial: Box<SynthesisResult>,
        source: CallError,
    },

    #[error("stage 3 cancelled")]
    Cancelled { partial: Box<SynthesisResult> },
}

/// Streams the lead model's synthesis of all answers.
pub struct SynthesisStage<B: ModelBackend + 'static> {
    caller: ResilientCaller<B>,
}

impl<B: ModelBackend + 'static> SynthesisStage<B> {
    pub fn new(caller: ResilientCaller<B>) -> Self {
        Self { caller }
    }

    /// Run Stage 3.
    ///
    /// Each chunk is emitted as a `stage3_chunk` event as it arrives. The
    /// terminal `stage3_done` or `error` event is left to the coordinator.
    pub async fn run(
        &self,
        question: &Question,
        results: &[StageOneResult],
        ranking: &AggregateRanking,
        lead: &ModelIdentity,
        ctx: &RoundContext,
    ) -> Result<SynthesisResult, SynthesisError> {
        info!(round_id = ctx.round_id(), lead = %lead, "Stage 3: synthesis");

        let prompt = PromptTemplate::synthesis(question, results, ranking);
        let mut synthesis = SynthesisResult::new(lead.clone());
        let (tx, mut rx) = mpsc::channel::<String>(32);

        let call = async move {
            let outcome = self
                .caller
                .call_streaming(lead, &prompt, CallPurpose::Synthesis, ctx, &tx)
                .await;
            drop(tx);
            outcome
        };
        let forward = async {
            while let Some(chunk) = rx.recv().await {
                ctx.emit(DeliberationEvent::Stage3Chunk {
                    text: chunk.clone(),
                })
                .await;
                synthesis.push_chunk(chunk);
            }
        };
        let (outcome, ()) = tokio::join!(call, forward);

        match outcome {
            Ok(reply) => {
                synthesis.text = reply.text;
                synthesis.usage = reply.usage;
                info!(
                    chunks = synthesis.chunks.len(),
                    chars = synthesis.text.len(),
                    "Stage 3 resolved"
                );
                Ok(synthesis)
            }
            Err(CallError::Cancelled) => {
                synthesis.error = Some(CallError::Cancelled.failure_reason());
                Err(SynthesisError::Cancelled {
                    partial: Box::new(synthesis),
                })
            }
            Err(e) => {
                warn!(lead = %lead, error = %e, chunks = synthesis.chunks.len(), "Lead model failed");
                synthesis.error = Some(e.failure_reason());
                Err(SynthesisError::LeadFailed {
                    partial: Box::new(synthesis),
                    source: e,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CallPolicy;
    use crate::ports::model_backend::{
        BackendChunk, BackendError, BackendReply, ChunkStream, InvokeOptions,
    };
    use async_trait::async_trait;
    use council_domain::{FailureKind, Prompt, RankedModel, TokenUsage};
    use std::sync::Arc;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    // ==================== Test Infrastructure ====================

    /// Lead backend that streams fixed chunks and records the prompt it saw
    struct StreamingLead {
        chunks: Vec<&'static str>,
        end: Option<BackendError>,
        hang_after_chunks: bool,
        prompts: Mutex<Vec<String>>,
    }

    impl StreamingLead {
        fn new(chunks: Vec<&'static str>, end: Option<BackendError>) -> Self {
            Self {
                chunks,
                end,
                hang_after_chunks: false,
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn hanging(chunks: Vec<&'static str>) -> Self {
            Self {
                hang_after_chunks: true,
                ..Self::new(chunks, None)
            }
        }
    }

    #[async_trait]
    impl ModelBackend for StreamingLead {
        async fn invoke(
            &self,
            _model: &ModelIdentity,
            _prompt: &Prompt,
            _options: &InvokeOptions,
        ) -> Result<BackendReply, BackendError> {
            unreachable!("synthesis always streams")
        }

        async fn invoke_streaming(
            &self,
            _model: &ModelIdentity,
            prompt: &Prompt,
            _options: &InvokeOptions,
        ) -> Result<ChunkStream, BackendError> {
            self.prompts.lock().unwrap().push(prompt.user.clone());
            let (tx, rx) = mpsc::channel(16);
            for chunk in &self.chunks {
                tx.send(BackendChunk::Delta(chunk.to_string())).await.unwrap();
            }
            if self.hang_after_chunks {
                // Keep the sender alive so the stream never ends
                tokio::spawn(async move {
                    let _tx = tx;
                    std::future::pending::<()>().await;
                });
            } else {
                let last = match &self.end {
                    Some(e) => BackendChunk::Error(e.clone()),
                    None => BackendChunk::Completed(
                        BackendReply::default().with_usage(TokenUsage::new(500, 80)),
                    ),
                };
                tx.send(last).await.unwrap();
            }
            Ok(ChunkStream::new(rx))
        }
    }

    fn inputs() -> (Question, Vec<StageOneResult>, AggregateRanking) {
        let a = ModelIdentity::member("openai/gpt-5.1");
        let b = ModelIdentity::member("google/gemini-3-pro-preview");
        let results = vec![
            StageOneResult::success(a.clone(), "Use iterators.", 1, TokenUsage::default()),
            StageOneResult::success(b.clone(), "Use for loops.", 1, TokenUsage::default()),
        ];
        let ranking = AggregateRanking {
            entries: vec![
                RankedModel {
                    model: a,
                    score: 4.0,
                    average_rank: Some(1.0),
                    votes: 2,
                },
                RankedModel {
                    model: b,
                    score: 2.0,
                    average_rank: Some(2.0),
                    votes: 2,
                },
            ],
            ranking_available: true,
            valid_judgments: 2,
        };
        (Question::new("How should I loop in Rust?"), results, ranking)
    }

    fn context() -> (RoundContext, mpsc::Receiver<DeliberationEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (RoundContext::new("round-1", CancellationToken::new(), tx), rx)
    }

    fn chunk_events(rx: &mut mpsc::Receiver<DeliberationEvent>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DeliberationEvent::Stage3Chunk { text } = event {
                out.push(text);
            }
        }
        out
    }

    fn lead() -> ModelIdentity {
        ModelIdentity::lead("google/gemini-3-pro-preview")
    }

    // ==================== Tests ====================

    #[tokio::test]
    async fn test_chunks_are_forwarded_in_order() {
        let backend = Arc::new(StreamingLead::new(vec!["Prefer ", "iterators", "."], None));
        let stage = SynthesisStage::new(ResilientCaller::new(backend.clone(), CallPolicy::default()));
        let (question, results, ranking) = inputs();
        let (ctx, mut rx) = context();

        let synthesis = stage
            .run(&question, &results, &ranking, &lead(), &ctx)
            .await
            .unwrap();

        assert_eq!(synthesis.text, "Prefer iterators.");
        assert_eq!(synthesis.chunks, vec!["Prefer ", "iterators", "."]);
        assert_eq!(synthesis.usage, TokenUsage::new(500, 80));
        assert!(synthesis.lead.is_lead());
        assert_eq!(chunk_events(&mut rx), vec!["Prefer ", "iterators", "."]);

        let prompt = &backend.prompts.lock().unwrap()[0];
        assert!(prompt.contains("--- gpt-5.1 (openai/gpt-5.1) ---\nUse iterators."));
        assert!(prompt.contains("1. gpt-5.1"));
    }

    #[tokio::test]
    async fn test_failure_after_chunks_is_explicit() {
        let backend = Arc::new(StreamingLead::new(
            vec!["Prefer "],
            Some(BackendError::network("connection reset")),
        ));
        let stage = SynthesisStage::new(ResilientCaller::new(backend, CallPolicy::default()));
        let (question, results, ranking) = inputs();
        let (ctx, mut rx) = context();

        let err = stage
            .run(&question, &results, &ranking, &lead(), &ctx)
            .await
            .unwrap_err();

        let SynthesisError::LeadFailed { partial, source } = err else {
            panic!("expected lead failure");
        };
        assert!(matches!(source, CallError::StreamInterrupted(_)));
        assert_eq!(partial.text, "Prefer ");
        assert_eq!(partial.error.as_ref().unwrap().kind, FailureKind::Transient);
        assert_eq!(chunk_events(&mut rx), vec!["Prefer "]);
    }

    #[tokio::test]
    async fn test_fatal_lead_error() {
        let backend = Arc::new(StreamingLead::new(
            vec![],
            Some(BackendError::new(
                crate::ports::model_backend::BackendErrorKind::InsufficientCredits,
                "out of credits",
            )),
        ));
        let stage = SynthesisStage::new(ResilientCaller::new(backend, CallPolicy::default()));
        let (question, results, ranking) = inputs();
        let (ctx, _rx) = context();

        let err = stage
            .run(&question, &results, &ranking, &lead(), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SynthesisError::LeadFailed {
                source: CallError::Fatal(_),
                ..
            }
        ));
        assert!(err.to_string().starts_with("lead model google/gemini-3-pro-preview failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_mid_stream() {
        let backend = Arc::new(StreamingLead::hanging(vec!["Prefer "]));
        let stage = SynthesisStage::new(ResilientCaller::new(backend, CallPolicy::default()));
        let (question, results, ranking) = inputs();
        let (ctx, _rx) = context();
        let token = ctx.cancellation_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            token.cancel();
        });

        let err = stage
            .run(&question, &results, &ranking, &lead(), &ctx)
            .await
            .unwrap_err();

        let SynthesisError::Cancelled { partial } = err else {
            panic!("expected cancellation");
        };
        assert_eq!(partial.text, "Prefer ");
    }
}
