//! OpenRouter [`ModelBackend`] implementation

use super::error::{OpenRouterError, retry_after, status_error, transport_error};
use super::sse::{SseDecoder, SseEvent};
use super::types::{ChatRequest, ChatResponse, StreamChunk};
use async_trait::async_trait;
use council_application::{
    BackendChunk, BackendError, BackendErrorKind, BackendReply, ChunkStream, InvokeOptions,
    ModelBackend,
};
use council_domain::{ModelIdentity, Prompt, TokenUsage};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, debug_span, warn};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Deltas buffered between the HTTP reader task and the caller.
const STREAM_BUFFER: usize = 64;

/// Connection settings for [`OpenRouterBackend`]
#[derive(Debug, Clone)]
pub struct OpenRouterSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    /// Sent as `HTTP-Referer` for OpenRouter attribution.
    pub referer: Option<String>,
    /// Sent as `X-Title` for OpenRouter attribution.
    pub app_title: Option<String>,
}

impl Default for OpenRouterSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 20,
            referer: None,
            app_title: Some("council".to_string()),
        }
    }
}

/// Chat completions over OpenRouter
///
/// Per-call deadlines come from [`InvokeOptions`]; retries are left to the
/// caller.
#[derive(Debug, Clone)]
pub struct OpenRouterBackend {
    client: reqwest::Client,
    base_url: String,
}

impl OpenRouterBackend {
    pub fn new(api_key: &str, settings: &OpenRouterSettings) -> Result<Self, OpenRouterError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| OpenRouterError::InvalidApiKey)?;
        headers.insert(AUTHORIZATION, auth);

        if let Some(v) = settings
            .referer
            .as_deref()
            .and_then(|r| HeaderValue::from_str(r).ok())
        {
            headers.insert("HTTP-Referer", v);
        }
        if let Some(v) = settings
            .app_title
            .as_deref()
            .and_then(|t| HeaderValue::from_str(t).ok())
        {
            headers.insert("X-Title", v);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .pool_max_idle_per_host(settings.pool_max_idle_per_host)
            .default_headers(headers)
            .build()
            .map_err(OpenRouterError::Client)?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create with the key from `OPENROUTER_API_KEY`.
    pub fn from_env(settings: &OpenRouterSettings) -> Result<Self, OpenRouterError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(OpenRouterError::MissingApiKey)?;
        Self::new(&api_key, settings)
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// POST the request and return the response once its status is 2xx.
    async fn send(
        &self,
        model: &ModelIdentity,
        prompt: &Prompt,
        stream: bool,
        timeout: Duration,
    ) -> Result<reqwest::Response, BackendError> {
        let body = ChatRequest::new(model.id(), prompt, stream);
        debug!(model = %model, stream, chars = prompt.user.len(), "Sending chat completion");

        let response = self
            .client
            .post(self.chat_url())
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e, timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let delay = retry_after(response.headers());
        let text = response.text().await.unwrap_or_default();
        let err = status_error(status.as_u16(), &text, delay);
        debug!(model = %model, status = status.as_u16(), error = %err, "Chat completion rejected");
        Err(err)
    }
}

#[async_trait]
impl ModelBackend for OpenRouterBackend {
    async fn invoke(
        &self,
        model: &ModelIdentity,
        prompt: &Prompt,
        options: &InvokeOptions,
    ) -> Result<BackendReply, BackendError> {
        let start = Instant::now();
        let response = self.send(model, prompt, false, options.timeout).await?;
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&e, options.timeout))?;

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            BackendError::new(BackendErrorKind::Other, format!("invalid response JSON: {e}"))
        })?;

        if let Some(error) = parsed.error {
            let status = error.status().unwrap_or(500);
            let message = error.message.unwrap_or_else(|| "provider error".to_string());
            return Err(BackendError::new(error_kind(status), message).with_status(status));
        }

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            BackendError::new(BackendErrorKind::Other, "no choices in response")
        })?;
        let text = choice.message.and_then(|m| m.content).unwrap_or_default();
        let usage = parsed.usage.map(TokenUsage::from).unwrap_or_default();

        debug!(
            model = %model,
            latency_ms = start.elapsed().as_millis() as u64,
            tokens = usage.total(),
            "Chat completion received"
        );

        Ok(BackendReply {
            text,
            usage,
            generation_id: parsed.id,
        })
    }

    async fn invoke_streaming(
        &self,
        model: &ModelIdentity,
        prompt: &Prompt,
        options: &InvokeOptions,
    ) -> Result<ChunkStream, BackendError> {
        let response = self.send(model, prompt, true, options.timeout).await?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let span = debug_span!("sse", model = %model);
        tokio::spawn(read_stream(response, tx, options.timeout).instrument(span));
        Ok(ChunkStream::new(rx))
    }
}

/// Same classification as HTTP statuses, for errors reported in a 200 body.
fn error_kind(status: u16) -> BackendErrorKind {
    status_error(status, "", None).kind
}

/// Forward an SSE body as [`BackendChunk`]s until `[DONE]`, an error, or
/// the receiver going away.
async fn read_stream(
    mut response: reqwest::Response,
    tx: mpsc::Sender<BackendChunk>,
    timeout: Duration,
) {
    let mut decoder = SseDecoder::default();
    let mut state = StreamState::default();

    loop {
        let next = tokio::select! {
            next = response.chunk() => next,
            () = tx.closed() => {
                debug!("Stream receiver dropped, closing connection");
                return;
            }
        };
        let bytes = match next {
            Ok(Some(bytes)) => bytes,
            Ok(None) => break,
            Err(e) => {
                let _ = tx.send(BackendChunk::Error(transport_error(&e, timeout))).await;
                return;
            }
        };

        for event in decoder.push(&bytes) {
            match state.apply(event) {
                Step::Continue => {}
                Step::Delta(text) => {
                    if tx.send(BackendChunk::Delta(text)).await.is_err() {
                        return;
                    }
                }
                Step::End(last) => {
                    let _ = tx.send(last).await;
                    return;
                }
            }
        }
    }

    let last = match decoder.finish().map(|event| state.apply(event)) {
        Some(Step::End(last)) => last,
        Some(Step::Delta(text)) => {
            let _ = tx.send(BackendChunk::Delta(text)).await;
            state.end_of_body()
        }
        Some(Step::Continue) | None => state.end_of_body(),
    };
    let _ = tx.send(last).await;
}

enum Step {
    Continue,
    Delta(String),
    End(BackendChunk),
}

#[derive(Default)]
struct StreamState {
    usage: TokenUsage,
    generation_id: Option<String>,
    finished: bool,
}

impl StreamState {
    fn apply(&mut self, event: SseEvent) -> Step {
        let data = match event {
            SseEvent::Done => return Step::End(self.completed()),
            SseEvent::Data(data) => data,
        };

        let chunk: StreamChunk = match serde_json::from_str(&data) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(error = %e, "Skipping malformed stream payload");
                return Step::Continue;
            }
        };

        if let Some(error) = chunk.error {
            let status = error.status().unwrap_or(500);
            let message = error.message.unwrap_or_else(|| "provider error".to_string());
            return Step::End(BackendChunk::Error(
                BackendError::new(error_kind(status), message).with_status(status),
            ));
        }
        if chunk.id.is_some() {
            self.generation_id = chunk.id;
        }
        if let Some(usage) = chunk.usage {
            self.usage = usage.into();
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return Step::Continue;
        };
        if choice.finish_reason.is_some() {
            self.finished = true;
        }
        match choice.delta.and_then(|d| d.content) {
            Some(text) if !text.is_empty() => Step::Delta(text),
            _ => Step::Continue,
        }
    }

    fn completed(&mut self) -> BackendChunk {
        BackendChunk::Completed(BackendReply {
            text: String::new(),
            usage: self.usage,
            generation_id: self.generation_id.take(),
        })
    }

    /// The body ended without `[DONE]`.
    fn end_of_body(&mut self) -> BackendChunk {
        if self.finished {
            self.completed()
        } else {
            BackendChunk::Error(BackendError::network("stream ended before completion"))
        }
    }
}
