//! Model backend port
//!
//! Defines the interface for invoking a language model. The only caller is
//! [`ResilientCaller`](crate::use_cases::resilient_caller::ResilientCaller);
//! adapters live in the infrastructure layer.

use async_trait::async_trait;
use council_domain::{ModelIdentity, Prompt, TokenUsage};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Classification of a backend failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// HTTP 429 or an equivalent provider signal.
    RateLimited,
    /// HTTP 5xx.
    ServerError,
    /// Connection refused/reset, DNS, or a broken stream.
    Network,
    /// The call exceeded its timeout.
    Timeout,
    /// HTTP 400/404/422, or a reply the adapter could not decode.
    BadRequest,
    /// HTTP 401/403.
    Auth,
    /// HTTP 402.
    InsufficientCredits,
    /// Any other non-retryable failure.
    Other,
}

impl BackendErrorKind {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendErrorKind::RateLimited
                | BackendErrorKind::ServerError
                | BackendErrorKind::Network
                | BackendErrorKind::Timeout
        )
    }

    /// Stable code used in telemetry.
    pub fn code(&self) -> &'static str {
        match self {
            BackendErrorKind::RateLimited => "rate_limited",
            BackendErrorKind::ServerError => "server_error",
            BackendErrorKind::Network => "network",
            BackendErrorKind::Timeout => "timeout",
            BackendErrorKind::BadRequest => "bad_request",
            BackendErrorKind::Auth => "auth",
            BackendErrorKind::InsufficientCredits => "insufficient_credits",
            BackendErrorKind::Other => "other",
        }
    }
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A failed backend invocation
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
    /// HTTP status, when there was one.
    pub status: Option<u16>,
    /// Server-requested delay before retrying (`Retry-After`).
    pub retry_after: Option<Duration>,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::ServerError, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Network, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            BackendErrorKind::Timeout,
            format!("no reply within {}s", after.as_secs_f64()),
        )
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::BadRequest, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Auth, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Per-invocation options
#[derive(Debug, Clone)]
pub struct InvokeOptions {
    pub timeout: Duration,
}

/// A complete backend reply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendReply {
    pub text: String,
    pub usage: TokenUsage,
    /// Provider-side generation id, if reported.
    pub generation_id: Option<String>,
}

impl BackendReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }
}

/// An item of a streaming reply.
///
/// A well-formed stream is zero or more `Delta`s followed by exactly one
/// `Completed` or `Error`.
#[derive(Debug, Clone)]
pub enum BackendChunk {
    /// A text fragment.
    Delta(String),
    /// End of stream. `text` may be empty if the adapter only streamed deltas.
    Completed(BackendReply),
    /// The stream failed.
    Error(BackendError),
}

/// Handle for receiving a streaming reply.
pub struct ChunkStream {
    pub receiver: mpsc::Receiver<BackendChunk>,
}

impl ChunkStream {
    pub fn new(receiver: mpsc::Receiver<BackendChunk>) -> Self {
        Self { receiver }
    }
}

/// A language-model backend
///
/// Implementations must be safe for concurrent use: one instance (and its
/// connection pool) serves every call of every round.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Send a prompt and wait for the complete reply.
    async fn invoke(
        &self,
        model: &ModelIdentity,
        prompt: &Prompt,
        options: &InvokeOptions,
    ) -> Result<BackendReply, BackendError>;

    /// Send a prompt and receive the reply as a chunk stream.
    ///
    /// Default implementation calls `invoke()` and wraps the result in a
    /// single `Completed` chunk.
    async fn invoke_streaming(
        &self,
        model: &ModelIdentity,
        prompt: &Prompt,
        options: &InvokeOptions,
    ) -> Result<ChunkStream, BackendError> {
        let reply = self.invoke(model, prompt, options).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(BackendChunk::Completed(reply)).await;
        Ok(ChunkStream::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BackendErrorKind::RateLimited.is_transient());
        assert!(BackendErrorKind::ServerError.is_transient());
        assert!(BackendErrorKind::Network.is_transient());
        assert!(BackendErrorKind::Timeout.is_transient());
        assert!(!BackendErrorKind::BadRequest.is_transient());
        assert!(!BackendErrorKind::Auth.is_transient());
        assert!(!BackendErrorKind::InsufficientCredits.is_transient());
        assert!(!BackendErrorKind::Other.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = BackendError::rate_limited("slow down").with_status(429);
        assert_eq!(err.to_string(), "rate_limited: slow down");
        assert_eq!(err.status, Some(429));
    }

    struct Echo;

    #[async_trait]
    impl ModelBackend for Echo {
        async fn invoke(
            &self,
            _model: &ModelIdentity,
            prompt: &Prompt,
            _options: &InvokeOptions,
        ) -> Result<BackendReply, BackendError> {
            Ok(BackendReply::new(prompt.user.clone()))
        }
    }

    #[tokio::test]
    async fn test_default_streaming_wraps_invoke() {
        let options = InvokeOptions {
            timeout: Duration::from_secs(1),
        };
        let mut stream = Echo
            .invoke_streaming(&ModelIdentity::member("a"), &Prompt::new(None, "ping"), &options)
            .await
            .unwrap();
        let Some(BackendChunk::Completed(reply)) = stream.receiver.recv().await else {
            panic!("expected a single completed chunk");
        };
        assert_eq!(reply.text, "ping");
        assert!(stream.receiver.recv().await.is_none());
    }
}
