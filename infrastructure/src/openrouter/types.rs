//! Wire types for the chat completions API

use council_domain::{Prompt, TokenUsage};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub(super) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> ChatRequest<'a> {
    pub(super) fn new(model: &'a str, prompt: &'a Prompt, stream: bool) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = prompt.system.as_deref().filter(|s| !s.is_empty()) {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &prompt.user,
        });
        Self {
            model,
            messages,
            stream,
        }
    }
}

/// Non-streaming response body
#[derive(Deserialize)]
pub(super) struct ChatResponse {
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
    pub error: Option<ApiError>,
}

#[derive(Deserialize)]
pub(super) struct Choice {
    pub message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
pub(super) struct ChoiceMessage {
    pub content: Option<String>,
}

/// One `data:` payload of a streaming response
#[derive(Deserialize)]
pub(super) struct StreamChunk {
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    pub usage: Option<Usage>,
    pub error: Option<ApiError>,
}

#[derive(Deserialize)]
pub(super) struct StreamChoice {
    pub delta: Option<Delta>,
    pub finish_reason: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct Delta {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct Usage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

impl From<Usage> for TokenUsage {
    fn from(usage: Usage) -> Self {
        TokenUsage::new(
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
        )
    }
}

#[derive(Deserialize)]
pub(super) struct ApiError {
    pub message: Option<String>,
    /// OpenRouter reports the HTTP status here; other providers a string.
    pub code: Option<serde_json::Value>,
}

impl ApiError {
    pub(super) fn status(&self) -> Option<u16> {
        self.code
            .as_ref()
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok())
    }
}

/// Error body of a non-2xx response
#[derive(Deserialize)]
pub(super) struct ErrorBody {
    pub error: ApiError,
}
