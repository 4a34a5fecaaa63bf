//! OpenRouter backend
//!
//! Implements [`ModelBackend`](council_application::ModelBackend) over
//! OpenRouter's OpenAI-compatible `/chat/completions` endpoint. One
//! [`OpenRouterBackend`] owns one pooled `reqwest::Client` that every round
//! shares.

mod backend;
mod error;
mod sse;
mod types;

pub use backend::{DEFAULT_BASE_URL, OpenRouterBackend, OpenRouterSettings};
pub use error::OpenRouterError;
