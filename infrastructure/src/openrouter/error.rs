//! OpenRouter errors and their mapping onto the backend contract

use super::types::ErrorBody;
use council_application::{BackendError, BackendErrorKind};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;
use thiserror::Error;

/// Errors constructing the OpenRouter backend
///
/// Failures of individual calls are reported as [`BackendError`]s.
#[derive(Error, Debug)]
pub enum OpenRouterError {
    #[error("OPENROUTER_API_KEY is not set")]
    MissingApiKey,

    #[error("Invalid API key format")]
    InvalidApiKey,

    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Map a non-2xx response onto the backend contract.
pub(super) fn status_error(status: u16, body: &str, retry_after: Option<Duration>) -> BackendError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {status}"));

    let kind = match status {
        429 => BackendErrorKind::RateLimited,
        500 | 502 | 503 | 504 => BackendErrorKind::ServerError,
        400 | 404 | 422 => BackendErrorKind::BadRequest,
        401 | 403 => BackendErrorKind::Auth,
        402 => BackendErrorKind::InsufficientCredits,
        _ => BackendErrorKind::Other,
    };

    let mut err = BackendError::new(kind, message).with_status(status);
    if let Some(delay) = retry_after {
        err = err.with_retry_after(delay);
    }
    err
}

/// Map a transport failure (connect, timeout, body read) onto the contract.
pub(super) fn transport_error(e: &reqwest::Error, timeout: Duration) -> BackendError {
    if e.is_timeout() {
        BackendError::timeout(timeout)
    } else if e.is_connect() {
        BackendError::network(format!("connection failed: {e}"))
    } else {
        BackendError::network(e.to_string())
    }
}

/// `Retry-After` in delta-seconds. HTTP-date values are ignored.
pub(super) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_status_classification() {
        let cases = [
            (429, BackendErrorKind::RateLimited, true),
            (500, BackendErrorKind::ServerError, true),
            (502, BackendErrorKind::ServerError, true),
            (503, BackendErrorKind::ServerError, true),
            (504, BackendErrorKind::ServerError, true),
            (400, BackendErrorKind::BadRequest, false),
            (404, BackendErrorKind::BadRequest, false),
            (422, BackendErrorKind::BadRequest, false),
            (401, BackendErrorKind::Auth, false),
            (403, BackendErrorKind::Auth, false),
            (402, BackendErrorKind::InsufficientCredits, false),
            (418, BackendErrorKind::Other, false),
        ];
        for (status, kind, transient) in cases {
            let err = status_error(status, "", None);
            assert_eq!(err.kind, kind, "status {status}");
            assert_eq!(err.is_transient(), transient, "status {status}");
            assert_eq!(err.status, Some(status));
        }
    }

    #[test]
    fn test_message_taken_from_error_body() {
        let err = status_error(
            402,
            r#"{"error":{"message":"Insufficient credits","code":402}}"#,
            None,
        );
        assert_eq!(err.message, "Insufficient credits");

        let err = status_error(502, "<html>Bad Gateway</html>", None);
        assert_eq!(err.message, "HTTP 502");
    }

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);

        assert_eq!(retry_after(&HeaderMap::new()), None);
    }
}
