//! OpenRouter connection and retry policy from TOML (`[backend]` section)

use crate::openrouter::{DEFAULT_BASE_URL, OpenRouterSettings};
use council_application::CallPolicy;
use council_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backend configuration
///
/// The API key is never read from the file; it comes from
/// `OPENROUTER_API_KEY`.
///
/// # Example
///
/// ```toml
/// [backend]
/// base_url = "https://openrouter.ai/api/v1"
/// per_call_timeout_secs = 120
/// max_retries = 3               # total attempts per call
/// backoff_base_ms = 1000
/// max_retry_delay_secs = 30
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBackendConfig {
    pub base_url: String,
    pub per_call_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Total attempts per call, including the first
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    /// Ceiling for computed and server-provided retry delays
    pub max_retry_delay_secs: u64,
    pub pool_max_idle_per_host: usize,
    /// `HTTP-Referer` attribution header
    pub referer: Option<String>,
    /// `X-Title` attribution header
    pub app_title: Option<String>,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            per_call_timeout_secs: 120,
            connect_timeout_secs: 10,
            max_retries: 3,
            backoff_base_ms: 1000,
            max_retry_delay_secs: 30,
            pool_max_idle_per_host: 20,
            referer: None,
            app_title: Some("council".to_string()),
        }
    }
}

impl FileBackendConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        for (field, value) in [
            ("per_call_timeout_secs", self.per_call_timeout_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
        ] {
            if value == 0 {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::ZeroDuration,
                    format!("backend.{field}: cannot be 0"),
                ));
            }
        }
        if self.max_retries == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ZeroDuration,
                "backend.max_retries: 0 is treated as a single attempt",
            ));
        }
        issues
    }

    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy::default()
            .with_per_call_timeout(Duration::from_secs(self.per_call_timeout_secs))
            .with_max_attempts(self.max_retries)
            .with_backoff_base(Duration::from_millis(self.backoff_base_ms))
            .with_max_retry_delay(Duration::from_secs(self.max_retry_delay_secs))
    }

    pub fn settings(&self) -> OpenRouterSettings {
        OpenRouterSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            pool_max_idle_per_host: self.pool_max_idle_per_host,
            referer: self.referer.clone(),
            app_title: self.app_title.clone(),
        }
    }
}
