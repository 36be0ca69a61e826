//! History REST client

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use super::HistorySource;
use crate::model::{into_ascending, Reading};

/// Prefix of every history error shown to the user
pub const HISTORY_ERROR_PREFIX: &str = "Error fetching history: ";

/// Base URL compiled in when no configuration overrides it
const BUILD_BASE_URL: Option<&str> = option_env!("FARMWATCH_HISTORY_URL");

/// Configuration for the history client
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// API root, e.g. "http://127.0.0.1:5000/api"
    pub base_url: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            base_url: BUILD_BASE_URL
                .unwrap_or("http://127.0.0.1:5000/api")
                .to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

/// HTTP client for the history endpoint
pub struct HistoryClient {
    client: Client,
    config: HistoryConfig,
}

impl HistoryClient {
    pub fn new(config: HistoryConfig) -> Result<Self, HistoryError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// URL for the last `limit` readings
    pub fn recent_url(&self, limit: u32) -> String {
        format!(
            "{}/readings/recent?limit={}",
            self.config.base_url.trim_end_matches('/'),
            limit
        )
    }
}

#[async_trait]
impl HistorySource for HistoryClient {
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<Reading>, HistoryError> {
        if limit == 0 {
            return Err(HistoryError::InvalidLimit);
        }

        let url = self.recent_url(limit);
        tracing::debug!(url = %url, "Fetching history");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(HistoryError::from_transport)?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(HistoryError::from_transport)?;

        if !status.is_success() {
            return Err(HistoryError::Api {
                status: status.as_u16(),
                reason: status.canonical_reason().map(str::to_string),
                message: error_message(&body),
            });
        }

        let readings = decode_envelope(&body)?;
        tracing::debug!(count = readings.len(), "History fetched");
        Ok(readings)
    }
}

/// `{status, data}` envelope from the history endpoint
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Option<Vec<Reading>>,
    #[serde(default)]
    message: Option<String>,
}

/// Unwrap a success body into readings, oldest first
pub fn decode_envelope(body: &[u8]) -> Result<Vec<Reading>, HistoryError> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| HistoryError::Decode(e.to_string()))?;

    if envelope
        .status
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("error"))
    {
        return Err(HistoryError::Api {
            status: 200,
            reason: None,
            message: envelope.message,
        });
    }

    match envelope.data {
        Some(data) => Ok(into_ascending(data)),
        None => Err(HistoryError::Decode("response has no data field".to_string())),
    }
}

/// Most specific message in an error body: `message`, then `error.message`,
/// then `error` as a string.
fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;

    value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| value.pointer("/error/message").and_then(Value::as_str))
        .or_else(|| value.get("error").and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Errors from the history endpoint
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("limit must be a positive integer")]
    InvalidLimit,

    #[error("History service unavailable")]
    Unavailable,

    #[error("Request timeout")]
    Timeout,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}")]
    Api {
        status: u16,
        reason: Option<String>,
        message: Option<String>,
    },

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl HistoryError {
    fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HistoryError::Timeout
        } else if e.is_connect() {
            HistoryError::Unavailable
        } else {
            HistoryError::Request(e)
        }
    }

    /// Most specific detail available: server message, then HTTP status
    /// text, then the transport error, then "unknown".
    pub fn detail(&self) -> String {
        match self {
            HistoryError::Api {
                message, reason, ..
            } => message
                .clone()
                .or_else(|| reason.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            HistoryError::Request(e) => {
                let text = e.to_string();
                if text.is_empty() {
                    "unknown".to_string()
                } else {
                    text
                }
            }
            other => other.to_string(),
        }
    }

    /// Message for the dashboard's error slot
    pub fn user_message(&self) -> String {
        format!("{}{}", HISTORY_ERROR_PREFIX, self.detail())
    }
}
