//! JSON-over-HTTP calls shared by the embedding and generation clients.

use std::time::Duration;

use anyhow::Result;
use thiserror::Error;

use legal_lens_core::error::{EmbedError, GenerateError};

/// Failure of a JSON POST, after retries.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network failure or non-success status.
    #[error("request failed: {0}")]
    Request(String),
    /// The response body was not JSON.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<HttpError> for EmbedError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Request(m) => EmbedError::Request(m),
            HttpError::Malformed(m) => EmbedError::Malformed(m),
        }
    }
}

impl From<HttpError> for GenerateError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Request(m) => GenerateError::Request(m),
            HttpError::Malformed(m) => GenerateError::Malformed(m),
        }
    }
}

pub fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// POST `body` to `url`, retrying 429, 5xx, and network errors.
///
/// Backoff doubles from 1s and is capped at 32s. Other 4xx statuses fail
/// immediately.
pub async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
    label: &str,
) -> Result<serde_json::Value, HttpError> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut req = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = bearer {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        match req.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json()
                        .await
                        .map_err(|e| HttpError::Malformed(format!("{}: {}", label, e)));
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = HttpError::Request(format!("{} API error {}: {}", label, status, body_text));

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    tracing::debug!(attempt, %status, "{} call will be retried", label);
                    last_err = Some(err);
                    continue;
                }

                return Err(err);
            }
            Err(e) => {
                tracing::debug!(attempt, error = %e, "{} connection failed", label);
                last_err = Some(HttpError::Request(format!(
                    "{} connection error ({}): {}",
                    label, url, e
                )));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| HttpError::Request(format!("{} failed after retries", label))))
}
