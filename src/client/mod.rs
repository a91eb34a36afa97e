//! Retrying HTTP request client.
//!
//! [`ApiClient`] wraps `reqwest` with error classification and bounded
//! exponential-backoff retry:
//!
//! - 4xx statuses are client input problems — surfaced immediately and
//!   verbatim, never retried.
//! - 5xx statuses and network-level failures are transient — retried with
//!   a monotonically doubling delay until the retry budget is exhausted,
//!   and only then surfaced.
//!
//! The returned error stays classified (see
//! [`MuninError::is_transient()`]), so a caller can always distinguish
//! "permanently rejected" from "transiently failed, safe to re-issue".
//! Concurrent calls share nothing but the connection pool: each is an
//! independent request/retry sequence.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::telemetry;
use crate::{MuninError, Result};

/// Per-request retry behaviour.
///
/// ```rust
/// # use munin::client::RequestOptions;
/// # use std::time::Duration;
/// let options = RequestOptions::new()
///     .retries(5)
///     .retry_delay(Duration::from_millis(200));
/// ```
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Extra attempts after the initial request. Default: 3.
    pub retries: u32,
    /// Base delay before the first retry; doubles each attempt.
    /// Default: 1s.
    pub retry_delay: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl RequestOptions {
    /// Create options with the defaults (3 retries, 1s base delay).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of extra attempts after the initial request.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the base delay before the first retry.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Backoff before retry number `attempt` (0-indexed):
    /// `retry_delay * 2^attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Error payload shape remote endpoints are expected to produce.
#[derive(serde::Deserialize)]
struct ErrorBody {
    message: String,
}

/// HTTP client with classification-aware retry.
pub struct ApiClient {
    http: reqwest::Client,
}

impl ApiClient {
    /// Client with a fresh connection pool.
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Client reusing an existing `reqwest` pool.
    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// GET a JSON document.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        self.execute(reqwest::Method::GET, url, None::<&()>, options)
            .await
    }

    /// POST a JSON body and parse a JSON response.
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
        options: &RequestOptions,
    ) -> Result<T> {
        self.execute(reqwest::Method::POST, url, Some(body), options)
            .await
    }

    async fn execute<T: DeserializeOwned, B: Serialize>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&B>,
        options: &RequestOptions,
    ) -> Result<T> {
        let mut last_err = None;
        for attempt in 0..=options.retries {
            match self.try_once(method.clone(), url, body).await {
                Ok(value) => return Ok(value),
                // Client input problem: retry cannot fix it.
                Err(e) if e.is_client_error() => return Err(e),
                Err(e) => {
                    if attempt < options.retries {
                        let delay = options.backoff_delay(attempt);
                        metrics::counter!(telemetry::RETRIES_TOTAL,
                            "endpoint" => url.to_string())
                        .increment(1);
                        warn!(
                            url,
                            attempt = attempt + 1,
                            max_attempts = options.retries + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "retrying after transient error"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| MuninError::Http("request failed".to_string())))
    }

    async fn try_once<T: DeserializeOwned, B: Serialize>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            // Prefer the endpoint's own error message, fall back to the
            // status text.
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.message,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            };
            return Err(MuninError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_monotonically() {
        let options = RequestOptions::new();
        assert_eq!(options.backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(options.backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(options.backoff_delay(2), Duration::from_millis(4000));
    }

    #[test]
    fn backoff_respects_custom_base() {
        let options = RequestOptions::new().retry_delay(Duration::from_millis(250));
        assert_eq!(options.backoff_delay(0), Duration::from_millis(250));
        assert_eq!(options.backoff_delay(3), Duration::from_millis(2000));
    }
}
