//! retrying http client
//!
//! transient failures (connect errors, timeouts, 5xx) back off exponentially
//! from 500 ms; 4xx responses are the server telling us something and are
//! surfaced verbatim, never retried.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

const BACKOFF_BASE: Duration = Duration::from_millis(500);

pub struct RetryingClient {
    client: reqwest::Client,
    max_retries: u32,
}

impl RetryingClient {
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, max_retries })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .execute_with_retry(|| self.client.get(url))
            .await?;
        Ok(response.json::<T>().await?)
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .execute_with_retry(|| self.client.post(url).json(body))
            .await?;
        Ok(response.json::<T>().await?)
    }

    /// run a request, retrying transient failures with exponential backoff
    async fn execute_with_retry<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            let outcome = build().send().await;

            match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let body = response.text().await.unwrap_or_default();
                    if status.is_client_error() {
                        // the request itself is wrong; retrying cannot help
                        return Err(EngineError::Http {
                            status: status.as_u16(),
                            body,
                        });
                    }

                    if attempt >= self.max_retries {
                        return Err(EngineError::Http {
                            status: status.as_u16(),
                            body,
                        });
                    }
                    warn!("server error {} (attempt {}): {}", status, attempt, body);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(EngineError::Network(e));
                    }
                    warn!("request failed (attempt {}): {}", attempt, e);
                }
            }

            let backoff = BACKOFF_BASE * 2u32.pow(attempt);
            debug!("backing off {:?}", backoff);
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        // 500ms, 1s, 2s, 4s
        assert_eq!(BACKOFF_BASE * 2u32.pow(0), Duration::from_millis(500));
        assert_eq!(BACKOFF_BASE * 2u32.pow(1), Duration::from_millis(1000));
        assert_eq!(BACKOFF_BASE * 2u32.pow(2), Duration::from_millis(2000));
    }
}
