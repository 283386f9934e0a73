//! HTTP plumbing shared by the catalog adapters.
//!
//! Each adapter owns one fetcher: its own client (timeout, user agent), its
//! own rate limiter, and a bounded retry loop with exponential backoff.

use super::rate_limiter::RateLimiter;
use crate::error::{Result, SourceError};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::config::HttpConfig;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Longest upstream error body kept in an error message
const MAX_ERROR_BODY: usize = 200;

/// Rate-limited, retrying JSON fetcher for one platform
pub struct HttpFetcher {
    platform: &'static str,
    client: Client,
    rate_limiter: Mutex<RateLimiter>,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    /// Create a fetcher for `platform` from the shared HTTP settings
    pub fn new(platform: &'static str, config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            platform,
            client,
            rate_limiter: Mutex::new(RateLimiter::new(
                config.requests_per_second,
                config.requests_per_minute,
            )),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// GET `url` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.execute(url, false, |client| client.get(url))
            .await?
            .ok_or_else(|| SourceError::Api {
                status_code: 404,
                message: format!("{} not found", url),
            })
    }

    /// GET `url`, treating HTTP 404 as "no such item"
    pub async fn get_json_optional<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        self.execute(url, true, |client| client.get(url)).await
    }

    /// POST a JSON body to `url` and decode the JSON response
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.execute(url, false, |client| client.post(url).json(body))
            .await?
            .ok_or_else(|| SourceError::Api {
                status_code: 404,
                message: format!("{} not found", url),
            })
    }

    /// Make a request with rate limiting and retry logic
    async fn execute<T, F>(&self, url: &str, allow_missing: bool, build: F) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut attempt: u32 = 0;

        loop {
            // Apply rate limiting before each request
            self.rate_limiter.lock().await.acquire().await;

            debug!(
                platform = self.platform,
                url = %redact(url),
                attempt = attempt + 1,
                "Making API request"
            );

            let error = match build(&self.client).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body = response.bytes().await?;
                        return match serde_json::from_slice::<T>(&body) {
                            Ok(data) => Ok(Some(data)),
                            Err(e) => {
                                warn!(
                                    platform = self.platform,
                                    url = %redact(url),
                                    error = %e,
                                    "Failed to parse response"
                                );
                                Err(e.into())
                            }
                        };
                    }

                    if status == StatusCode::NOT_FOUND && allow_missing {
                        debug!(platform = self.platform, url = %redact(url), "Not found");
                        return Ok(None);
                    }

                    let text = response.text().await.unwrap_or_default();
                    status_error(status, &text)
                }
                Err(e) => SourceError::Request(e),
            };

            if !should_retry(&error, attempt, self.max_retries) {
                warn!(
                    platform = self.platform,
                    url = %redact(url),
                    attempts = attempt + 1,
                    error = %error,
                    "Request failed"
                );
                return Err(error);
            }

            let delay = backoff_delay(self.retry_delay, attempt);
            debug!(
                platform = self.platform,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying after delay"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Map a non-success response to an API error, keeping a short body excerpt
fn status_error(status: StatusCode, body: &str) -> SourceError {
    SourceError::Api {
        status_code: i64::from(status.as_u16()),
        message: body.chars().take(MAX_ERROR_BODY).collect(),
    }
}

fn should_retry(error: &SourceError, attempt: u32, max_retries: u32) -> bool {
    attempt < max_retries && error.is_retryable()
}

/// Exponential backoff: `base * 2^attempt`, saturating
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Hide credentials carried in query strings before logging
fn redact(url: &str) -> String {
    match url.find("api_key=") {
        Some(start) => {
            let value_start = start + "api_key=".len();
            let value_end = url[value_start..]
                .find('&')
                .map_or(url.len(), |offset| value_start + offset);
            format!("{}***{}", &url[..value_start], &url[value_end..])
        }
        None => url.to_string(),
    }
}
