//! The HTTP plumbing every adapter shares: one reqwest client, request
//! pacing, retries and status-code mapping.

use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::retry::{RetryConfig, RetryExecutor};
use painminer_core::{CoreError, Platform, SourceError};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_USER_AGENT: &str = "pain-miner/1.0";
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub min_interval: Duration,
    pub retry: RetryConfig,
}

impl FetcherConfig {
    pub fn new(platform: Platform, timeout: Duration, min_interval: Duration) -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout,
            min_interval,
            retry: RetryConfig::for_platform(platform),
        }
    }
}

#[derive(Debug)]
pub struct HttpFetcher {
    platform: Platform,
    client: Client,
    rate_limiter: RateLimiter,
    retry: RetryExecutor,
}

impl HttpFetcher {
    pub fn new(platform: Platform, config: FetcherConfig) -> Result<Self, CoreError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            platform,
            client,
            rate_limiter: RateLimiter::new(RateLimitConfig::paced(config.min_interval)),
            retry: RetryExecutor::new(platform, config.retry),
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub async fn get_json<T>(
        &self,
        url: &str,
        query: &[(&str, String)],
        bearer: Option<&str>,
    ) -> Result<T, CoreError>
    where
        T: DeserializeOwned,
    {
        self.send_json(url, || {
            let request = self.client.get(url).query(query);
            with_bearer(request, bearer)
        })
        .await
    }

    pub async fn post_json<B, T>(&self, url: &str, body: &B, bearer: Option<&str>) -> Result<T, CoreError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(url, || {
            let request = self.client.post(url).json(body);
            with_bearer(request, bearer)
        })
        .await
    }

    async fn send_json<T, F>(&self, url: &str, build: F) -> Result<T, CoreError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let platform = self.platform;
        let build = &build;
        self.retry
            .execute(url, move || async move {
                let permit = self.rate_limiter.acquire_permit().await;
                if !permit.queue_wait_time.is_zero() {
                    debug!("{} request waited {:?} for pacing", platform, permit.queue_wait_time);
                }

                let response = build().send().await.map_err(|e| {
                    if e.is_timeout() {
                        CoreError::from(SourceError::RequestTimeout { platform })
                    } else {
                        CoreError::Network(e)
                    }
                })?;
                let response = check_status(platform, url, response)?;
                let bytes = response.bytes().await?;
                let parsed = serde_json::from_slice::<T>(&bytes).map_err(|e| {
                    SourceError::InvalidResponse {
                        platform,
                        details: format!("{url}: {e}"),
                    }
                })?;
                Ok::<T, CoreError>(parsed)
            })
            .await
    }
}

fn with_bearer(request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
    match bearer {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Map an unsuccessful status to the matching [`SourceError`].
pub fn check_status(platform: Platform, resource: &str, response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    warn!("{} request to {} failed with {}", platform, resource, status);
    Err(status_error(platform, resource, status, retry_after))
}

pub fn status_error(
    platform: Platform,
    resource: &str,
    status: StatusCode,
    retry_after: Option<u64>,
) -> SourceError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimitExceeded {
            platform,
            retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        StatusCode::UNAUTHORIZED => SourceError::Unauthorized { platform },
        StatusCode::FORBIDDEN => SourceError::Forbidden {
            platform,
            resource: resource.to_string(),
        },
        StatusCode::NOT_FOUND => SourceError::NotFound {
            platform,
            resource: resource.to_string(),
        },
        s if s.is_server_error() => SourceError::ServerError {
            platform,
            status_code: s.as_u16(),
        },
        s => SourceError::InvalidResponse {
            platform,
            details: format!("unexpected status {s} from {resource}"),
        },
    }
}
