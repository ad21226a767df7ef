use super::{RawVulnerability, VulnerabilitySource};
use crate::config::Config;
use crate::error::SourceError;
use crate::ratelimit::{RateLimitConfig, RateLimiter};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Public endpoint of the NVD CVE API 2.0.
pub const DEFAULT_NVD_URL: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";

const USER_AGENT: &str = concat!("depscan/", env!("CARGO_PKG_VERSION"));
const DEFAULT_RESULTS_PER_PAGE: u32 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_BACKOFF_SECS: u64 = 10;

/// Keyword-search client for the NVD CVE API.
///
/// Every request, including the single retry after a throttling response,
/// passes through the shared [`RateLimiter`].
pub struct NvdSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    results_per_page: u32,
    retry_backoff: Duration,
    limiter: Arc<RateLimiter>,
}

#[derive(Deserialize)]
struct NvdResponse {
    /// Absent when the search has no results.
    vulnerabilities: Option<Vec<serde_json::Value>>,
    #[serde(rename = "totalResults")]
    total_results: Option<u64>,
}

#[derive(Deserialize)]
struct NvdEntry {
    cve: RawVulnerability,
}

impl NvdSource {
    /// Creates a client for the public endpoint, using the rate-limit preset
    /// that matches whether `api_key` is set.
    pub fn new(api_key: Option<String>) -> Self {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig::for_credential(
            api_key.is_some(),
        )));
        Self {
            client: build_client(USER_AGENT, Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            base_url: DEFAULT_NVD_URL.to_string(),
            api_key,
            results_per_page: DEFAULT_RESULTS_PER_PAGE,
            retry_backoff: Duration::from_secs(DEFAULT_RETRY_BACKOFF_SECS),
            limiter,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let api_key = config.resolved_api_key();
        let limits = config.rate_limit_for(api_key.is_some());
        Self::new(api_key)
            .with_base_url(&config.nvd_base_url)
            .with_results_per_page(config.results_per_page)
            .with_timeout(Duration::from_secs(config.request_timeout_secs))
            .with_retry_backoff(Duration::from_secs(config.retry_backoff_secs))
            .with_rate_limiter(Arc::new(RateLimiter::new(limits)))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replaces the credential. The limiter is left untouched.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_results_per_page(mut self, results_per_page: u32) -> Self {
        self.results_per_page = results_per_page;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(USER_AGENT, timeout);
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Replaces the limiter, e.g. to share one budget between clients.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    async fn send(&self, package_name: &str) -> Result<reqwest::Response, SourceError> {
        self.limiter.acquire().await;

        let mut request = self
            .client
            .get(&self.base_url)
            .query(&[
                ("keywordSearch", package_name.to_string()),
                ("resultsPerPage", self.results_per_page.to_string()),
            ])
            .header("Accept", "application/json");

        if let Some(key) = &self.api_key {
            request = request.header("apiKey", key);
        }

        Ok(request.send().await?)
    }
}

fn build_client(user_agent: &str, timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!(
                error = %e,
                timeout_secs = timeout.as_secs_f64(),
                "could not build configured HTTP client, falling back to defaults"
            );
            reqwest::Client::new()
        }
    }
}

fn is_throttled(status: StatusCode) -> bool {
    status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl VulnerabilitySource for NvdSource {
    fn name(&self) -> &'static str {
        "NVD"
    }

    #[instrument(skip(self), fields(source = "nvd"))]
    async fn query(&self, package_name: &str) -> Result<Vec<RawVulnerability>, SourceError> {
        let mut response = self.send(package_name).await?;

        if is_throttled(response.status()) {
            warn!(
                status = response.status().as_u16(),
                backoff_secs = self.retry_backoff.as_secs_f64(),
                "throttled by NVD, retrying once"
            );
            tokio::time::sleep(self.retry_backoff).await;
            response = self.send(package_name).await?;
            if is_throttled(response.status()) {
                return Err(SourceError::RateLimited);
            }
        }

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("no results (404)");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(SourceError::RemoteFailure {
                status: status.as_u16(),
            });
        }

        let body: NvdResponse =
            response
                .json()
                .await
                .map_err(|e| SourceError::InvalidResponse {
                    reason: e.to_string(),
                })?;

        let entries = body.vulnerabilities.unwrap_or_default();
        debug!(
            returned = entries.len(),
            total = body.total_results.unwrap_or(0),
            "NVD search complete"
        );

        let records = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<NvdEntry>(entry) {
                Ok(entry) => Some(entry.cve),
                Err(e) => {
                    warn!(error = %e, "dropping undecodable vulnerability entry");
                    None
                }
            })
            .collect();

        Ok(records)
    }
}
