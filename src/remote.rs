//! KB service client.
//!
//! The hosted KB service is a black box consumed over three operations:
//! submit a file (returns a processing job handle), poll a job's status, and
//! execute a ranked search. [`KbClient`] is the seam; [`HttpKbClient`] speaks
//! the service's REST JSON contract via reqwest.
//!
//! # Retry Strategy
//!
//! Submission and search calls retry transient failures with exponential
//! backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Job-status polls are NOT retried here: the completion poller owns the
//! transient-failure policy for polling (see [`crate::poller`]).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::RemoteConfig;
use crate::models::{JobHandle, SearchResult};

/// Search channels the KB service can run. Strategies map onto sets of
/// these; see [`crate::search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFeature {
    Semantic,
    Fulltext,
}

impl SearchFeature {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchFeature::Semantic => "semantic",
            SearchFeature::Fulltext => "fulltext",
        }
    }
}

/// Remote processing status for a submitted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteJobStatus {
    Processing,
    Succeeded,
    Failed { reason: String },
}

/// The consumed surface of the hosted KB service.
#[async_trait]
pub trait KbClient: Send + Sync {
    /// Upload file content under a stable slug. The service creates or
    /// updates the resource and returns a handle for its processing job.
    async fn submit_file(
        &self,
        slug: &str,
        title: &str,
        fingerprint: &str,
        bytes: Vec<u8>,
    ) -> Result<JobHandle>;

    /// One status poll for a processing job. Transient failures surface as
    /// errors; the caller decides whether to retry.
    async fn job_status(&self, handle: &JobHandle) -> Result<RemoteJobStatus>;

    /// Ranked search over the indexed corpus.
    async fn search(
        &self,
        query: &str,
        features: &[SearchFeature],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;
}

/// reqwest-based [`KbClient`] for the KB service's REST API.
pub struct HttpKbClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpKbClient {
    /// Build a client from configuration. Missing credentials are a fatal
    /// startup error, not a per-request one.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).with_context(|| {
            format!(
                "KB service API key not found: set the {} environment variable",
                config.api_key_env
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            max_retries: config.max_retries,
        })
    }

    /// Send a request, retrying rate limits, server errors, and network
    /// failures with exponential backoff. Client errors fail immediately.
    async fn send_with_retry<F>(&self, mut make_request: F) -> Result<reqwest::Response>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = make_request()
                .header("Authorization", format!("Bearer {}", self.api_key))
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("KB service error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("KB service error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

#[derive(Deserialize)]
struct SubmitResponse {
    resource_id: String,
    job_id: String,
}

#[derive(Deserialize)]
struct JobStatusResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[async_trait]
impl KbClient for HttpKbClient {
    async fn submit_file(
        &self,
        slug: &str,
        title: &str,
        fingerprint: &str,
        bytes: Vec<u8>,
    ) -> Result<JobHandle> {
        let url = format!("{}/v1/resources/{}/upload", self.base_url, slug);

        let response = self
            .send_with_retry(|| {
                self.client
                    .post(&url)
                    .query(&[("title", title), ("fingerprint", fingerprint)])
                    .header("Content-Type", "application/octet-stream")
                    .body(bytes.clone())
            })
            .await?;

        let parsed: SubmitResponse = response
            .json()
            .await
            .with_context(|| "Invalid submit response from KB service")?;

        Ok(JobHandle {
            resource_id: parsed.resource_id,
            job_id: parsed.job_id,
        })
    }

    async fn job_status(&self, handle: &JobHandle) -> Result<RemoteJobStatus> {
        let url = format!("{}/v1/jobs/{}", self.base_url, handle.job_id);

        // Single attempt by design: the poller retries transient failures
        // at its own cadence.
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("KB service error {}: {}", status, body_text);
        }

        let parsed: JobStatusResponse = response
            .json()
            .await
            .with_context(|| "Invalid job status response from KB service")?;

        match parsed.status.as_str() {
            "processing" => Ok(RemoteJobStatus::Processing),
            "succeeded" => Ok(RemoteJobStatus::Succeeded),
            "failed" => Ok(RemoteJobStatus::Failed {
                reason: parsed
                    .error
                    .unwrap_or_else(|| "processing failed".to_string()),
            }),
            other => bail!("Unknown job status from KB service: '{}'", other),
        }
    }

    async fn search(
        &self,
        query: &str,
        features: &[SearchFeature],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let url = format!("{}/v1/search", self.base_url);
        let feature_names: Vec<&str> = features.iter().map(|f| f.as_str()).collect();

        let body = serde_json::json!({
            "query": query,
            "features": feature_names,
            "top_k": top_k,
        });

        let response = self
            .send_with_retry(|| self.client.post(&url).json(&body))
            .await?;

        let parsed: SearchResponse = response
            .json()
            .await
            .with_context(|| "Invalid search response from KB service")?;

        Ok(parsed.results)
    }
}
