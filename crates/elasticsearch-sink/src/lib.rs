//! Elasticsearch sink for film-sync.
//!
//! Talks to the cluster over its JSON/HTTP API with `reqwest`:
//!
//! - `GET /` to check the cluster answers (retried with a [`RetryPolicy`]),
//! - `HEAD /<index>` + `PUT /<index>` to provision the index mapping,
//! - `POST /_bulk?refresh=true` with NDJSON bodies to upsert documents.

mod bulk;
mod mapping;


pub use bulk::{BulkItemFailure, BulkSummary};
pub use mapping::index_definition;

use anyhow::{Context, Result};
use index_sink::IndexSink;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use sync_backoff::RetryPolicy;
use sync_core::FilmDocument;

/// Documents per `_bulk` request.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection and write settings for [`ElasticsearchSink`].
#[derive(Clone, Debug)]
pub struct ElasticConfig {
    /// Base URL, e.g. `http://localhost:9200`.
    pub url: String,
    pub index: String,
    pub chunk_size: usize,
    /// Treat any per-document failure as a failed write.
    pub strict: bool,
    /// Policy for the `GET /` ping.
    pub connect_retry: RetryPolicy,
    /// Policy for each `_bulk` request.
    pub bulk_retry: RetryPolicy,
}

impl ElasticConfig {
    pub fn new(url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            index: index.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            strict: false,
            connect_retry: RetryPolicy::connect(),
            bulk_retry: RetryPolicy::bulk(),
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Use `retry` for both the ping and the bulk requests.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.connect_retry = retry.clone();
        self.bulk_retry = retry;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

pub struct ElasticsearchSink {
    config: ElasticConfig,
    client: Client,
    provisioned: AtomicBool,
}

impl ElasticsearchSink {
    pub fn new(config: ElasticConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            config,
            client,
            provisioned: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ElasticConfig {
        &self.config
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.config.base_url(), self.config.index)
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/", self.config.base_url());
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach Elasticsearch at '{url}'"))?;
        if !response.status().is_success() {
            anyhow::bail!(
                "Elasticsearch at '{url}' answered ping with status {}",
                response.status()
            );
        }
        Ok(())
    }

    /// Make sure the cluster answers, retrying per the configured policy.
    pub async fn connect(&self) -> Result<()> {
        let mut attempt = 0u32;
        self.config
            .connect_retry
            .retry(|| {
                attempt += 1;
                async move {
                    let result = self.ping().await;
                    if let Err(e) = &result {
                        tracing::warn!(
                            attempt,
                            url = %self.config.url,
                            "Elasticsearch is not reachable: {e:#}"
                        );
                    }
                    result
                }
            })
            .await
    }

    async fn create_index_if_missing(&self) -> Result<()> {
        let url = self.index_url();
        let response = self
            .client
            .head(&url)
            .send()
            .await
            .with_context(|| format!("Failed to check index '{}'", self.config.index))?;

        match response.status() {
            status if status.is_success() => {
                tracing::info!(index = %self.config.index, "Index already exists");
                return Ok(());
            }
            StatusCode::NOT_FOUND => {}
            status => anyhow::bail!(
                "Unexpected status {status} checking index '{}'",
                self.config.index
            ),
        }

        let response = self
            .client
            .put(&url)
            .json(&index_definition())
            .send()
            .await
            .with_context(|| format!("Failed to create index '{}'", self.config.index))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Creating index '{}' failed with status {status}: {body}",
                self.config.index
            );
        }

        tracing::info!(index = %self.config.index, "Created index");
        Ok(())
    }

    /// Send one `_bulk` request and summarize the per-item results.
    async fn send_chunk(&self, documents: &[FilmDocument]) -> Result<BulkSummary> {
        let body = bulk::ndjson_body(&self.config.index, documents)?;
        let url = format!("{}/_bulk?refresh=true", self.config.base_url());

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .context("Bulk request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Bulk request returned status {status}: {body}");
        }

        let text = response
            .text()
            .await
            .context("Failed to read bulk response")?;
        bulk::summarize(&text)
    }
}

#[async_trait::async_trait]
impl IndexSink for ElasticsearchSink {
    async fn provision(&self) -> Result<()> {
        if self.provisioned.load(Ordering::Acquire) {
            return Ok(());
        }

        let result = match self.connect().await {
            Ok(()) => self.create_index_if_missing().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.provisioned.store(true, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                tracing::error!(index = %self.config.index, "Index provisioning failed: {e:#}");
                Err(e)
            }
        }
    }

    async fn bulk_upsert(&self, documents: &[FilmDocument]) -> bool {
        if documents.is_empty() {
            return true;
        }

        if let Err(e) = self.connect().await {
            tracing::error!("Giving up on Elasticsearch: {e:#}");
            return false;
        }

        let mut failed_documents = 0usize;
        for chunk in documents.chunks(self.config.chunk_size) {
            let sent = self
                .config
                .bulk_retry
                .retry(|| async move {
                    let result = self.send_chunk(chunk).await;
                    if let Err(e) = &result {
                        tracing::warn!(documents = chunk.len(), "Bulk request failed: {e:#}");
                    }
                    result
                })
                .await;
            match sent {
                Ok(summary) => {
                    for failure in &summary.failures {
                        tracing::error!(
                            index = %self.config.index,
                            id = %failure.id,
                            status = failure.status,
                            "Document was not indexed: {}",
                            failure.reason
                        );
                    }
                    failed_documents += summary.failures.len();
                    tracing::debug!(
                        indexed = summary.succeeded,
                        failed = summary.failures.len(),
                        "Bulk chunk written"
                    );
                }
                Err(e) => {
                    tracing::error!(index = %self.config.index, "Giving up on bulk write: {e:#}");
                    return false;
                }
            }
        }

        if failed_documents > 0 && self.config.strict {
            tracing::error!(
                failed = failed_documents,
                "Rejecting batch with failed documents in strict mode"
            );
            return false;
        }
        true
    }
}
