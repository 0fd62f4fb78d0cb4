pub mod day_summary;
pub mod trades;

use crate::model::Batch;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use ingest_core::backoff::retry_with_backoff;
use ingest_core::config::ApiConfig;
use ingest_core::{Error, Result};
use metrics::histogram;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

pub use day_summary::DaySummaryApi;
pub use trades::TradesApi;

/// What to ask an endpoint for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    /// One calendar day.
    Day(NaiveDate),
    /// An optionally bounded time range.
    Range {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
}

#[async_trait]
pub trait MarketDataApi: Send + Sync {
    /// Name used in output paths and object keys, e.g. `DaySummary`.
    fn name(&self) -> &str;

    fn coin(&self) -> &str;

    /// Full request URL for `query`.
    fn endpoint(&self, query: &Query) -> Result<String>;

    async fn fetch(&self, query: &Query) -> Result<Batch>;
}

/// Shared HTTP plumbing for the Mercado Bitcoin public data API.
#[derive(Clone)]
pub struct MercadoBitcoinClient {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_base_delay_ms: u64,
}

impl MercadoBitcoinClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            retry_base_delay_ms: config.retry_base_delay_ms,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `url` and decode the body as JSON, retrying transient failures.
    #[instrument(skip(self))]
    pub async fn get_json(&self, api: &str, url: &str) -> Result<Value> {
        retry_with_backoff(
            || self.request(api, url),
            self.max_retries,
            self.retry_base_delay_ms,
            api,
        )
        .await
    }

    async fn request(&self, api: &str, url: &str) -> Result<Value> {
        let start = Instant::now();
        let response = self.http.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                api: api.to_string(),
                status: Some(status.as_u16()),
                details: format!("GET {} returned {}: {}", url, status, body),
            });
        }

        let body = response.text().await?;
        let value: Value = serde_json::from_str(&body)?;

        let elapsed = start.elapsed();
        histogram!("ingest_api_request_duration_ms", "api" => api.to_string())
            .record(elapsed.as_millis() as f64);
        debug!(
            api,
            status = status.as_u16(),
            duration_ms = elapsed.as_millis(),
            "API request completed"
        );

        Ok(value)
    }
}
