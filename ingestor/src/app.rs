use crate::api::{DaySummaryApi, MarketDataApi, MercadoBitcoinClient, Query, TradesApi};
use crate::storage::{BlobStore, S3Store};
use crate::writer::{DataWriter, LocalWriter, S3Writer};
use chrono::NaiveDate;
use ingest_core::{Config, Error, Result};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Where an ingestion run puts its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Sink {
    Local,
    S3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub queries: usize,
    pub records: usize,
    pub destination: String,
}

pub struct App {
    config: Config,
    client: MercadoBitcoinClient,
    store: Option<Arc<dyn BlobStore>>,
}

impl App {
    #[instrument(skip(config))]
    pub async fn new(config: Config, sink: Sink) -> Result<Self> {
        info!("Initializing application");

        let store: Option<Arc<dyn BlobStore>> = match sink {
            Sink::S3 => Some(Arc::new(S3Store::new(&config.storage).await?)),
            Sink::Local => None,
        };

        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Option<Arc<dyn BlobStore>>) -> Result<Self> {
        let client = MercadoBitcoinClient::new(&config.api)?;
        Ok(Self {
            config,
            client,
            store,
        })
    }

    pub fn day_summary(&self, coin: &str) -> DaySummaryApi {
        DaySummaryApi::new(coin, self.client.clone())
    }

    pub fn trades(&self, coin: &str) -> TradesApi {
        TradesApi::new(coin, self.client.clone())
    }

    /// One writer per run, keyed by coin, api name and the current time.
    pub fn writer(&self, sink: Sink, coin: &str, api: &str) -> Result<Box<dyn DataWriter>> {
        match sink {
            Sink::Local => Ok(Box::new(LocalWriter::new(
                coin,
                api,
                &self.config.output.base_dir,
            ))),
            Sink::S3 => {
                let store = self.store.clone().ok_or_else(|| {
                    Error::Config("S3 sink requested but no blob store is configured".to_string())
                })?;
                Ok(Box::new(S3Writer::new(coin, api, &self.config.storage, store)?))
            }
        }
    }

    /// Fetch every query in order, write each batch, then finish the writer once.
    /// The writer is finished even when a fetch or write fails, so rows written
    /// before the failure still reach their destination; the first error wins.
    #[instrument(skip_all, fields(api = api.name(), coin = api.coin()))]
    pub async fn run(
        &self,
        api: &dyn MarketDataApi,
        queries: &[Query],
        writer: &mut dyn DataWriter,
    ) -> Result<RunSummary> {
        let mut records = 0;
        let ingested = ingest_queries(api, queries, writer, &mut records).await;
        let finished = writer.finish().await;

        match (ingested, finished) {
            (Err(e), Ok(())) => {
                warn!(
                    records,
                    destination = %writer.destination(),
                    error = %e,
                    "Run failed, rows written before the failure were delivered"
                );
                return Err(e);
            }
            (Err(e), Err(finish_err)) => {
                error!(
                    records,
                    error = %finish_err,
                    "Failed to deliver rows written before the run failed"
                );
                return Err(e);
            }
            (Ok(()), Err(finish_err)) => return Err(finish_err),
            (Ok(()), Ok(())) => {}
        }

        let summary = RunSummary {
            queries: queries.len(),
            records,
            destination: writer.destination(),
        };

        info!(
            queries = summary.queries,
            records = summary.records,
            destination = %summary.destination,
            "Ingestion run complete"
        );

        Ok(summary)
    }
}

async fn ingest_queries(
    api: &dyn MarketDataApi,
    queries: &[Query],
    writer: &mut dyn DataWriter,
    records: &mut usize,
) -> Result<()> {
    for query in queries {
        let batch = api.fetch(query).await?;
        let written = writer.write(&batch).await?;
        *records += written;
        info!(?query, written, "Batch ingested");
    }
    Ok(())
}

/// One `Query::Day` per calendar day from `from` through `to`, inclusive.
pub fn day_queries(from: NaiveDate, to: NaiveDate) -> Result<Vec<Query>> {
    if to < from {
        return Err(Error::Config(format!(
            "end date {} is before start date {}",
            to, from
        )));
    }
    Ok(from.iter_days().take_while(|d| *d <= to).map(Query::Day).collect())
}
