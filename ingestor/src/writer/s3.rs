use super::{append_batch, DataWriter};
use crate::model::Batch;
use crate::storage::BlobStore;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Local};
use ingest_core::config::StorageConfig;
use ingest_core::Result;
use metrics::{counter, histogram};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{info, instrument, warn};

/// Partitioned object key for one ingestion run.
pub fn object_key(prefix: &str, api: &str, coin: &str, now: DateTime<Local>) -> String {
    format!(
        "{prefix}/{api}/coin={coin}/extracted_at={date}/{api}_{coin}_{ts}.json",
        date = now.format("%Y-%m-%d"),
        ts = now.format("%Y-%m-%d %H:%M:%S%.6f"),
    )
}

/// Buffers JSON lines in a temporary file and uploads the whole file
/// to the blob store when the run finishes.
pub struct S3Writer {
    api: String,
    coin: String,
    bucket: String,
    key: String,
    tempfile: NamedTempFile,
    store: Arc<dyn BlobStore>,
    rows_written: usize,
    rows_uploaded: usize,
}

impl S3Writer {
    pub fn new(
        coin: &str,
        api: &str,
        storage: &StorageConfig,
        store: Arc<dyn BlobStore>,
    ) -> Result<Self> {
        Self::at(coin, api, storage, store, Local::now())
    }

    pub fn at(
        coin: &str,
        api: &str,
        storage: &StorageConfig,
        store: Arc<dyn BlobStore>,
        now: DateTime<Local>,
    ) -> Result<Self> {
        let tempfile = NamedTempFile::new()?;
        let key = object_key(&storage.key_prefix, api, coin, now);

        info!(
            bucket = %storage.bucket,
            key = %key,
            tempfile = %tempfile.path().display(),
            "S3 writer created"
        );

        Ok(Self {
            api: api.to_string(),
            coin: coin.to_string(),
            bucket: storage.bucket.clone(),
            key,
            tempfile,
            store,
            rows_written: 0,
            rows_uploaded: 0,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn rows_pending(&self) -> usize {
        self.rows_written - self.rows_uploaded
    }
}

#[async_trait]
impl DataWriter for S3Writer {
    async fn write(&mut self, batch: &Batch) -> Result<usize> {
        let written = append_batch(self.tempfile.path(), batch, &self.api).await?;
        self.rows_written += written;
        Ok(written)
    }

    /// Uploads the full temp file in one put. A no-op when nothing new
    /// has been written since the last upload.
    #[instrument(skip(self))]
    async fn finish(&mut self) -> Result<()> {
        if self.rows_pending() == 0 {
            info!(coin = %self.coin, "Nothing to upload");
            return Ok(());
        }

        let body = Bytes::from(tokio::fs::read(self.tempfile.path()).await?);
        let size = body.len();

        self.store.put(&self.bucket, &self.key, body).await?;

        counter!("ingest_uploads_total", "store" => self.store.store_id().to_string()).increment(1);
        histogram!("ingest_upload_bytes").record(size as f64);

        self.rows_uploaded = self.rows_written;
        info!(
            bucket = %self.bucket,
            key = %self.key,
            rows = self.rows_written,
            bytes = size,
            "Upload complete"
        );
        Ok(())
    }

    fn destination(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

impl Drop for S3Writer {
    fn drop(&mut self) {
        if self.rows_pending() > 0 {
            warn!(
                key = %self.key,
                pending = self.rows_pending(),
                "S3 writer dropped with rows that were never uploaded"
            );
        }
    }
}
