use super::{append_batch, DataWriter};
use crate::model::Batch;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use ingest_core::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Appends JSON lines to `<base_dir>/<api>/<coin>/<YYYYmmdd-HHMMSS>.json`.
pub struct LocalWriter {
    api: String,
    coin: String,
    path: PathBuf,
    rows_written: usize,
}

impl LocalWriter {
    pub fn new(coin: &str, api: &str, base_dir: impl AsRef<Path>) -> Self {
        Self::at(coin, api, base_dir, Local::now())
    }

    pub fn at(coin: &str, api: &str, base_dir: impl AsRef<Path>, now: DateTime<Local>) -> Self {
        let path = base_dir
            .as_ref()
            .join(api)
            .join(coin)
            .join(format!("{}.json", now.format("%Y%m%d-%H%M%S")));

        debug!(api, coin, path = %path.display(), "Local writer created");

        Self {
            api: api.to_string(),
            coin: coin.to_string(),
            path,
            rows_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}

#[async_trait]
impl DataWriter for LocalWriter {
    async fn write(&mut self, batch: &Batch) -> Result<usize> {
        let written = append_batch(&self.path, batch, &self.api).await?;
        self.rows_written += written;
        debug!(
            coin = %self.coin,
            written,
            total = self.rows_written,
            "Rows appended"
        );
        Ok(written)
    }

    async fn finish(&mut self) -> Result<()> {
        info!(
            path = %self.path.display(),
            rows = self.rows_written,
            "Local output complete"
        );
        Ok(())
    }

    fn destination(&self) -> String {
        self.path.display().to_string()
    }
}
