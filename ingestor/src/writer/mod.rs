pub mod local;
pub mod s3;

use crate::model::{Batch, Record};
use async_trait::async_trait;
use ingest_core::Result;
use metrics::counter;
use serde_json::Value;
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

pub use local::LocalWriter;
pub use s3::S3Writer;

/// Sink for newline-delimited JSON records.
#[async_trait]
pub trait DataWriter: Send {
    /// Append every record of `batch`, in order. Returns the number of rows written.
    async fn write(&mut self, batch: &Batch) -> Result<usize>;

    /// Deliver everything written so far to its final destination.
    async fn finish(&mut self) -> Result<()>;

    /// Human-readable location of the output.
    fn destination(&self) -> String;

    /// Resolve an untyped JSON payload into a batch and write it.
    async fn write_value(&mut self, value: Value) -> Result<usize> {
        let batch = Batch::try_from(value)?;
        self.write(&batch).await
    }
}

/// Serialize one record as a single JSON line.
pub fn to_json_line(record: &Record) -> Result<String> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    Ok(line)
}

/// Append one JSON line to `path`, creating parent directories as needed.
/// The file is opened for each row and closed again.
pub(crate) async fn append_row(path: &Path, record: &Record) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let line = to_json_line(record)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

pub(crate) async fn append_batch(path: &Path, batch: &Batch, api: &str) -> Result<usize> {
    let mut written = 0;
    for record in batch.records() {
        append_row(path, record).await?;
        written += 1;
    }
    counter!("ingest_records_written_total", "api" => api.to_string()).increment(written as u64);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            (-100_000_000i64..100_000_000).prop_map(|cents| Value::from(cents as f64 / 100.0)),
            "[a-zA-Z0-9 .:\\-\"\\\\]{0,16}".prop_map(Value::from),
        ]
    }

    fn arb_record() -> impl Strategy<Value = Record> {
        prop::collection::btree_map("[a-z_]{1,10}", arb_scalar(), 0..8)
            .prop_map(|fields| fields.into_iter().collect())
    }

    #[test]
    fn json_line_has_exactly_one_trailing_newline() {
        let record: Record = json!({"note": "line\nbreak"}).as_object().unwrap().clone();
        let line = to_json_line(&record).unwrap();
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.ends_with('\n'));
    }

    #[tokio::test]
    async fn rows_are_on_disk_as_soon_as_the_call_returns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rows.json");
        let record: Record = json!({"price": 1.5}).as_object().unwrap().clone();

        append_row(&path, &record).await.unwrap();
        append_row(&path, &record).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "{\"price\":1.5}\n{\"price\":1.5}\n");
    }

    proptest! {
        #[test]
        fn json_line_decodes_to_the_same_record(record in arb_record()) {
            let line = to_json_line(&record).unwrap();
            let decoded: Record = serde_json::from_str(line.trim_end()).unwrap();
            prop_assert_eq!(decoded, record);
        }

        #[test]
        fn batch_rows_land_in_order(records in prop::collection::vec(arb_record(), 0..12)) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("rows.json");
            let runtime = tokio::runtime::Runtime::new().unwrap();
            let written = runtime
                .block_on(append_batch(&path, &Batch::Many(records.clone()), "test"))
                .unwrap();
            prop_assert_eq!(written, records.len());

            let contents = std::fs::read_to_string(&path).unwrap_or_default();
            let decoded: Vec<Record> = contents
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect();
            prop_assert_eq!(decoded, records);
        }
    }
}
