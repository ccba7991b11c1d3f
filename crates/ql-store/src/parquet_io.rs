//! Parquet files of row sets.
//!
//! Every write is a full replace: the file is written next to its target
//! under a `.tmp` name and renamed into place, so readers never observe a
//! partial file.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use tracing::{debug, warn};

use ql_common::schema::is_compatible;
use ql_common::{RowSet, SCHEMA_VERSION};

use crate::error::{StoreError, StoreResult};
use crate::table::{from_record_batches, to_record_batch};

const CREATED_BY: &str = "quantlab";

fn writer_properties() -> WriterProperties {
    let metadata = vec![
        KeyValue {
            key: "created_by".to_string(),
            value: Some(CREATED_BY.to_string()),
        },
        KeyValue {
            key: "schema_version".to_string(),
            value: Some(SCHEMA_VERSION.to_string()),
        },
    ];
    WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .set_key_value_metadata(Some(metadata))
        .build()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `rows` to `path`, replacing any existing file. Returns the row count.
pub fn write_parquet(path: &Path, rows: &RowSet) -> StoreResult<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let batch = to_record_batch(rows)?;
    let tmp = tmp_path(path);

    let result = (|| {
        let file = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(writer_properties()))
            .map_err(|e| StoreError::parquet(path, e))?;
        writer.write(&batch).map_err(|e| StoreError::parquet(path, e))?;
        writer.close().map_err(|e| StoreError::parquet(path, e))?;
        fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result?;
    debug!(path = %path.display(), rows = rows.len(), "wrote parquet");
    Ok(rows.len())
}

fn open_builder(path: &Path) -> StoreResult<ParquetRecordBatchReaderBuilder<File>> {
    let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| StoreError::parquet(path, e))?;

    let version = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .and_then(|kv| kv.iter().find(|k| k.key == "schema_version"))
        .and_then(|k| k.value.clone());
    if let Some(v) = version {
        if !is_compatible(&v) {
            warn!(path = %path.display(), version = %v, expected = SCHEMA_VERSION, "schema version mismatch");
        }
    }
    Ok(builder)
}

/// Read a whole Parquet file into a row set.
pub fn read_parquet(path: &Path) -> StoreResult<RowSet> {
    let builder = open_builder(path)?;
    let schema = builder.schema().clone();
    let reader = builder.build().map_err(|e| StoreError::parquet(path, e))?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(from_record_batches(&schema, &batches)?)
}

/// Row count from the file footer, without decoding any data.
pub fn row_count(path: &Path) -> StoreResult<usize> {
    let builder = open_builder(path)?;
    Ok(builder.metadata().file_metadata().num_rows().max(0) as usize)
}
