//! CSV text and files through the Arrow CSV codec.
//!
//! Every column is read as text; callers decide whether cells become numbers.

use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, StringArray};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;

use ql_common::{RowSet, Scalar};

use crate::error::{StoreError, StoreResult};
use crate::table::to_record_batch;

/// How cells are turned into scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMode {
    /// Numeric-looking cells become numbers.
    Infer,
    /// Cells stay text.
    Text,
}

/// Parse CSV text with a header row. Empty cells become null.
pub fn parse_csv(text: &str, mode: CellMode) -> Result<RowSet, ArrowError> {
    let format = Format::default().with_header(true);
    let (inferred, _) = format.infer_schema(Cursor::new(text.as_bytes()), None)?;
    let names: Vec<String> = inferred.fields().iter().map(|f| f.name().clone()).collect();
    if names.is_empty() {
        return Ok(RowSet::new());
    }
    let schema = Arc::new(Schema::new(
        names
            .iter()
            .map(|n| Field::new(n, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));
    let reader = ReaderBuilder::new(schema)
        .with_header(true)
        .build(Cursor::new(text.as_bytes()))?;

    let mut set = RowSet::with_columns(names.iter().cloned());
    for batch in reader {
        let batch = batch?;
        let columns: Vec<&StringArray> = batch
            .columns()
            .iter()
            .map(|c| {
                c.as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| ArrowError::CastError("expected utf8 column".to_string()))
            })
            .collect::<Result<_, _>>()?;
        for row in 0..batch.num_rows() {
            set.push(names.iter().zip(&columns).map(|(name, col)| {
                let cell = if col.is_null(row) || col.value(row).is_empty() {
                    Scalar::Null
                } else {
                    match mode {
                        CellMode::Infer => Scalar::infer_from_str(col.value(row)),
                        CellMode::Text => Scalar::Text(col.value(row).to_string()),
                    }
                };
                (name.clone(), cell)
            }));
        }
    }
    Ok(set)
}

/// Parse provider CSV text. Only a header with at least one field followed
/// by at least one data row counts as CSV.
pub fn parse_csv_text(text: &str) -> Option<RowSet> {
    let set = parse_csv(text, CellMode::Infer).ok()?;
    if set.columns().is_empty() || set.is_empty() {
        return None;
    }
    Some(set)
}

/// Write a row set as CSV with a header, replacing any existing file.
pub fn write_csv(path: &Path, rows: &RowSet) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let mut file = File::create(path).map_err(|e| StoreError::io(path, e))?;
    if rows.is_empty() {
        // The Arrow writer emits the header only alongside a batch.
        let header = rows.columns().join(",");
        return writeln!(file, "{}", header).map_err(|e| StoreError::io(path, e));
    }
    let batch = to_record_batch(rows)?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(&batch).map_err(|source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a CSV file, keeping every cell as text.
pub fn read_csv(path: &Path) -> StoreResult<RowSet> {
    let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    parse_csv(&text, CellMode::Text).map_err(|source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    })
}
