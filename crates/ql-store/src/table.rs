//! Conversion between row sets and Arrow record batches.
//!
//! Column types are inferred from the cells: a column is typed only when every
//! non-null cell agrees (integers widen to floats); anything mixed is stored
//! as UTF-8 text. Cell types in a mixed column are not preserved: an
//! `Int(5)` next to text reads back as `Text("5")`. Callers that need numbers
//! coerce per column (`RowSet::coerce_numeric_column`).

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Date32Type, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;

use ql_common::{RowSet, Scalar};

/// Placeholder column that lets a zero-column row set round-trip.
pub const EMPTY_SENTINEL: &str = "_empty";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Bool,
    Int,
    Float,
    Date,
    Text,
}

impl ColumnType {
    fn data_type(self) -> DataType {
        match self {
            ColumnType::Bool => DataType::Boolean,
            ColumnType::Int => DataType::Int64,
            ColumnType::Float => DataType::Float64,
            ColumnType::Date => DataType::Date32,
            ColumnType::Text => DataType::Utf8,
        }
    }
}

fn infer_column(set: &RowSet, column: &str) -> ColumnType {
    let mut seen: Option<ColumnType> = None;
    for v in set.column_values(column) {
        let t = match v {
            Scalar::Null => continue,
            Scalar::Float(f) if f.is_nan() => continue,
            Scalar::Bool(_) => ColumnType::Bool,
            Scalar::Int(_) => ColumnType::Int,
            Scalar::Float(_) => ColumnType::Float,
            Scalar::Date(_) => ColumnType::Date,
            Scalar::Text(_) => return ColumnType::Text,
        };
        seen = Some(match (seen, t) {
            (None, t) => t,
            (Some(a), b) if a == b => a,
            (Some(ColumnType::Int), ColumnType::Float) | (Some(ColumnType::Float), ColumnType::Int) => {
                ColumnType::Float
            }
            _ => return ColumnType::Text,
        });
    }
    seen.unwrap_or(ColumnType::Text)
}

fn build_array(set: &RowSet, column: &str, ty: ColumnType) -> ArrayRef {
    let values = set.column_values(column);
    match ty {
        ColumnType::Bool => Arc::new(BooleanArray::from(
            values
                .map(|v| match v {
                    Scalar::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnType::Int => Arc::new(Int64Array::from(
            values
                .map(|v| match v {
                    Scalar::Int(i) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnType::Float => Arc::new(Float64Array::from(
            values
                .map(|v| match v {
                    Scalar::Int(i) => Some(*i as f64),
                    Scalar::Float(f) if !f.is_nan() => Some(*f),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnType::Date => Arc::new(Date32Array::from(
            values
                .map(|v| match v {
                    Scalar::Date(d) => Some(Date32Type::from_naive_date(*d)),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnType::Text => Arc::new(StringArray::from(
            values
                .map(|v| if v.is_null() { None } else { Some(v.to_string()) })
                .collect::<Vec<_>>(),
        )),
    }
}

/// Convert a row set into one record batch.
pub fn to_record_batch(set: &RowSet) -> Result<RecordBatch, ArrowError> {
    if set.columns().is_empty() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            EMPTY_SENTINEL,
            DataType::Utf8,
            true,
        )]));
        let column: ArrayRef = Arc::new(StringArray::from(vec![None::<String>; set.len()]));
        return RecordBatch::try_new(schema, vec![column]);
    }

    let mut fields = Vec::with_capacity(set.columns().len());
    let mut arrays = Vec::with_capacity(set.columns().len());
    for column in set.columns() {
        let ty = infer_column(set, column);
        fields.push(Field::new(column, ty.data_type(), true));
        arrays.push(build_array(set, column, ty));
    }
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
}

/// Column names of a schema, minus the empty sentinel.
pub fn schema_columns(schema: &SchemaRef) -> Vec<String> {
    schema
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .filter(|n| n != EMPTY_SENTINEL)
        .collect()
}

/// Rebuild a row set from batches sharing `schema`.
pub fn from_record_batches(schema: &SchemaRef, batches: &[RecordBatch]) -> Result<RowSet, ArrowError> {
    let mut set = RowSet::with_columns(schema_columns(schema));
    for batch in batches {
        let mut columns: Vec<(String, Vec<Scalar>)> = Vec::new();
        for (field, array) in batch.schema().fields().iter().zip(batch.columns()) {
            if field.name() == EMPTY_SENTINEL {
                continue;
            }
            columns.push((field.name().clone(), column_scalars(array)?));
        }
        for row in 0..batch.num_rows() {
            set.push(
                columns
                    .iter()
                    .map(|(name, cells)| (name.clone(), cells[row].clone())),
            );
        }
    }
    Ok(set)
}

fn column_scalars(array: &ArrayRef) -> Result<Vec<Scalar>, ArrowError> {
    let len = array.len();
    match array.data_type() {
        DataType::Null => Ok(vec![Scalar::Null; len]),
        DataType::Utf8 => {
            let a = downcast::<StringArray>(array)?;
            Ok((0..len)
                .map(|i| {
                    if a.is_null(i) {
                        Scalar::Null
                    } else {
                        Scalar::Text(a.value(i).to_string())
                    }
                })
                .collect())
        }
        DataType::LargeUtf8 | DataType::Utf8View => column_scalars(&cast(array, &DataType::Utf8)?),
        DataType::Boolean => {
            let a = downcast::<BooleanArray>(array)?;
            Ok((0..len)
                .map(|i| if a.is_null(i) { Scalar::Null } else { Scalar::Bool(a.value(i)) })
                .collect())
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => {
            let casted = cast(array, &DataType::Int64)?;
            let a = downcast::<Int64Array>(&casted)?;
            Ok((0..len)
                .map(|i| if a.is_null(i) { Scalar::Null } else { Scalar::Int(a.value(i)) })
                .collect())
        }
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => {
            let casted = cast(array, &DataType::Float64)?;
            let a = downcast::<Float64Array>(&casted)?;
            Ok((0..len)
                .map(|i| if a.is_null(i) { Scalar::Null } else { Scalar::Float(a.value(i)) })
                .collect())
        }
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
            let casted = cast(array, &DataType::Date32)?;
            let a = downcast::<Date32Array>(&casted)?;
            Ok((0..len)
                .map(|i| {
                    if a.is_null(i) {
                        Scalar::Null
                    } else {
                        a.value_as_date(i).map_or(Scalar::Null, Scalar::Date)
                    }
                })
                .collect())
        }
        _ => (0..len)
            .map(|i| {
                if array.is_null(i) {
                    Ok(Scalar::Null)
                } else {
                    array_value_to_string(array.as_ref(), i).map(Scalar::Text)
                }
            })
            .collect(),
    }
}

fn downcast<T: 'static>(array: &ArrayRef) -> Result<&T, ArrowError> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        ArrowError::CastError(format!("unexpected array type {}", array.data_type()))
    })
}
