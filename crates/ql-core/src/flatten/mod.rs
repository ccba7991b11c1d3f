//! Shape Classifier & Flattener.
//!
//! Turns heterogeneous provider payloads into canonical row sets. Flattening
//! never fails: anything that cannot be interpreted is kept as a single
//! `{text}` row so it can be triaged later.
//!
//! Dispatch is a closed [`PayloadShape`] decided by an ordered predicate list;
//! the first matching shape wins.

mod literal;
mod reports;

use serde_json::{Map, Value};

use ql_common::{normalize_field_name, parse_date, RowSet, Scalar};
use ql_store::parse_csv_text;

pub use literal::parse_literal;
pub use reports::flatten_reports;

/// Nesting bound for re-parsing text inside text.
const MAX_DEPTH: usize = 8;

const TEXT: &str = "text";
const VALUE: &str = "value";
const SYMBOL: &str = "symbol";

/// How a payload reached the flattener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlattenHint {
    /// Arbitrary content, classified by shape.
    Content,
    /// A map of labelled report lists (annual/quarterly).
    Reports,
    /// CSV text for one symbol.
    Tabular { symbol: String },
}

impl FlattenHint {
    pub fn tabular(symbol: impl Into<String>) -> Self {
        FlattenHint::Tabular {
            symbol: symbol.into(),
        }
    }
}

/// Recognised payload shapes, in classification order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// List whose first element is a map with a `text` field.
    TextBlocks,
    /// Any other list; elements are flattened independently.
    MapList,
    /// Map carrying a CSV `sample_data` preview.
    CsvPreview,
    /// Map with a `Time Series` or `Technical Analysis` key.
    TimeSeries,
    /// Map with a `Global Quote` key.
    GlobalQuote,
    /// Any other map.
    GenericMap,
    /// A string.
    Text,
    /// Number, bool or null.
    Scalar,
}

impl PayloadShape {
    pub fn classify(payload: &Value) -> Self {
        match payload {
            Value::Array(items) => {
                let tagged = items
                    .first()
                    .and_then(Value::as_object)
                    .is_some_and(|m| m.contains_key(TEXT));
                if tagged {
                    PayloadShape::TextBlocks
                } else {
                    PayloadShape::MapList
                }
            }
            Value::Object(map) => {
                if is_csv_preview(map) {
                    PayloadShape::CsvPreview
                } else if time_series_key(map).is_some() {
                    PayloadShape::TimeSeries
                } else if map.contains_key("Global Quote") {
                    PayloadShape::GlobalQuote
                } else {
                    PayloadShape::GenericMap
                }
            }
            Value::String(_) => PayloadShape::Text,
            _ => PayloadShape::Scalar,
        }
    }
}

/// Flatten a payload according to how it was fetched.
pub fn flatten(payload: &Value, hint: &FlattenHint) -> RowSet {
    match (hint, payload) {
        (FlattenHint::Content, _) => flatten_content(payload),
        (FlattenHint::Reports, _) => flatten_reports(payload),
        (FlattenHint::Tabular { symbol }, Value::String(text)) => flatten_tabular(text, symbol),
        (FlattenHint::Tabular { symbol }, other) => {
            let mut rows = flatten_content(other);
            tag_symbol(&mut rows, symbol);
            rows
        }
    }
}

/// Classify and flatten arbitrary content.
pub fn flatten_content(payload: &Value) -> RowSet {
    flatten_at(payload, 0)
}

/// Flatten CSV text for one symbol: normalized headers plus a `symbol`
/// column. Text that is not CSV (for example a JSON error body) goes through
/// the classifier instead.
pub fn flatten_tabular(text: &str, symbol: &str) -> RowSet {
    let trimmed = text.trim_start();
    let mut rows = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        match serde_json::from_str::<Value>(text) {
            Ok(v) => flatten_content(&v),
            Err(_) => tabular_or_text(text),
        }
    } else {
        tabular_or_text(text)
    };
    tag_symbol(&mut rows, symbol);
    rows
}

fn tabular_or_text(text: &str) -> RowSet {
    match parse_csv_text(text) {
        Some(mut rows) => {
            let names: Vec<String> = rows.columns().to_vec();
            for name in names {
                rows.rename_column(&name, &normalize_field_name(&name));
            }
            rows
        }
        None => flatten_content(&Value::String(text.to_string())),
    }
}

fn tag_symbol(rows: &mut RowSet, symbol: &str) {
    if !symbol.is_empty() && !rows.is_empty() {
        rows.set_constant(SYMBOL, Scalar::from(symbol));
    }
}

fn text_row(text: &str) -> RowSet {
    RowSet::single(TEXT, Scalar::from(text))
}

fn stringify(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn flatten_at(payload: &Value, depth: usize) -> RowSet {
    if depth > MAX_DEPTH {
        return text_row(&stringify(payload));
    }
    match PayloadShape::classify(payload) {
        PayloadShape::TextBlocks => flatten_text_blocks(payload, depth),
        PayloadShape::MapList => flatten_map_list(payload),
        PayloadShape::CsvPreview => flatten_csv_preview(payload),
        PayloadShape::TimeSeries => flatten_time_series(payload),
        PayloadShape::GlobalQuote => flatten_global_quote(payload),
        PayloadShape::GenericMap => flatten_generic_map(payload),
        PayloadShape::Text => flatten_text(payload.as_str().unwrap_or_default(), depth),
        PayloadShape::Scalar => RowSet::single(VALUE, Scalar::from_json(payload)),
    }
}

fn flatten_text_blocks(payload: &Value, depth: usize) -> RowSet {
    let text = payload
        .get(0)
        .and_then(|b| b.get(TEXT))
        .map(stringify)
        .unwrap_or_default();

    let rows = if let Some(v) = parse_literal(&text) {
        flatten_at(&v, depth + 1)
    } else if let Ok(v) = serde_json::from_str::<Value>(&text) {
        flatten_at(&v, depth + 1)
    } else if let Some(rows) = parse_csv_text(&text) {
        rows
    } else {
        text_row(&text)
    };

    // Double-encoded payloads: one more pass over a lone text cell.
    if let Some(inner) = rows.single_text() {
        let reparsed = parse_literal(inner).or_else(|| serde_json::from_str::<Value>(inner).ok());
        if let Some(v) = reparsed {
            if !v.is_string() || v.as_str() != Some(inner) {
                return flatten_at(&v, depth + 1);
            }
        }
    }
    rows
}

fn flatten_text(text: &str, depth: usize) -> RowSet {
    if let Ok(v) = serde_json::from_str::<Value>(text) {
        return flatten_at(&v, depth + 1);
    }
    if let Some(v) = parse_literal(text) {
        return flatten_at(&v, depth + 1);
    }
    if let Some(rows) = parse_csv_text(text) {
        return rows;
    }
    text_row(text)
}

/// Flatten each list element into its own row; the union of keys is the schema.
pub(crate) fn flatten_map_list(payload: &Value) -> RowSet {
    let mut rows = RowSet::new();
    if let Value::Array(items) = payload {
        for item in items {
            match item {
                Value::Object(map) => {
                    let mut entries = Vec::new();
                    flatten_dotted("", map, &mut entries);
                    rows.push(entries);
                }
                other => rows.push([(VALUE.to_string(), Scalar::from_json(other))]),
            }
        }
    }
    rows
}

pub(crate) fn flatten_generic_map(payload: &Value) -> RowSet {
    let mut rows = RowSet::new();
    if let Value::Object(map) = payload {
        let mut entries = Vec::new();
        flatten_dotted("", map, &mut entries);
        rows.push(entries);
    }
    rows
}

/// Dotted-path expansion of nested maps; lists are kept as JSON text.
pub(crate) fn flatten_dotted(prefix: &str, map: &Map<String, Value>, out: &mut Vec<(String, Scalar)>) {
    for (k, v) in map {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{}.{}", prefix, k)
        };
        match v {
            Value::Object(inner) => flatten_dotted(&key, inner, out),
            other => out.push((key, Scalar::from_json(other))),
        }
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn is_csv_preview(map: &Map<String, Value>) -> bool {
    map.get("preview").is_some_and(is_truthy)
        && map.get("data_type").and_then(Value::as_str) == Some("csv")
        && map.contains_key("sample_data")
}

fn flatten_csv_preview(payload: &Value) -> RowSet {
    let sample = payload.get("sample_data").map(stringify).unwrap_or_default();
    match parse_csv_text(&sample) {
        Some(mut rows) => {
            if let Some(symbol) = payload.get(SYMBOL) {
                rows.set_constant(SYMBOL, Scalar::from_json(symbol));
            }
            rows
        }
        None => text_row(&sample),
    }
}

fn time_series_key(map: &Map<String, Value>) -> Option<&String> {
    map.keys()
        .find(|k| k.contains("Time Series"))
        .or_else(|| map.keys().find(|k| k.contains("Technical Analysis")))
}

fn flatten_time_series(payload: &Value) -> RowSet {
    let Some(map) = payload.as_object() else {
        return RowSet::new();
    };
    let Some(series) = time_series_key(map).and_then(|k| map.get(k)).and_then(Value::as_object) else {
        return flatten_generic_map(payload);
    };
    let symbol = map.get("Meta Data").and_then(|meta| {
        ["2. Symbol", "1. Symbol"]
            .iter()
            .filter_map(|k| meta.get(*k))
            .find(|v| is_truthy(v))
            .cloned()
    });

    let mut rows = RowSet::new();
    for (stamp, fields) in series {
        let date = parse_date(stamp).map_or_else(|| Scalar::from(stamp.as_str()), Scalar::Date);
        let mut entries = vec![("date".to_string(), date)];
        match fields {
            Value::Object(f) => {
                for (k, v) in f {
                    entries.push((normalize_field_name(k), Scalar::from_json(v).coerce_numeric()));
                }
            }
            other => entries.push((VALUE.to_string(), Scalar::from_json(other).coerce_numeric())),
        }
        if let Some(s) = &symbol {
            entries.push((SYMBOL.to_string(), Scalar::from_json(s)));
        }
        rows.push(entries);
    }
    rows
}

fn flatten_global_quote(payload: &Value) -> RowSet {
    let Some(quote) = payload.get("Global Quote").and_then(Value::as_object) else {
        return flatten_generic_map(payload);
    };
    let mut entries: Vec<(String, Scalar)> = quote
        .iter()
        .map(|(k, v)| (normalize_field_name(k), Scalar::from_json(v)))
        .collect();
    if !entries.iter().any(|(k, _)| k == SYMBOL) {
        if let Some(s) = quote.get("01. symbol") {
            entries.push((SYMBOL.to_string(), Scalar::from_json(s)));
        }
    }
    let mut rows = RowSet::new();
    rows.push(entries);
    rows
}
