//! Fundamentals bucket: one `fundamentals_<statement>` table per endpoint.

use ql_common::partition::PERIOD_COLUMN;
use ql_common::{Endpoint, PeriodType, RowSet, Scalar};

use super::carries_failure;

const TAG_COLUMNS: [&str; 3] = ["ticker", "statement", PERIOD_COLUMN];

pub fn table_name(endpoint: Endpoint) -> String {
    format!("fundamentals_{}", endpoint.name().to_lowercase())
}

/// Tag one raw partition and null out the provider's `"None"` cells.
pub fn normalize(mut rows: RowSet, endpoint: Endpoint, ticker: &str, period: Option<PeriodType>) -> RowSet {
    let columns: Vec<String> = rows.columns().to_vec();
    for column in &columns {
        rows.map_column(column, |v| match v {
            Scalar::Text(s) if s == "None" => Scalar::Null,
            other => other.clone(),
        });
    }
    rows.set_constant("ticker", Scalar::from(ticker));
    rows.set_constant("statement", Scalar::from(endpoint.name()));
    if let Some(p) = period {
        rows.set_constant(PERIOD_COLUMN, Scalar::from(p.as_str()));
    }
    rows
}

/// Drop rows left without data, then coerce each fully numeric column.
///
/// `Information` goes too unless one of its cells reports a failed call;
/// those rows stay for failure triage.
pub fn finalize(rows: &mut RowSet) {
    if !carries_failure(rows, "Information") {
        rows.drop_column("Information");
    }
    let data: Vec<String> = rows
        .columns()
        .iter()
        .filter(|c| !TAG_COLUMNS.contains(&c.as_str()))
        .cloned()
        .collect();
    rows.retain_rows(|r| {
        data.iter()
            .any(|c| r.get(c).is_some_and(|v| !v.is_blank()))
    });
    for column in &data {
        rows.coerce_numeric_column(column);
    }
}
