//! Company-overview bucket.

use ql_common::{RowSet, Scalar};

use super::carries_failure;

pub const TABLE: &str = "company_overview";

/// Columns the provider uses to report errors instead of data.
pub const ERROR_COLUMNS: [&str; 3] = ["Error Message", "Information", "Note"];

pub fn normalize(mut rows: RowSet, ticker: &str) -> RowSet {
    rows.set_constant("ticker", Scalar::from(ticker));
    rows
}

/// Drop error-named columns and columns empty for every ticker.
///
/// An error column that reports a failed call is kept so triage can find it.
pub fn finalize(rows: &mut RowSet) -> Vec<String> {
    let mut dropped: Vec<String> = ERROR_COLUMNS
        .iter()
        .filter(|c| !carries_failure(rows, c) && rows.drop_column(c))
        .map(|c| c.to_string())
        .collect();
    dropped.extend(rows.drop_blank_columns());
    dropped
}
