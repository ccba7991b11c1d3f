//! Constituent-membership source.

use chrono::NaiveDate;

use ql_common::{Error, Result, RowSet, Scalar};

/// Research-database access: index membership and factor series.
pub trait ConstituentSource {
    /// Daily membership rows `{date, ticker, permno}` within the window.
    fn list_constituents(&self, start: NaiveDate, end: NaiveDate) -> Result<RowSet>;

    /// Factor series rows `{date, ...factor columns}` within the window.
    fn list_factor_series(&self, start: NaiveDate, end: NaiveDate) -> Result<RowSet>;
}

/// A fixed ticker list standing in for the membership database.
///
/// Every ticker is a member on every day of the window and is its own
/// `permno`. No factor series is available.
#[derive(Debug, Clone)]
pub struct StaticConstituents {
    tickers: Vec<String>,
}

impl StaticConstituents {
    /// Tickers are sorted and deduplicated.
    pub fn new<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tickers: Vec<String> = tickers.into_iter().map(Into::into).collect();
        tickers.sort();
        tickers.dedup();
        Self { tickers }
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }
}

impl ConstituentSource for StaticConstituents {
    fn list_constituents(&self, start: NaiveDate, end: NaiveDate) -> Result<RowSet> {
        let mut rows = RowSet::with_columns(["date", "ticker", "permno"]);
        for day in start.iter_days().take_while(|d| *d <= end) {
            for t in &self.tickers {
                rows.push([
                    ("date".to_string(), Scalar::Date(day)),
                    ("ticker".to_string(), Scalar::from(t.as_str())),
                    ("permno".to_string(), Scalar::from(t.as_str())),
                ]);
            }
        }
        Ok(rows)
    }

    fn list_factor_series(&self, _start: NaiveDate, _end: NaiveDate) -> Result<RowSet> {
        Err(Error::Constituents(
            "factor series are not available from a static ticker list".to_string(),
        ))
    }
}

/// Trim ticker cells and drop placeholder values (`<NA>`, `nan`, `none`, blank).
///
/// Returns how many rows were removed.
pub fn clean_tickers(rows: &mut RowSet) -> usize {
    rows.map_column("ticker", |v| match v {
        Scalar::Text(s) => Scalar::Text(s.trim().to_string()),
        Scalar::Null => Scalar::Null,
        other => Scalar::Text(other.to_string()),
    });
    let before = rows.len();
    rows.retain_rows(|r| match r.get("ticker") {
        Some(Scalar::Text(t)) => !matches!(t.to_lowercase().as_str(), "<na>" | "nan" | "none" | ""),
        _ => false,
    });
    before - rows.len()
}

/// Sorted unique tickers of a membership row set.
pub fn unique_tickers(rows: &RowSet) -> Vec<String> {
    let mut out: Vec<String> = rows
        .column_values("ticker")
        .filter_map(Scalar::as_str)
        .map(str::to_string)
        .collect();
    out.sort();
    out.dedup();
    out
}
