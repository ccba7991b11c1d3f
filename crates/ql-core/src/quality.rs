//! Invariant Checker for finished domain tables.
//!
//! Checks never modify a table. Violations are reported for human review.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use ql_common::{Result, RowSet, Scalar};
use ql_store::{read_parquet, DomainLayout};

/// Which domain tables a command applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSelector {
    All,
    Named(String),
}

impl TableSelector {
    /// `"all"` (any case) selects every table.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("all") {
            TableSelector::All
        } else {
            TableSelector::Named(s.trim().to_string())
        }
    }

    pub fn resolve(&self, domain: &DomainLayout) -> Result<Vec<String>> {
        match self {
            TableSelector::All => Ok(domain.list_tables()?),
            TableSelector::Named(name) => Ok(vec![name.clone()]),
        }
    }
}

/// Findings for one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityReport {
    pub table: String,
    pub rows: usize,
    pub missing: Vec<String>,
    pub consistency: Vec<String>,
    pub bounds: Vec<String>,
    pub missing_detail: Vec<String>,
    pub rows_with_missing: usize,
    pub open_gt_high: usize,
    pub low_gt_close: usize,
    pub negative_volume: usize,
}

impl QualityReport {
    pub fn has_issues(&self) -> bool {
        !(self.missing.is_empty()
            && self.consistency.is_empty()
            && self.bounds.is_empty()
            && self.missing_detail.is_empty())
    }
}

const PRICE_QUAD: [&str; 4] = ["open", "high", "low", "close"];

fn greater(a: &Scalar, b: &Scalar) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x > y,
        _ => false,
    }
}

/// Check one table.
pub fn check_table(name: &str, rows: &RowSet, top_n: usize) -> QualityReport {
    let mut report = QualityReport {
        table: name.to_string(),
        rows: rows.len(),
        ..Default::default()
    };

    let columns = rows.columns();
    let rows_with_missing = rows
        .rows()
        .iter()
        .filter(|r| columns.iter().any(|c| r.get(c).map_or(true, Scalar::is_null)))
        .count();
    if rows_with_missing > 0 {
        report.rows_with_missing = rows_with_missing;
        report
            .missing
            .push(format!("Rows with any missing values: {}", rows_with_missing));
        report.missing_detail = missing_detail(rows, top_n);
    }

    if PRICE_QUAD.iter().all(|c| rows.has_column(c)) {
        let count = |a: &str, b: &str| {
            rows.rows()
                .iter()
                .filter(|r| match (r.get(a), r.get(b)) {
                    (Some(x), Some(y)) => greater(x, y),
                    _ => false,
                })
                .count()
        };
        report.open_gt_high = count("open", "high");
        report.low_gt_close = count("low", "close");
        if report.open_gt_high > 0 {
            report
                .consistency
                .push(format!("open>high rows: {}", report.open_gt_high));
        }
        if report.low_gt_close > 0 {
            report
                .consistency
                .push(format!("low>close rows: {}", report.low_gt_close));
        }
    }

    if rows.has_column("volume") {
        report.negative_volume = rows
            .column_values("volume")
            .filter(|v| v.as_f64().is_some_and(|x| x < 0.0))
            .count();
        if report.negative_volume > 0 {
            report.bounds.push(format!(
                "Negative volume values: {} rows",
                report.negative_volume
            ));
        }
    }

    report
}

/// `"<column>: <count> (<pct>%)"` for the `top_n` columns with most nulls.
fn missing_detail(rows: &RowSet, top_n: usize) -> Vec<String> {
    let total = rows.len();
    if total == 0 {
        return Vec::new();
    }
    let mut counts: Vec<(&str, usize)> = rows
        .columns()
        .iter()
        .map(|c| (c.as_str(), rows.column_values(c).filter(|v| v.is_null()).count()))
        .filter(|(_, n)| *n > 0)
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(top_n)
        .map(|(c, n)| format!("{}: {} ({:.3}%)", c, n, n as f64 / total as f64 * 100.0))
        .collect()
}

/// Check the selected tables under `domain`. Absent tables are warned about
/// and left out of the result.
pub fn run_quality_checks(
    domain: &DomainLayout,
    selector: &TableSelector,
    top_n: usize,
) -> Result<BTreeMap<String, QualityReport>> {
    let mut reports = BTreeMap::new();
    for name in selector.resolve(domain)? {
        let path = domain.table_path(&name);
        if !path.exists() {
            warn!(table = %name, path = %path.display(), "domain table not found");
            continue;
        }
        let rows = read_parquet(&path)?;
        let report = check_table(&name, &rows, top_n);
        if report.has_issues() {
            warn!(
                table = %name,
                missing = ?report.missing,
                consistency = ?report.consistency,
                bounds = ?report.bounds,
                "quality checks found issues"
            );
        } else {
            info!(table = %name, rows = report.rows, "quality checks passed");
        }
        reports.insert(name, report);
    }
    Ok(reports)
}
