//! Aggregation Engine.
//!
//! Walks the raw partition tree once and reshapes every partition into its
//! domain bucket, as given by the endpoint policy table. Domain tables are
//! fully rewritten on each run.

pub mod economic;
pub mod fundamentals;
pub mod overview;
pub mod price;
mod query;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

use ql_common::{Bucket, Endpoint, Result, RowSet, INVALID_API_CALL};
use ql_store::{read_parquet, write_parquet, DomainLayout, RawFile, RawLayout};

pub use query::{load_domain_table, DomainQuery};

pub const PRICE_DAILY: &str = "price_daily";
pub const PRICE_WEEKLY: &str = "price_weekly";

/// One written domain table.
#[derive(Debug, Clone, Serialize)]
pub struct TableOutput {
    pub name: String,
    pub path: PathBuf,
    pub rows: usize,
    /// Raw partitions that contributed rows.
    pub partitions: usize,
}

/// A raw partition left out of aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregationReport {
    pub tables: Vec<TableOutput>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Default)]
struct Accumulator {
    rows: RowSet,
    partitions: usize,
}

impl Accumulator {
    fn add(&mut self, rows: RowSet) {
        if rows.is_empty() {
            return;
        }
        self.rows.extend(rows);
        self.partitions += 1;
    }
}

/// Run the Aggregation Engine over `raw`, writing tables under `domain`.
///
/// Unreadable partitions are skipped with a warning. A bucket that received
/// no rows is not written.
pub fn aggregate(raw: &RawLayout, domain: &DomainLayout) -> Result<AggregationReport> {
    let mut report = AggregationReport::default();
    let mut buckets: BTreeMap<String, Accumulator> = BTreeMap::new();

    for file in raw.walk_partitions()? {
        let Some(endpoint) = Endpoint::from_name_or_function(&file.endpoint_dir) else {
            debug!(path = %file.path.display(), "no endpoint for directory; ignoring");
            continue;
        };
        let Some(bucket) = endpoint.bucket() else {
            debug!(endpoint = %endpoint, path = %file.path.display(), "endpoint has no domain table");
            continue;
        };
        let rows = match read_parquet(&file.path) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "skipping unreadable partition");
                report.skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if rows.is_empty() {
            continue;
        }
        let (table, normalized) = reshape(bucket, endpoint, &file, rows);
        buckets.entry(table).or_default().add(normalized);
    }

    for (name, mut acc) in buckets {
        if acc.rows.is_empty() {
            continue;
        }
        finalize(&name, &mut acc.rows);
        let path = domain.table_path(&name);
        let n = write_parquet(&path, &acc.rows)?;
        info!(table = %name, path = %path.display(), rows = n, partitions = acc.partitions, "wrote domain table");
        report.tables.push(TableOutput {
            name,
            path,
            rows: n,
            partitions: acc.partitions,
        });
    }
    Ok(report)
}

fn reshape(bucket: Bucket, endpoint: Endpoint, file: &RawFile, rows: RowSet) -> (String, RowSet) {
    let subject = file.subject.as_str();
    match bucket {
        Bucket::PriceDaily => (PRICE_DAILY.to_string(), price::normalize(rows, subject)),
        Bucket::PriceWeekly => (PRICE_WEEKLY.to_string(), price::normalize(rows, subject)),
        Bucket::Fundamentals => (
            fundamentals::table_name(endpoint),
            fundamentals::normalize(rows, endpoint, subject, file.period),
        ),
        Bucket::Economic => (
            economic::TABLE.to_string(),
            economic::normalize(rows, &file.endpoint_dir),
        ),
        Bucket::CompanyOverview => (overview::TABLE.to_string(), overview::normalize(rows, subject)),
    }
}

/// Whether any cell of `column` reports a failed provider call.
fn carries_failure(rows: &RowSet, column: &str) -> bool {
    rows.column_values(column)
        .any(|v| v.contains_ignore_case(INVALID_API_CALL))
}

fn finalize(table: &str, rows: &mut RowSet) {
    match table {
        PRICE_DAILY | PRICE_WEEKLY => {
            let dropped = price::finalize(rows);
            if dropped > 0 {
                debug!(table, rows = dropped, "dropped duplicate (ticker, date) rows");
            }
        }
        economic::TABLE => economic::finalize(rows),
        overview::TABLE => {
            let dropped = overview::finalize(rows);
            if !dropped.is_empty() {
                debug!(table, columns = ?dropped, "dropped error or empty columns");
            }
        }
        _ => fundamentals::finalize(rows),
    }
}
