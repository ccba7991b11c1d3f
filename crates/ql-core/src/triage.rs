//! Failure Triage.
//!
//! Finds stored provider error payloads ("invalid api call" anywhere in a
//! row), exports them as a CSV worklist, and replays the worklist against the
//! transport to replace the offending partitions.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use ql_common::{
    Endpoint, EndpointKind, Error, PartitionKey, Result, Row, RowSet, Scalar, Subject,
    INVALID_API_CALL,
};
use ql_store::{
    read_csv, read_parquet, write_csv, write_parquet, DomainLayout, PartitionLock, PartitionWriter,
    RawLayout,
};

use crate::aggregate::overview;
use crate::ingest::fetch;
use crate::pacer::Pacer;
use crate::quality::TableSelector;
use crate::transport::{suggested_url, Transport, DEFAULT_QUERY_URL};

/// Worklist CSV columns, in order.
pub const WORKLIST_COLUMNS: [&str; 5] = ["ticker", "function", "api_url", "path", "error_sample"];

/// A (ticker, endpoint) pair whose stored payload is a provider error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub ticker: String,
    /// Endpoint name as used for raw partition directories.
    pub function: String,
    pub api_url: String,
    pub path: Option<String>,
    pub error_sample: Option<String>,
}

impl FailureRecord {
    fn new(ticker: &str, endpoint_name: &str, path: Option<String>, sample: Option<String>) -> Self {
        let provider_function = Endpoint::from_name_or_function(endpoint_name)
            .map(|e| e.function())
            .unwrap_or(endpoint_name);
        Self {
            ticker: ticker.to_string(),
            function: endpoint_name.to_string(),
            api_url: suggested_url(DEFAULT_QUERY_URL, provider_function, ticker),
            path,
            error_sample: sample,
        }
    }
}

/// The first cell of `row` that carries the provider's error marker.
pub fn failure_cell(row: &Row) -> Option<&Scalar> {
    row.values().find(|v| v.contains_ignore_case(INVALID_API_CALL))
}

/// Whether any cell of the row carries the provider's error marker.
pub fn row_is_failure(row: &Row) -> bool {
    failure_cell(row).is_some()
}

/// Scan every raw partition. A file is a failure when any cell matches.
pub fn scan_raw_tree(raw: &RawLayout) -> Result<Vec<FailureRecord>> {
    let mut records = Vec::new();
    for file in raw.walk_partitions()? {
        let rows = match read_parquet(&file.path) {
            Ok(rows) => rows,
            Err(e) => {
                debug!(path = %file.path.display(), error = %e, "unreadable partition; not scanned");
                continue;
            }
        };
        let sample = rows.rows().iter().find_map(failure_cell);
        if let Some(sample) = sample {
            records.push(FailureRecord::new(
                &file.subject,
                &file.endpoint_dir,
                Some(file.path.display().to_string()),
                Some(sample.to_string()),
            ));
        }
    }
    if records.is_empty() {
        info!(root = %raw.root().display(), "no failures found in raw data");
    } else {
        info!(failures = records.len(), "found failures in raw data");
    }
    Ok(records)
}

/// Scan one domain table row by row.
///
/// The ticker comes from `ticker` (or `symbol`); the endpoint from the
/// row's `statement`, else from the table name.
pub fn scan_table(table: &str, rows: &RowSet) -> Vec<FailureRecord> {
    let table_endpoint = endpoint_for_table(table);
    rows.rows()
        .iter()
        .filter_map(|row| {
            let sample = failure_cell(row)?;
            let ticker = ["ticker", "symbol"]
                .iter()
                .find_map(|c| row.get(*c).filter(|v| !v.is_blank()))
                .map(|v| v.to_string())
                .unwrap_or_default();
            let endpoint = row
                .get("statement")
                .filter(|v| !v.is_blank())
                .map(|v| v.to_string())
                .or_else(|| table_endpoint.map(|e| e.name().to_string()))
                .unwrap_or_else(|| table.to_string());
            Some(FailureRecord::new(&ticker, &endpoint, None, Some(sample.to_string())))
        })
        .collect()
}

fn endpoint_for_table(table: &str) -> Option<Endpoint> {
    if table == overview::TABLE {
        return Some(Endpoint::CompanyOverview);
    }
    table
        .strip_prefix("fundamentals_")
        .and_then(|s| s.parse().ok())
}

/// Write the worklist CSV. An empty worklist still gets its header.
pub fn write_worklist(path: &Path, records: &[FailureRecord]) -> Result<()> {
    let mut rows = RowSet::with_columns(WORKLIST_COLUMNS);
    for r in records {
        rows.push([
            ("ticker".to_string(), Scalar::from(r.ticker.as_str())),
            ("function".to_string(), Scalar::from(r.function.as_str())),
            ("api_url".to_string(), Scalar::from(r.api_url.as_str())),
            ("path".to_string(), r.path.clone().map_or(Scalar::Null, Scalar::from)),
            (
                "error_sample".to_string(),
                r.error_sample.clone().map_or(Scalar::Null, Scalar::from),
            ),
        ]);
    }
    write_csv(path, &rows)?;
    info!(path = %path.display(), failures = records.len(), "wrote failure worklist");
    Ok(())
}

/// Read a worklist CSV. Requires `function` and `ticker` (or `symbol`);
/// rows missing either are skipped.
pub fn read_worklist(path: &Path) -> Result<Vec<FailureRecord>> {
    if !path.exists() {
        return Err(Error::Worklist(format!("{} does not exist", path.display())));
    }
    let rows = read_csv(path)?;
    if !rows.has_column("function") || !(rows.has_column("ticker") || rows.has_column("symbol")) {
        return Err(Error::Worklist(format!(
            "{} needs `ticker` and `function` columns",
            path.display()
        )));
    }
    let text = |row: &Row, col: &str| {
        row.get(col)
            .filter(|v| !v.is_blank())
            .map(|v| v.to_string())
    };
    let mut records = Vec::new();
    for row in rows.rows() {
        let ticker = text(row, "ticker").or_else(|| text(row, "symbol"));
        let (Some(ticker), Some(function)) = (ticker, text(row, "function")) else {
            warn!(path = %path.display(), "worklist row without ticker or function; skipped");
            continue;
        };
        let mut record = FailureRecord::new(&ticker, &function, text(row, "path"), text(row, "error_sample"));
        if let Some(url) = text(row, "api_url") {
            record.api_url = url;
        }
        records.push(record);
    }
    Ok(records)
}

/// Counts from a replay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub attempted: usize,
    pub replaced: usize,
    pub failed: usize,
    pub stale_removed: usize,
}

/// Refetch every record and replace its partition(s).
///
/// For periodized endpoints the unqualified partition is deleted once the
/// period partitions were written, since it usually holds the original error
/// payload. A failing record is logged and counted; the rest still run.
pub fn replay(
    records: &[FailureRecord],
    transport: &dyn Transport,
    writer: &PartitionWriter,
    pacer: &mut Pacer,
    output_size: &str,
) -> ReplayReport {
    let mut report = ReplayReport::default();
    let total = records.len();
    for (i, record) in records.iter().enumerate() {
        report.attempted += 1;
        info!(
            endpoint = %record.function,
            ticker = %record.ticker,
            "[{}/{}] re-fetching",
            i + 1,
            total
        );
        match replay_one(record, transport, writer, pacer, output_size) {
            Ok(stale) => {
                report.replaced += 1;
                if stale {
                    report.stale_removed += 1;
                }
            }
            Err(e) => {
                error!(endpoint = %record.function, ticker = %record.ticker, error = %e, "re-fetch failed");
                report.failed += 1;
            }
        }
    }
    report
}

fn replay_one(
    record: &FailureRecord,
    transport: &dyn Transport,
    writer: &PartitionWriter,
    pacer: &mut Pacer,
    output_size: &str,
) -> Result<bool> {
    let endpoint = Endpoint::from_name_or_function(&record.function)
        .ok_or_else(|| Error::UnknownEndpoint(record.function.clone()))?;
    let subject = match endpoint.kind() {
        EndpointKind::Economic => Subject::Global,
        _ => Subject::ticker(record.ticker.as_str()),
    };
    let _lock = PartitionLock::acquire(writer.layout(), endpoint.name(), subject.stem())?;

    pacer.wait();
    let rows = fetch(transport, endpoint, &subject, output_size)?.flatten(&subject);
    let written = writer.write(&rows, endpoint, &subject)?;

    let wrote_periods = written.iter().any(|w| w.key.period.is_some());
    if endpoint.is_periodized() && wrote_periods {
        return Ok(writer.remove(&PartitionKey::unqualified(endpoint, subject))?);
    }
    Ok(false)
}

/// Remove failure rows from finished domain tables.
///
/// Returns removed-row counts for tables that changed.
pub fn purge_domain_tables(domain: &DomainLayout, selector: &TableSelector) -> Result<BTreeMap<String, usize>> {
    let mut removed = BTreeMap::new();
    for name in selector.resolve(domain)? {
        let path = domain.table_path(&name);
        if !path.exists() {
            warn!(table = %name, path = %path.display(), "domain table not found");
            continue;
        }
        let mut rows = read_parquet(&path)?;
        let before = rows.len();
        rows.retain_rows(|r| !row_is_failure(r));
        let count = before - rows.len();
        if count == 0 {
            continue;
        }
        write_parquet(&path, &rows)?;
        info!(table = %name, rows = count, "removed invalid-api-call rows");
        removed.insert(name, count);
    }
    if removed.is_empty() {
        info!("no invalid-api-call rows found in domain tables");
    }
    Ok(removed)
}
