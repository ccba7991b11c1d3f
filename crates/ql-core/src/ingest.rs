//! Ingestion Orchestrator.
//!
//! Drives every `(endpoint, subject)` unit through fetch, flatten and write.
//! Each unit runs its own small state machine; a failed unit is logged and
//! abandoned without stopping the run.

use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use ql_common::{Endpoint, EndpointKind, Result, RowSet, Scalar, Subject};
use ql_config::{EndpointPlan, PipelineConfig};
use ql_store::{write_parquet, DomainLayout, PartitionLock, PartitionWriter, StoreError};

use crate::constituents::{clean_tickers, unique_tickers, ConstituentSource};
use crate::flatten::{flatten, flatten_reports, FlattenHint};
use crate::pacer::Pacer;
use crate::transport::{Transport, TransportError};

/// Candidate date columns, in lookup order.
pub const DATE_COLUMNS: [&str; 3] = ["date", "timestamp", "datetime"];

/// Lifecycle of one `(endpoint, subject)` unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnitState {
    Pending,
    /// Resume found the partition(s) already populated.
    Skipped,
    Fetching,
    Flattening,
    Written { rows: usize, partitions: usize },
    Failed { reason: String },
    /// Another run holds the unit's lock.
    Locked,
}

impl UnitState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UnitState::Skipped | UnitState::Written { .. } | UnitState::Failed { .. } | UnitState::Locked
        )
    }

    pub fn can_transition_to(&self, next: &UnitState) -> bool {
        use UnitState::*;
        matches!(
            (self, next),
            (Pending, Skipped)
                | (Pending, Locked)
                | (Pending, Fetching)
                | (Pending, Failed { .. })
                | (Fetching, Flattening)
                | (Fetching, Failed { .. })
                | (Flattening, Written { .. })
                | (Flattening, Failed { .. })
        )
    }
}

/// Final state and timing of one unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub endpoint: Endpoint,
    pub subject: String,
    #[serde(flatten)]
    pub state: UnitState,
    pub time_ms: u128,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub units: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    pub locked: usize,
}

/// Result of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub tickers: usize,
    pub summary: IngestSummary,
    pub outcomes: Vec<UnitOutcome>,
}

impl IngestReport {
    fn new(tickers: usize) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            tickers,
            summary: IngestSummary::default(),
            outcomes: Vec::new(),
        }
    }

    fn record(&mut self, outcome: UnitOutcome) {
        self.summary.units += 1;
        match outcome.state {
            UnitState::Written { .. } => self.summary.written += 1,
            UnitState::Skipped => self.summary.skipped += 1,
            UnitState::Locked => self.summary.locked += 1,
            UnitState::Failed { .. } => self.summary.failed += 1,
            _ => {}
        }
        self.outcomes.push(outcome);
    }
}

/// Run parameters derived from the configuration.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub resume: bool,
    pub fetch_factors: bool,
    pub output_size: String,
    pub endpoints: EndpointPlan,
}

impl IngestOptions {
    /// Fails when the window is unset or inverted, or an endpoint list is invalid.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let (start, end) = config.window.bounds()?;
        Ok(Self {
            start,
            end,
            resume: config.ingest.resume,
            fetch_factors: config.ingest.fetch_factors,
            output_size: config.provider.output_size.clone(),
            endpoints: config.endpoints.plan()?,
        })
    }
}

/// Outcome of the date-window filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFilter {
    NoDateColumn,
    Filtered { kept: usize, dropped: usize },
    /// Every row fell outside the window; the set was left unfiltered.
    KeptUnfiltered,
}

/// Restrict rows to `[start, end]` by the first present date column.
///
/// The column is converted to dates first. When no row would survive, the
/// unfiltered set is kept.
pub fn filter_window(rows: &mut RowSet, start: NaiveDate, end: NaiveDate) -> WindowFilter {
    let Some(column) = DATE_COLUMNS.iter().copied().find(|c| rows.has_column(c)) else {
        return WindowFilter::NoDateColumn;
    };
    rows.map_column(column, |v| v.as_date().map_or_else(|| v.clone(), Scalar::Date));

    let in_window = |r: &ql_common::Row| {
        r.get(column)
            .and_then(Scalar::as_date)
            .is_some_and(|d| d >= start && d <= end)
    };
    let kept = rows.rows().iter().filter(|r| in_window(*r)).count();
    if kept == 0 {
        return WindowFilter::KeptUnfiltered;
    }
    let dropped = rows.len() - kept;
    rows.retain_rows(in_window);
    WindowFilter::Filtered { kept, dropped }
}

/// Sequential ingestion over the raw partition tree.
pub struct Orchestrator<'a> {
    transport: &'a dyn Transport,
    writer: PartitionWriter,
    domain: DomainLayout,
    pacer: Pacer,
    options: IngestOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        writer: PartitionWriter,
        domain: DomainLayout,
        pacer: Pacer,
        options: IngestOptions,
    ) -> Self {
        Self {
            transport,
            writer,
            domain,
            pacer,
            options,
        }
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Resolve the ticker universe and persist the membership files.
    ///
    /// Membership rows go to the raw root under the reserved prefix. Factor
    /// series are written to the final directory when requested; failing to
    /// obtain them is only a warning.
    pub fn prepare_universe(&self, source: &dyn ConstituentSource) -> Result<Vec<String>> {
        let (start, end) = (self.options.start, self.options.end);
        let mut constituents = source.list_constituents(start, end)?;
        let dropped = clean_tickers(&mut constituents);
        if dropped > 0 {
            info!(rows = dropped, "dropped membership rows without a usable ticker");
        }

        let layout = self.writer.layout();
        let path = layout.constituents_path();
        let n = write_parquet(&path, &constituents)?;
        info!(path = %path.display(), rows = n, "wrote constituents");

        let tickers = unique_tickers(&constituents);
        let mut ticker_rows = RowSet::with_columns(["ticker"]);
        for t in &tickers {
            ticker_rows.push([("ticker".to_string(), Scalar::from(t.as_str()))]);
        }
        let path = layout.unique_tickers_path();
        write_parquet(&path, &ticker_rows)?;
        info!(path = %path.display(), tickers = tickers.len(), "wrote unique tickers");

        if self.options.fetch_factors {
            self.fetch_factors(source);
        }
        Ok(tickers)
    }

    fn fetch_factors(&self, source: &dyn ConstituentSource) {
        let path = self.domain.factors_path();
        let written = source
            .list_factor_series(self.options.start, self.options.end)
            .and_then(|rows| write_parquet(&path, &rows).map_err(Into::into));
        match written {
            Ok(n) => info!(path = %path.display(), rows = n, "wrote factor series"),
            Err(e) => warn!(error = %e, "failed to fetch factor series"),
        }
    }

    /// Per ticker: time-series then fundamentals endpoints. Then every
    /// economic endpoint into its global partition.
    pub fn run(&mut self, tickers: &[String]) -> IngestReport {
        let mut report = IngestReport::new(tickers.len());
        info!(
            run_id = %report.run_id,
            tickers = tickers.len(),
            start = %self.options.start,
            end = %self.options.end,
            "ingestion started"
        );

        let per_ticker: Vec<Endpoint> = self
            .options
            .endpoints
            .time_series
            .iter()
            .chain(&self.options.endpoints.fundamentals)
            .copied()
            .collect();
        for ticker in tickers {
            for endpoint in &per_ticker {
                let outcome = self.run_unit(*endpoint, Subject::ticker(ticker.as_str()));
                report.record(outcome);
            }
        }
        let economic = self.options.endpoints.economic.clone();
        for endpoint in economic {
            let outcome = self.run_unit(endpoint, Subject::Global);
            report.record(outcome);
        }

        let s = &report.summary;
        info!(
            run_id = %report.run_id,
            units = s.units,
            written = s.written,
            skipped = s.skipped,
            failed = s.failed,
            locked = s.locked,
            "ingestion finished"
        );
        report
    }

    /// Run one unit to a terminal state.
    pub fn run_unit(&mut self, endpoint: Endpoint, subject: Subject) -> UnitOutcome {
        let started = Instant::now();
        let mut unit = Unit::new(endpoint, &subject);
        self.drive(&mut unit, &subject);
        UnitOutcome {
            endpoint,
            subject: subject.to_string(),
            state: unit.state,
            time_ms: started.elapsed().as_millis(),
        }
    }

    fn drive(&mut self, unit: &mut Unit, subject: &Subject) {
        let endpoint = unit.endpoint;
        let _lock = match PartitionLock::acquire(self.writer.layout(), endpoint.name(), subject.stem()) {
            Ok(lock) => lock,
            Err(StoreError::LockHeld { path }) => {
                warn!(endpoint = %endpoint, ticker = %subject, path = %path.display(), "unit locked by another run");
                unit.advance(UnitState::Locked);
                return;
            }
            Err(e) => {
                error!(endpoint = %endpoint, ticker = %subject, error = %e, "cannot lock unit");
                unit.advance(UnitState::Failed {
                    reason: e.to_string(),
                });
                return;
            }
        };

        if self.options.resume && self.writer.exists_and_nonempty(endpoint, subject) {
            info!(endpoint = %endpoint, ticker = %subject, "skipping; partition already populated");
            unit.advance(UnitState::Skipped);
            return;
        }

        unit.advance(UnitState::Fetching);
        self.pacer.wait();
        let fetched = fetch(self.transport, endpoint, subject, &self.options.output_size);
        let fetched = match fetched {
            Ok(f) => f,
            Err(e) => {
                error!(endpoint = %endpoint, ticker = %subject, error = %e, "fetch failed");
                unit.advance(UnitState::Failed {
                    reason: e.to_string(),
                });
                return;
            }
        };

        unit.advance(UnitState::Flattening);
        let mut rows = fetched.flatten(subject);
        if filter_window(&mut rows, self.options.start, self.options.end) == WindowFilter::KeptUnfiltered {
            warn!(
                endpoint = %endpoint,
                ticker = %subject,
                rows = rows.len(),
                "no rows inside the date window; keeping unfiltered rows"
            );
        }

        match self.writer.write(&rows, endpoint, subject) {
            Ok(written) => {
                let total = written.iter().map(|w| w.rows).sum();
                unit.advance(UnitState::Written {
                    rows: total,
                    partitions: written.len(),
                });
            }
            Err(e) => {
                error!(endpoint = %endpoint, ticker = %subject, error = %e, "write failed");
                unit.advance(UnitState::Failed {
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// A raw provider response, before flattening.
pub(crate) enum Fetched {
    Tabular(String),
    Structured(Value),
}

impl Fetched {
    /// Tabular text goes through the tabular flattener, structured payloads
    /// through report-list flattening.
    pub(crate) fn flatten(self, subject: &Subject) -> RowSet {
        match self {
            Fetched::Tabular(text) => flatten(
                &Value::String(text),
                &FlattenHint::tabular(subject.as_ticker().unwrap_or_default()),
            ),
            Fetched::Structured(payload) => flatten_reports(&payload),
        }
    }
}

/// Issue the provider call for one unit, as the policy table prescribes.
pub(crate) fn fetch(
    transport: &dyn Transport,
    endpoint: Endpoint,
    subject: &Subject,
    output_size: &str,
) -> std::result::Result<Fetched, TransportError> {
    match endpoint.kind() {
        EndpointKind::TimeSeries => transport
            .fetch_tabular(
                endpoint.function(),
                subject.as_ticker().unwrap_or_default(),
                output_size,
            )
            .map(Fetched::Tabular),
        EndpointKind::Fundamentals | EndpointKind::Economic => transport
            .fetch_structured(endpoint.function(), &endpoint.call_params(subject.as_ticker()))
            .map(Fetched::Structured),
    }
}

struct Unit {
    endpoint: Endpoint,
    subject: String,
    state: UnitState,
}

impl Unit {
    fn new(endpoint: Endpoint, subject: &Subject) -> Self {
        Self {
            endpoint,
            subject: subject.to_string(),
            state: UnitState::Pending,
        }
    }

    fn advance(&mut self, next: UnitState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "illegal unit transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(endpoint = %self.endpoint, ticker = %self.subject, from = ?self.state, to = ?next, "unit transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dated(dates: &[&str]) -> RowSet {
        let mut rows = RowSet::new();
        for (i, date) in dates.iter().enumerate() {
            rows.push([
                ("timestamp".to_string(), Scalar::from(*date)),
                ("close".to_string(), Scalar::Int(i as i64)),
            ]);
        }
        rows
    }

    #[test]
    fn test_filter_window_keeps_inside_rows() {
        let mut rows = dated(&["2023-12-29", "2024-01-02", "2024-01-03", "2024-02-01"]);
        let outcome = filter_window(&mut rows, d("2024-01-01"), d("2024-01-31"));
        assert_eq!(outcome, WindowFilter::Filtered { kept: 2, dropped: 2 });
        assert_eq!(rows.get(0, "timestamp"), &Scalar::Date(d("2024-01-02")));
    }

    #[test]
    fn test_filter_window_keeps_everything_when_nothing_matches() {
        let mut rows = dated(&["2030-01-01", "2030-01-02"]);
        let outcome = filter_window(&mut rows, d("2024-01-01"), d("2024-01-31"));
        assert_eq!(outcome, WindowFilter::KeptUnfiltered);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.get(1, "timestamp"), &Scalar::Date(d("2030-01-02")));
    }

    #[test]
    fn test_filter_window_prefers_date_column() {
        let mut rows = RowSet::new();
        rows.push([
            ("date".to_string(), Scalar::from("2024-01-05")),
            ("timestamp".to_string(), Scalar::from("1999-01-01")),
        ]);
        rows.push([
            ("date".to_string(), Scalar::from("2020-01-05")),
            ("timestamp".to_string(), Scalar::from("2024-01-05")),
        ]);
        filter_window(&mut rows, d("2024-01-01"), d("2024-01-31"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.get(0, "timestamp"), &Scalar::from("1999-01-01"));
    }

    #[test]
    fn test_filter_window_without_date_column() {
        let mut rows = RowSet::single("symbol", Scalar::from("IBM"));
        assert_eq!(
            filter_window(&mut rows, d("2024-01-01"), d("2024-01-31")),
            WindowFilter::NoDateColumn
        );
    }

    #[test]
    fn test_state_machine_edges() {
        assert!(UnitState::Pending.can_transition_to(&UnitState::Skipped));
        assert!(UnitState::Pending.can_transition_to(&UnitState::Fetching));
        assert!(UnitState::Fetching.can_transition_to(&UnitState::Failed { reason: "x".into() }));
        assert!(UnitState::Flattening.can_transition_to(&UnitState::Written { rows: 1, partitions: 1 }));
        assert!(!UnitState::Fetching.can_transition_to(&UnitState::Written { rows: 1, partitions: 1 }));
        assert!(!UnitState::Skipped.can_transition_to(&UnitState::Fetching));
        assert!(UnitState::Locked.is_terminal());
        assert!(!UnitState::Flattening.is_terminal());
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let outcome = UnitOutcome {
            endpoint: Endpoint::Cpi,
            subject: "global".into(),
            state: UnitState::Written { rows: 3, partitions: 1 },
            time_ms: 5,
        };
        let v = serde_json::to_value(&outcome).unwrap();
        assert_eq!(v["endpoint"], "CPI");
        assert_eq!(v["state"], "written");
        assert_eq!(v["rows"], 3);
    }
}
