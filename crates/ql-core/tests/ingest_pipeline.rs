//! End-to-end ingestion against a scripted transport.

mod common;

use chrono::NaiveDate;
use serde_json::json;
use tempfile::TempDir;

use common::{Scripted, ScriptedTransport};
use ql_common::{Endpoint, PartitionKey, PartitionStatus, PeriodType, RowSet, Scalar, Subject};
use ql_config::EndpointPlan;
use ql_core::{IngestOptions, Orchestrator, Pacer, StaticConstituents, UnitState};
use ql_store::{read_parquet, DomainLayout, PartitionLock, PartitionWriter, RawLayout};

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn options(time_series: Vec<Endpoint>, fundamentals: Vec<Endpoint>, economic: Vec<Endpoint>) -> IngestOptions {
    IngestOptions {
        start: d("2024-01-01"),
        end: d("2024-12-31"),
        resume: true,
        fetch_factors: false,
        output_size: "full".to_string(),
        endpoints: EndpointPlan {
            time_series,
            fundamentals,
            economic,
        },
    }
}

struct Workspace {
    _dir: TempDir,
    raw: RawLayout,
    domain: DomainLayout,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let raw = RawLayout::new(dir.path().join("raw"));
        let domain = DomainLayout::new(dir.path().join("final"));
        Self {
            _dir: dir,
            raw,
            domain,
        }
    }

    fn writer(&self) -> PartitionWriter {
        PartitionWriter::new(self.raw.clone())
    }

    fn status(&self, endpoint: Endpoint, ticker: &str, period: Option<PeriodType>) -> PartitionStatus {
        self.writer()
            .status(&PartitionKey::new(endpoint, Subject::ticker(ticker), period))
    }
}

const DAILY_CSV: &str = "timestamp,open,high,low,close,volume\n\
2024-01-03,10,11,9,10.5,1000\n\
2024-01-02,9,10,8,9.5,900\n\
2023-12-29,8,9,7,8.5,800\n";

#[test]
fn test_resume_skips_populated_and_refetches_empty() {
    let ws = Workspace::new();
    let writer = ws.writer();
    writer
        .write(
            &RowSet::single("Name", Scalar::from("International Business Machines")),
            Endpoint::CompanyOverview,
            &Subject::ticker("IBM"),
        )
        .unwrap();
    writer
        .write(&RowSet::new(), Endpoint::CompanyOverview, &Subject::ticker("MSFT"))
        .unwrap();

    let transport = ScriptedTransport::new().on(
        "OVERVIEW",
        "MSFT",
        Scripted::Json(json!({"Symbol": "MSFT", "Name": "Microsoft"})),
    );
    let mut orch = Orchestrator::new(
        &transport,
        ws.writer(),
        ws.domain.clone(),
        Pacer::disabled(),
        options(vec![], vec![Endpoint::CompanyOverview], vec![]),
    );
    let report = orch.run(&["IBM".to_string(), "MSFT".to_string()]);

    assert_eq!(transport.calls(), vec!["OVERVIEW:MSFT".to_string()]);
    assert_eq!(report.summary.skipped, 1);
    assert_eq!(report.summary.written, 1);
    assert_eq!(report.outcomes[0].state, UnitState::Skipped);
    assert_eq!(ws.status(Endpoint::CompanyOverview, "MSFT", None), PartitionStatus::Populated);
}

#[test]
fn test_held_lock_wins_over_resume_check() {
    let ws = Workspace::new();
    ws.writer()
        .write(
            &RowSet::single("Name", Scalar::from("IBM")),
            Endpoint::CompanyOverview,
            &Subject::ticker("IBM"),
        )
        .unwrap();
    let held = PartitionLock::acquire(&ws.raw, Endpoint::CompanyOverview.name(), "IBM").unwrap();

    let transport = ScriptedTransport::new();
    let mut orch = Orchestrator::new(
        &transport,
        ws.writer(),
        ws.domain.clone(),
        Pacer::disabled(),
        options(vec![], vec![Endpoint::CompanyOverview], vec![]),
    );
    let report = orch.run(&["IBM".to_string()]);
    assert_eq!(report.outcomes[0].state, UnitState::Locked);
    assert_eq!(report.summary.locked, 1);

    drop(held);
    let report = orch.run(&["IBM".to_string()]);
    assert_eq!(report.outcomes[0].state, UnitState::Skipped);
    assert!(transport.calls().is_empty());
}

#[test]
fn test_no_resume_refetches_everything() {
    let ws = Workspace::new();
    ws.writer()
        .write(
            &RowSet::single("Name", Scalar::from("IBM")),
            Endpoint::CompanyOverview,
            &Subject::ticker("IBM"),
        )
        .unwrap();
    let transport = ScriptedTransport::new().on("OVERVIEW", "IBM", Scripted::Json(json!({"Symbol": "IBM"})));
    let mut opts = options(vec![], vec![Endpoint::CompanyOverview], vec![]);
    opts.resume = false;
    let mut orch = Orchestrator::new(&transport, ws.writer(), ws.domain.clone(), Pacer::disabled(), opts);
    let report = orch.run(&["IBM".to_string()]);
    assert_eq!(transport.calls().len(), 1);
    assert_eq!(report.summary.written, 1);
}

#[test]
fn test_period_split_and_failure_isolation() {
    let ws = Workspace::new();
    let transport = ScriptedTransport::new()
        .on(
            "INCOME_STATEMENT",
            "IBM",
            Scripted::Json(json!({
                "symbol": "IBM",
                "annualReports": [{"fiscalDateEnding": "2023-12-31", "totalRevenue": "100"}],
                "quarterlyReports": [
                    {"fiscalDateEnding": "2024-03-31", "totalRevenue": "30"},
                    {"fiscalDateEnding": "2023-12-31", "totalRevenue": "25"}
                ]
            })),
        )
        .on("INCOME_STATEMENT", "MSFT", Scripted::Status(503));

    let mut orch = Orchestrator::new(
        &transport,
        ws.writer(),
        ws.domain.clone(),
        Pacer::disabled(),
        options(vec![], vec![Endpoint::IncomeStatement], vec![]),
    );
    let report = orch.run(&["MSFT".to_string(), "IBM".to_string()]);

    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.written, 1);
    assert!(matches!(report.outcomes[0].state, UnitState::Failed { .. }));
    assert_eq!(
        report.outcomes[1].state,
        UnitState::Written {
            rows: 3,
            partitions: 2
        }
    );

    let writer = ws.writer();
    let annual = writer
        .read(&PartitionKey::new(
            Endpoint::IncomeStatement,
            Subject::ticker("IBM"),
            Some(PeriodType::Annual),
        ))
        .unwrap();
    assert_eq!(annual.len(), 1);
    assert!(!annual.has_column("period_type"));
    assert_eq!(
        ws.status(Endpoint::IncomeStatement, "IBM", Some(PeriodType::Quarterly)),
        PartitionStatus::Populated
    );
    assert_eq!(ws.status(Endpoint::IncomeStatement, "IBM", None), PartitionStatus::Absent);
    assert_eq!(ws.status(Endpoint::IncomeStatement, "MSFT", Some(PeriodType::Annual)), PartitionStatus::Absent);
}

#[test]
fn test_time_series_window_and_economic_global() {
    let ws = Workspace::new();
    let transport = ScriptedTransport::new()
        .on("TIME_SERIES_DAILY", "IBM", Scripted::Text(DAILY_CSV.to_string()))
        .on(
            "CPI",
            "",
            Scripted::Json(json!({
                "name": "Consumer Price Index",
                "data": [
                    {"date": "2024-02-01", "value": "310.3"},
                    {"date": "2024-01-01", "value": "309.7"}
                ]
            })),
        );
    let mut orch = Orchestrator::new(
        &transport,
        ws.writer(),
        ws.domain.clone(),
        Pacer::disabled(),
        options(vec![Endpoint::TimeSeriesDaily], vec![], vec![Endpoint::Cpi]),
    );
    let report = orch.run(&["IBM".to_string()]);
    assert_eq!(report.summary.written, 2);
    assert_eq!(transport.calls(), vec!["TIME_SERIES_DAILY:IBM".to_string(), "CPI:".to_string()]);

    let writer = ws.writer();
    let daily = writer
        .read(&PartitionKey::unqualified(Endpoint::TimeSeriesDaily, Subject::ticker("IBM")))
        .unwrap();
    assert_eq!(daily.len(), 2);

    let cpi = writer
        .read(&PartitionKey::unqualified(Endpoint::Cpi, Subject::Global))
        .unwrap();
    assert_eq!(cpi.len(), 2);
    assert!(ws.raw.root().join("CPI").join("global.parquet").exists());
}

#[test]
fn test_window_with_no_matching_rows_keeps_everything() {
    let ws = Workspace::new();
    let old = "timestamp,open,high,low,close,volume\n2020-01-03,10,11,9,10.5,1000\n";
    let transport = ScriptedTransport::new().on("TIME_SERIES_DAILY", "IBM", Scripted::Text(old.to_string()));
    let mut orch = Orchestrator::new(
        &transport,
        ws.writer(),
        ws.domain.clone(),
        Pacer::disabled(),
        options(vec![Endpoint::TimeSeriesDaily], vec![], vec![]),
    );
    orch.run(&["IBM".to_string()]);
    let daily = ws
        .writer()
        .read(&PartitionKey::unqualified(Endpoint::TimeSeriesDaily, Subject::ticker("IBM")))
        .unwrap();
    assert_eq!(daily.len(), 1);
}

#[test]
fn test_prepare_universe_writes_membership_files() {
    let ws = Workspace::new();
    let transport = ScriptedTransport::new();
    let orch = Orchestrator::new(
        &transport,
        ws.writer(),
        ws.domain.clone(),
        Pacer::disabled(),
        options(vec![], vec![], vec![]),
    );
    let source = StaticConstituents::new(["MSFT", "IBM", "IBM"]);
    let tickers = orch.prepare_universe(&source).unwrap();
    assert_eq!(tickers, vec!["IBM".to_string(), "MSFT".to_string()]);

    let unique = read_parquet(&ws.raw.unique_tickers_path()).unwrap();
    assert_eq!(unique.len(), 2);
    assert!(ws.raw.constituents_path().exists());
    assert!(transport.calls().is_empty());
}
