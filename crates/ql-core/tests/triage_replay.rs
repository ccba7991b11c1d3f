//! Failure detection, worklist export and replay over a real raw tree.

mod common;

use chrono::NaiveDate;
use serde_json::json;
use tempfile::TempDir;

use common::{Scripted, ScriptedTransport};
use ql_common::{Endpoint, PartitionKey, PartitionStatus, PeriodType, RowSet, Scalar, Subject};
use ql_config::EndpointPlan;
use ql_core::triage::{purge_domain_tables, read_worklist, replay, scan_raw_tree, scan_table, write_worklist};
use ql_core::{aggregate, IngestOptions, Orchestrator, Pacer, TableSelector};
use ql_store::{read_parquet, write_parquet, DomainLayout, PartitionWriter, RawLayout};

const INVALID: &str = "Invalid API call. Please retry or visit the documentation for OVERVIEW.";

fn ingest(raw: &RawLayout, domain: &DomainLayout, transport: &ScriptedTransport, fundamentals: Vec<Endpoint>, tickers: &[&str]) {
    let options = IngestOptions {
        start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        resume: true,
        fetch_factors: false,
        output_size: "compact".to_string(),
        endpoints: EndpointPlan {
            time_series: vec![],
            fundamentals,
            economic: vec![],
        },
    };
    let mut orch = Orchestrator::new(
        transport,
        PartitionWriter::new(raw.clone()),
        domain.clone(),
        Pacer::disabled(),
        options,
    );
    let tickers: Vec<String> = tickers.iter().map(|t| t.to_string()).collect();
    orch.run(&tickers);
}

#[test]
fn test_error_payloads_are_stored_found_and_replaced() {
    let dir = TempDir::new().unwrap();
    let raw = RawLayout::new(dir.path().join("raw"));
    let domain = DomainLayout::new(dir.path().join("final"));

    let first = ScriptedTransport::new()
        .on("OVERVIEW", "IBM", Scripted::Json(json!({"Symbol": "IBM", "Name": "IBM"})))
        .on("OVERVIEW", "MSFT", Scripted::Json(json!({"Error Message": INVALID})));
    ingest(&raw, &domain, &first, vec![Endpoint::CompanyOverview], &["IBM", "MSFT"]);

    let writer = PartitionWriter::new(raw.clone());
    let msft = PartitionKey::unqualified(Endpoint::CompanyOverview, Subject::ticker("MSFT"));
    assert_eq!(writer.status(&msft), PartitionStatus::Populated);

    let records = scan_raw_tree(&raw).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ticker, "MSFT");
    assert_eq!(records[0].function, "COMPANY_OVERVIEW");
    assert_eq!(records[0].error_sample.as_deref(), Some(INVALID));
    assert!(records[0]
        .api_url
        .ends_with("?function=OVERVIEW&symbol=MSFT&apikey=YOUR_KEY"));

    let worklist = domain.default_worklist_path();
    write_worklist(&worklist, &records).unwrap();
    let loaded = read_worklist(&worklist).unwrap();
    assert_eq!(loaded, records);

    let second = ScriptedTransport::new().on(
        "OVERVIEW",
        "MSFT",
        Scripted::Json(json!({"Symbol": "MSFT", "Name": "Microsoft"})),
    );
    let report = replay(&loaded, &second, &writer, &mut Pacer::disabled(), "compact");
    assert_eq!(report.attempted, 1);
    assert_eq!(report.replaced, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(second.calls(), vec!["OVERVIEW:MSFT".to_string()]);

    let replaced = writer.read(&msft).unwrap();
    assert_eq!(replaced.get(0, "Name"), &Scalar::from("Microsoft"));
    assert!(scan_raw_tree(&raw).unwrap().is_empty());
}

#[test]
fn test_replay_of_periodized_endpoint_removes_stale_partition() {
    let dir = TempDir::new().unwrap();
    let raw = RawLayout::new(dir.path().join("raw"));
    let domain = DomainLayout::new(dir.path().join("final"));

    let first = ScriptedTransport::new().on(
        "BALANCE_SHEET",
        "IBM",
        Scripted::Json(json!({"Information": "invalid API call for BALANCE_SHEET"})),
    );
    ingest(&raw, &domain, &first, vec![Endpoint::BalanceSheet], &["IBM"]);
    let writer = PartitionWriter::new(raw.clone());
    let stale = PartitionKey::unqualified(Endpoint::BalanceSheet, Subject::ticker("IBM"));
    assert_eq!(writer.status(&stale), PartitionStatus::Populated);

    let records = scan_raw_tree(&raw).unwrap();
    assert_eq!(records.len(), 1);

    let second = ScriptedTransport::new().on(
        "BALANCE_SHEET",
        "IBM",
        Scripted::Json(json!({
            "symbol": "IBM",
            "annualReports": [{"fiscalDateEnding": "2023-12-31", "totalAssets": "10"}],
            "quarterlyReports": [{"fiscalDateEnding": "2024-03-31", "totalAssets": "11"}]
        })),
    );
    let report = replay(&records, &second, &writer, &mut Pacer::disabled(), "compact");
    assert_eq!(report.replaced, 1);
    assert_eq!(report.stale_removed, 1);
    assert_eq!(writer.status(&stale), PartitionStatus::Absent);
    for period in PeriodType::ALL {
        let key = PartitionKey::new(Endpoint::BalanceSheet, Subject::ticker("IBM"), Some(period));
        assert_eq!(writer.status(&key), PartitionStatus::Populated);
    }
}

#[test]
fn test_replay_failure_is_counted_not_fatal() {
    let dir = TempDir::new().unwrap();
    let raw = RawLayout::new(dir.path().join("raw"));
    let writer = PartitionWriter::new(raw);
    let worklist = dir.path().join("failures.csv");
    std::fs::write(
        &worklist,
        "ticker,function\nIBM,COMPANY_OVERVIEW\nMSFT,NOT_AN_ENDPOINT\n,COMPANY_OVERVIEW\n",
    )
    .unwrap();
    let records = read_worklist(&worklist).unwrap();
    assert_eq!(records.len(), 2);

    let transport = ScriptedTransport::new().on("OVERVIEW", "IBM", Scripted::Status(500));
    let report = replay(&records, &transport, &writer, &mut Pacer::disabled(), "compact");
    assert_eq!(report.attempted, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(transport.calls(), vec!["OVERVIEW:IBM".to_string()]);
}

#[test]
fn test_purge_removes_only_failure_rows() {
    let dir = TempDir::new().unwrap();
    let domain = DomainLayout::new(dir.path());
    let mut rows = RowSet::new();
    rows.push([
        ("ticker".to_string(), Scalar::from("IBM")),
        ("Name".to_string(), Scalar::from("IBM")),
    ]);
    rows.push([
        ("ticker".to_string(), Scalar::from("MSFT")),
        ("Information".to_string(), Scalar::from(INVALID)),
    ]);
    write_parquet(&domain.table_path("company_overview"), &rows).unwrap();
    write_parquet(
        &domain.table_path("economic_indicators"),
        &RowSet::single("value", Scalar::Float(1.5)),
    )
    .unwrap();

    let removed = purge_domain_tables(&domain, &TableSelector::All).unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed["company_overview"], 1);

    let left = read_parquet(&domain.table_path("company_overview")).unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left.get(0, "ticker"), &Scalar::from("IBM"));
}

#[test]
fn test_fundamentals_failures_survive_aggregation() {
    let dir = TempDir::new().unwrap();
    let raw = RawLayout::new(dir.path().join("raw"));
    let domain = DomainLayout::new(dir.path().join("final"));

    let mut good = RowSet::new();
    good.push([
        ("fiscalDateEnding".to_string(), Scalar::from("2023-12-31")),
        ("totalRevenue".to_string(), Scalar::from("100")),
    ]);
    let annual = PartitionKey::new(Endpoint::IncomeStatement, Subject::ticker("IBM"), Some(PeriodType::Annual));
    write_parquet(&raw.partition_path(&annual), &good).unwrap();
    let failed = PartitionKey::unqualified(Endpoint::IncomeStatement, Subject::ticker("MSFT"));
    write_parquet(
        &raw.partition_path(&failed),
        &RowSet::single("Information", Scalar::from("Invalid API call. Please retry")),
    )
    .unwrap();

    aggregate(&raw, &domain).unwrap();
    let table = "fundamentals_income_statement";
    let rows = read_parquet(&domain.table_path(table)).unwrap();
    assert_eq!(rows.len(), 2);

    let records = scan_table(table, &rows);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ticker, "MSFT");
    assert_eq!(records[0].function, "INCOME_STATEMENT");

    let removed = purge_domain_tables(&domain, &TableSelector::All).unwrap();
    assert_eq!(removed[table], 1);
    let left = read_parquet(&domain.table_path(table)).unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left.get(0, "ticker"), &Scalar::from("IBM"));
}
