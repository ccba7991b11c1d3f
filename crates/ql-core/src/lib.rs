//! QuantLab pipeline core.
//!
//! This crate provides:
//! - Shape classification and flattening of provider payloads
//! - The provider transport seam and constituent sources
//! - The Ingestion Orchestrator (resumable, paced, per-unit failure isolation)
//! - The Aggregation Engine producing domain tables
//! - Invariant checks over domain tables
//! - Failure triage: detection, worklist export, replay and purge

pub mod aggregate;
pub mod constituents;
pub mod exit_codes;
pub mod flatten;
pub mod ingest;
pub mod logging;
pub mod pacer;
pub mod quality;
pub mod transport;
pub mod triage;

pub use aggregate::{aggregate, load_domain_table, AggregationReport, DomainQuery};
pub use constituents::{ConstituentSource, StaticConstituents};
pub use exit_codes::ExitCode;
pub use flatten::{flatten, flatten_tabular, FlattenHint, PayloadShape};
pub use ingest::{IngestOptions, IngestReport, Orchestrator, UnitOutcome, UnitState};
pub use pacer::Pacer;
pub use quality::{check_table, run_quality_checks, QualityReport, TableSelector};
pub use transport::{RestTransport, Transport, TransportError};
pub use triage::{FailureRecord, ReplayReport};
