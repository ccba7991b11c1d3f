//! Raw partition addressing.
//!
//! A raw partition is addressed by `(endpoint, subject, period)`. The subject
//! is either a ticker or the single global partition used by
//! ticker-independent endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;

/// File stem of the ticker-independent partition.
pub const GLOBAL_SUBJECT: &str = "global";

/// Column carrying the reporting-period discriminator before partitioning.
pub const PERIOD_COLUMN: &str = "period_type";

/// Reporting period of a periodized endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Annual,
    Quarterly,
}

impl PeriodType {
    pub const ALL: [PeriodType; 2] = [PeriodType::Annual, PeriodType::Quarterly];

    pub fn as_str(self) -> &'static str {
        match self {
            PeriodType::Annual => "annual",
            PeriodType::Quarterly => "quarterly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "annual" => Some(PeriodType::Annual),
            "quarterly" => Some(PeriodType::Quarterly),
            _ => None,
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a partition is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Ticker(String),
    Global,
}

impl Subject {
    pub fn ticker(t: impl Into<String>) -> Self {
        Subject::Ticker(t.into())
    }

    /// File stem used on disk.
    pub fn stem(&self) -> &str {
        match self {
            Subject::Ticker(t) => t,
            Subject::Global => GLOBAL_SUBJECT,
        }
    }

    pub fn as_ticker(&self) -> Option<&str> {
        match self {
            Subject::Ticker(t) => Some(t),
            Subject::Global => None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// Full address of one raw partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub endpoint: Endpoint,
    pub subject: Subject,
    pub period: Option<PeriodType>,
}

impl PartitionKey {
    pub fn new(endpoint: Endpoint, subject: Subject, period: Option<PeriodType>) -> Self {
        Self {
            endpoint,
            subject,
            period,
        }
    }

    pub fn unqualified(endpoint: Endpoint, subject: Subject) -> Self {
        Self::new(endpoint, subject, None)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.period {
            Some(p) => write!(f, "{}/{}/{}", self.endpoint, p, self.subject),
            None => write!(f, "{}/{}", self.endpoint, self.subject),
        }
    }
}

/// Observed state of a partition on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStatus {
    /// No file.
    Absent,
    /// A file with zero rows, or one that cannot be read. Not yet usable.
    Empty,
    /// A readable file with at least one row.
    Populated,
}

impl PartitionStatus {
    pub fn is_usable(self) -> bool {
        self == PartitionStatus::Populated
    }
}
