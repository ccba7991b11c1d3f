//! Typed pipeline configuration.
//!
//! Every section has a complete default, so an empty file (or no file at all)
//! yields a usable configuration apart from the date window, which must be
//! supplied before ingestion.

use std::path::PathBuf;

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use ql_common::{Endpoint, EndpointKind, Error as CommonError};

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub window: WindowConfig,
    pub provider: ProviderConfig,
    pub ingest: IngestConfig,
    pub endpoints: EndpointsConfig,
    pub quality: QualityConfig,
}

/// On-disk locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Data root; `QUANTLAB_DATA` and the platform data dir are used when unset.
    pub root: Option<PathBuf>,
    /// Raw partition tree, relative to the root.
    pub raw_dir: String,
    /// Domain tables, relative to the root.
    pub final_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: None,
            raw_dir: "data-raw".to_string(),
            final_dir: "final".to_string(),
        }
    }
}

/// Inclusive ingestion window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl WindowConfig {
    /// Both bounds, or a configuration error naming the missing one.
    pub fn bounds(&self) -> Result<(NaiveDate, NaiveDate), CommonError> {
        match (self.start, self.end) {
            (Some(s), Some(e)) if s <= e => Ok((s, e)),
            (Some(s), Some(e)) => Err(CommonError::InvalidDateWindow {
                start: s.to_string(),
                end: e.to_string(),
            }),
            (None, _) => Err(CommonError::Config("window.start is not set".to_string())),
            (_, None) => Err(CommonError::Config("window.end is not set".to_string())),
        }
    }
}

/// Data provider access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Environment variable holding the standard API key.
    pub key_env: String,
    /// Environment variable holding the paid-tier API key.
    pub paid_key_env: String,
    pub use_paid_key: bool,
    pub timeout_secs: u64,
    /// `outputsize` sent with tabular time-series requests.
    pub output_size: String,
    /// Credentials file consulted when the key is not in the environment.
    pub credentials_file: Option<PathBuf>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.alphavantage.co/query".to_string(),
            key_env: "ALPHAVANTAGE_API_KEY".to_string(),
            paid_key_env: "ALPHAVANTAGE_API_KEY_PAID".to_string(),
            use_paid_key: true,
            timeout_secs: 60,
            output_size: "full".to_string(),
            credentials_file: None,
        }
    }
}

/// Ingestion run behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Minimum spacing between provider calls, in seconds.
    pub pause_secs: f64,
    /// Skip units whose partitions are already populated.
    pub resume: bool,
    /// Fetch the factor series into the final directory.
    pub fetch_factors: bool,
    /// Use these tickers instead of querying the constituent source.
    pub tickers: Option<Vec<String>>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            pause_secs: 12.0,
            resume: true,
            fetch_factors: true,
            tickers: None,
        }
    }
}

/// Endpoint lists per acquisition group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointsConfig {
    pub time_series: Vec<String>,
    pub fundamentals: Vec<String>,
    pub economic_indicators: Vec<String>,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        let names = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            time_series: names(&["TIME_SERIES_DAILY_ADJUSTED", "TIME_SERIES_WEEKLY_ADJUSTED"]),
            fundamentals: names(&[
                "COMPANY_OVERVIEW",
                "INCOME_STATEMENT",
                "BALANCE_SHEET",
                "CASH_FLOW",
                "EARNINGS",
                "EARNINGS_ESTIMATES",
                "DIVIDENDS",
                "SPLITS",
                "SYMBOL_SEARCH",
            ]),
            economic_indicators: names(&[
                "REAL_GDP",
                "REAL_GDP_PER_CAPITA",
                "TREASURY_YIELD",
                "FEDERAL_FUNDS_RATE",
                "CPI",
                "INFLATION",
                "RETAIL_SALES",
                "DURABLES",
                "UNEMPLOYMENT",
                "NONFARM_PAYROLL",
            ]),
        }
    }
}

/// Endpoint lists parsed against the policy table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPlan {
    pub time_series: Vec<Endpoint>,
    pub fundamentals: Vec<Endpoint>,
    pub economic: Vec<Endpoint>,
}

impl EndpointsConfig {
    /// Parse every list, checking that each endpoint sits in its own group.
    pub fn plan(&self) -> Result<EndpointPlan, CommonError> {
        Ok(EndpointPlan {
            time_series: parse_group(&self.time_series, EndpointKind::TimeSeries, "time_series")?,
            fundamentals: parse_group(
                &self.fundamentals,
                EndpointKind::Fundamentals,
                "fundamentals",
            )?,
            economic: parse_group(
                &self.economic_indicators,
                EndpointKind::Economic,
                "economic_indicators",
            )?,
        })
    }
}

fn parse_group(
    names: &[String],
    kind: EndpointKind,
    group: &str,
) -> Result<Vec<Endpoint>, CommonError> {
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let endpoint: Endpoint = name.parse()?;
        if endpoint.kind() != kind {
            return Err(CommonError::Config(format!(
                "endpoint {} is listed under {} but is a {:?} endpoint",
                endpoint,
                group,
                endpoint.kind()
            )));
        }
        if !out.contains(&endpoint) {
            out.push(endpoint);
        }
    }
    Ok(out)
}

/// Invariant checker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// Number of columns listed in the missing-value detail.
    pub top_missing: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self { top_missing: 10 }
    }
}
