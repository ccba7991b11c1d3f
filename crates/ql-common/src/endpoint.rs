//! Provider endpoints and the static policy table.
//!
//! Every per-endpoint decision (which provider function to call, how to build
//! its arguments, whether responses are split by reporting period, and which
//! domain table it feeds) lives in [`POLICIES`], indexed by the [`Endpoint`]
//! discriminant. Components look decisions up here instead of branching on
//! endpoint names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Logical data category offered by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    TimeSeriesDailyAdjusted,
    TimeSeriesWeeklyAdjusted,
    TimeSeriesDaily,
    TimeSeriesWeekly,
    CompanyOverview,
    IncomeStatement,
    BalanceSheet,
    CashFlow,
    Earnings,
    EarningsEstimates,
    Dividends,
    Splits,
    SymbolSearch,
    EtfProfile,
    ListingStatus,
    EarningsCalendar,
    IpoCalendar,
    RealGdp,
    RealGdpPerCapita,
    TreasuryYield,
    FederalFundsRate,
    Cpi,
    Inflation,
    RetailSales,
    Durables,
    Unemployment,
    NonfarmPayroll,
}

/// How an endpoint's responses are acquired and stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// Per-ticker price history fetched as CSV.
    TimeSeries,
    /// Per-ticker JSON documents.
    Fundamentals,
    /// Ticker-independent series stored in one global partition.
    Economic,
}

/// Argument-construction rule for a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgRule {
    /// `symbol=<ticker>`
    Symbol,
    /// `keywords=<ticker>`
    Keywords,
    /// No per-ticker argument.
    NoArgs,
}

/// Domain-table family an endpoint aggregates into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    PriceDaily,
    PriceWeekly,
    Fundamentals,
    Economic,
    CompanyOverview,
}

/// One row of the policy table.
#[derive(Debug, Clone, Copy)]
pub struct EndpointPolicy {
    pub endpoint: Endpoint,
    /// Name used in configuration and as the raw partition directory.
    pub name: &'static str,
    /// Function name sent to the provider.
    pub function: &'static str,
    pub kind: EndpointKind,
    pub arg: ArgRule,
    /// Responses carry annual/quarterly report lists.
    pub periodized: bool,
    pub bucket: Option<Bucket>,
}

const fn policy(
    endpoint: Endpoint,
    name: &'static str,
    function: &'static str,
    kind: EndpointKind,
    arg: ArgRule,
    periodized: bool,
    bucket: Option<Bucket>,
) -> EndpointPolicy {
    EndpointPolicy {
        endpoint,
        name,
        function,
        kind,
        arg,
        periodized,
        bucket,
    }
}

use ArgRule::{Keywords, NoArgs, Symbol};
use EndpointKind::{Economic, Fundamentals, TimeSeries};

/// Policy table; entry `i` describes the endpoint whose discriminant is `i`.
#[rustfmt::skip]
pub static POLICIES: [EndpointPolicy; 27] = [
    policy(Endpoint::TimeSeriesDailyAdjusted, "TIME_SERIES_DAILY_ADJUSTED", "TIME_SERIES_DAILY_ADJUSTED", TimeSeries, Symbol, false, Some(Bucket::PriceDaily)),
    policy(Endpoint::TimeSeriesWeeklyAdjusted, "TIME_SERIES_WEEKLY_ADJUSTED", "TIME_SERIES_WEEKLY_ADJUSTED", TimeSeries, Symbol, false, Some(Bucket::PriceWeekly)),
    policy(Endpoint::TimeSeriesDaily, "TIME_SERIES_DAILY", "TIME_SERIES_DAILY", TimeSeries, Symbol, false, Some(Bucket::PriceDaily)),
    policy(Endpoint::TimeSeriesWeekly, "TIME_SERIES_WEEKLY", "TIME_SERIES_WEEKLY", TimeSeries, Symbol, false, Some(Bucket::PriceWeekly)),
    policy(Endpoint::CompanyOverview, "COMPANY_OVERVIEW", "OVERVIEW", Fundamentals, Symbol, false, Some(Bucket::CompanyOverview)),
    policy(Endpoint::IncomeStatement, "INCOME_STATEMENT", "INCOME_STATEMENT", Fundamentals, Symbol, true, Some(Bucket::Fundamentals)),
    policy(Endpoint::BalanceSheet, "BALANCE_SHEET", "BALANCE_SHEET", Fundamentals, Symbol, true, Some(Bucket::Fundamentals)),
    policy(Endpoint::CashFlow, "CASH_FLOW", "CASH_FLOW", Fundamentals, Symbol, true, Some(Bucket::Fundamentals)),
    policy(Endpoint::Earnings, "EARNINGS", "EARNINGS", Fundamentals, Symbol, true, Some(Bucket::Fundamentals)),
    policy(Endpoint::EarningsEstimates, "EARNINGS_ESTIMATES", "EARNINGS_ESTIMATES", Fundamentals, Symbol, true, Some(Bucket::Fundamentals)),
    policy(Endpoint::Dividends, "DIVIDENDS", "DIVIDENDS", Fundamentals, Symbol, false, Some(Bucket::Fundamentals)),
    policy(Endpoint::Splits, "SPLITS", "SPLITS", Fundamentals, Symbol, false, Some(Bucket::Fundamentals)),
    policy(Endpoint::SymbolSearch, "SYMBOL_SEARCH", "SYMBOL_SEARCH", Fundamentals, Keywords, false, None),
    policy(Endpoint::EtfProfile, "ETF_PROFILE", "ETF_PROFILE", Fundamentals, Symbol, false, None),
    policy(Endpoint::ListingStatus, "LISTING_STATUS", "LISTING_STATUS", Fundamentals, NoArgs, false, None),
    policy(Endpoint::EarningsCalendar, "EARNINGS_CALENDAR", "EARNINGS_CALENDAR", Fundamentals, NoArgs, false, None),
    policy(Endpoint::IpoCalendar, "IPO_CALENDAR", "IPO_CALENDAR", Fundamentals, NoArgs, false, None),
    policy(Endpoint::RealGdp, "REAL_GDP", "REAL_GDP", Economic, NoArgs, false, Some(Bucket::Economic)),
    policy(Endpoint::RealGdpPerCapita, "REAL_GDP_PER_CAPITA", "REAL_GDP_PER_CAPITA", Economic, NoArgs, false, Some(Bucket::Economic)),
    policy(Endpoint::TreasuryYield, "TREASURY_YIELD", "TREASURY_YIELD", Economic, NoArgs, false, Some(Bucket::Economic)),
    policy(Endpoint::FederalFundsRate, "FEDERAL_FUNDS_RATE", "FEDERAL_FUNDS_RATE", Economic, NoArgs, false, Some(Bucket::Economic)),
    policy(Endpoint::Cpi, "CPI", "CPI", Economic, NoArgs, false, Some(Bucket::Economic)),
    policy(Endpoint::Inflation, "INFLATION", "INFLATION", Economic, NoArgs, false, Some(Bucket::Economic)),
    policy(Endpoint::RetailSales, "RETAIL_SALES", "RETAIL_SALES", Economic, NoArgs, false, Some(Bucket::Economic)),
    policy(Endpoint::Durables, "DURABLES", "DURABLES", Economic, NoArgs, false, Some(Bucket::Economic)),
    policy(Endpoint::Unemployment, "UNEMPLOYMENT", "UNEMPLOYMENT", Economic, NoArgs, false, Some(Bucket::Economic)),
    policy(Endpoint::NonfarmPayroll, "NONFARM_PAYROLL", "NONFARM_PAYROLL", Economic, NoArgs, false, Some(Bucket::Economic)),
];

impl Endpoint {
    /// Every endpoint, in policy-table order.
    pub fn all() -> impl Iterator<Item = Endpoint> {
        POLICIES.iter().map(|p| p.endpoint)
    }

    pub fn policy(self) -> &'static EndpointPolicy {
        &POLICIES[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.policy().name
    }

    pub fn function(self) -> &'static str {
        self.policy().function
    }

    pub fn kind(self) -> EndpointKind {
        self.policy().kind
    }

    pub fn is_periodized(self) -> bool {
        self.policy().periodized
    }

    pub fn bucket(self) -> Option<Bucket> {
        self.policy().bucket
    }

    /// Provider call arguments for a ticker under this endpoint's rule.
    pub fn call_params(self, ticker: Option<&str>) -> Vec<(String, String)> {
        match (self.policy().arg, ticker) {
            (ArgRule::Symbol, Some(t)) => vec![("symbol".to_string(), t.to_string())],
            (ArgRule::Keywords, Some(t)) => vec![("keywords".to_string(), t.to_string())],
            _ => Vec::new(),
        }
    }

    /// Resolve a partition directory name or a provider function name.
    pub fn from_name_or_function(name: &str) -> Option<Endpoint> {
        name.parse().ok().or_else(|| {
            POLICIES
                .iter()
                .find(|p| p.function.eq_ignore_ascii_case(name.trim()))
                .map(|p| p.endpoint)
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        POLICIES
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(wanted))
            .map(|p| p.endpoint)
            .ok_or_else(|| Error::UnknownEndpoint(s.to_string()))
    }
}

impl Serialize for Endpoint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
