//! Filtered reads of finished domain tables.

use chrono::NaiveDate;

use ql_common::{Error, Result, Row, RowSet, Scalar};
use ql_store::{read_parquet, DomainLayout};

/// Optional filters applied when loading a domain table.
#[derive(Debug, Clone, Default)]
pub struct DomainQuery {
    pub tickers: Option<Vec<String>>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DomainQuery {
    pub fn is_unfiltered(&self) -> bool {
        self.tickers.is_none() && self.start.is_none() && self.end.is_none()
    }

    fn matches(&self, row: &Row) -> bool {
        if let Some(tickers) = &self.tickers {
            let ticker = row
                .get("ticker")
                .or_else(|| row.get("symbol"))
                .and_then(Scalar::as_str);
            if !ticker.is_some_and(|t| tickers.iter().any(|w| w == t)) {
                return false;
            }
        }
        if self.start.is_some() || self.end.is_some() {
            let Some(date) = row.get("date").and_then(Scalar::as_date) else {
                return false;
            };
            if self.start.is_some_and(|s| date < s) || self.end.is_some_and(|e| date > e) {
                return false;
            }
        }
        true
    }
}

/// Read domain table `name`, keeping rows that match `query`.
pub fn load_domain_table(domain: &DomainLayout, name: &str, query: &DomainQuery) -> Result<RowSet> {
    let path = domain.table_path(name);
    if !path.exists() {
        return Err(Error::TableNotFound {
            name: name.to_string(),
        });
    }
    let mut rows = read_parquet(&path)?;
    if !query.is_unfiltered() {
        rows.retain_rows(|r| query.matches(r));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_store::write_parquet;
    use tempfile::TempDir;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_filters() {
        let dir = TempDir::new().unwrap();
        let domain = DomainLayout::new(dir.path());
        let mut rows = RowSet::new();
        for (t, day) in [("IBM", "2024-01-02"), ("IBM", "2024-02-02"), ("MSFT", "2024-01-02")] {
            rows.push([
                ("date".to_string(), Scalar::Date(d(day))),
                ("ticker".to_string(), Scalar::from(t)),
            ]);
        }
        write_parquet(&domain.table_path("price_daily"), &rows).unwrap();

        let all = load_domain_table(&domain, "price_daily", &DomainQuery::default()).unwrap();
        assert_eq!(all.len(), 3);

        let query = DomainQuery {
            tickers: Some(vec!["IBM".into()]),
            start: None,
            end: Some(d("2024-01-31")),
        };
        let some = load_domain_table(&domain, "price_daily", &query).unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some.get(0, "date"), &Scalar::Date(d("2024-01-02")));

        let missing = load_domain_table(&domain, "price_weekly", &query);
        assert!(matches!(missing, Err(Error::TableNotFound { .. })));
    }
}
