//! Price bucket normalization (`price_daily`, `price_weekly`).

use std::sync::OnceLock;

use regex::Regex;

use ql_common::{normalize_field_name, RowSet, Scalar};

/// Output schema, in column order. Only columns present in the inputs appear.
pub const PRICE_COLUMNS: [&str; 10] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "adjusted_close",
    "volume",
    "dividend_amount",
    "split_coefficient",
    "ticker",
];

const NUMERIC_COLUMNS: [&str; 8] = [
    "open",
    "high",
    "low",
    "close",
    "adjusted_close",
    "volume",
    "dividend_amount",
    "split_coefficient",
];

/// `<Series Label>.<date>.<index>. <field>`, the wide form produced when a
/// whole series was flattened into one row.
fn wide_column() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<label>.+?)\.(?P<date>\d{4}-\d{2}-\d{2}(?:[ T]\d{2}:\d{2}(?::\d{2})?)?)\.(?P<field>\d+\.\s*.+)$")
            .expect("wide column pattern compiles")
    })
}

/// Turn wide rows back into one row per date. Columns outside the wide
/// pattern are copied onto every produced row.
pub fn unwide(rows: RowSet) -> RowSet {
    let re = wide_column();
    if !rows.columns().iter().any(|c| re.is_match(c)) {
        return rows;
    }

    let mut out = RowSet::new();
    for row in rows.rows() {
        let mut by_date: Vec<(String, Vec<(String, Scalar)>)> = Vec::new();
        let mut passthrough: Vec<(String, Scalar)> = Vec::new();
        for (column, value) in row {
            match re.captures(column) {
                Some(caps) => {
                    let date = caps["date"].to_string();
                    let field = caps["field"].to_string();
                    let slot = match by_date.iter().position(|(d, _)| *d == date) {
                        Some(i) => i,
                        None => {
                            by_date.push((date, Vec::new()));
                            by_date.len() - 1
                        }
                    };
                    by_date[slot].1.push((field, value.clone()));
                }
                None => passthrough.push((column.clone(), value.clone())),
            }
        }
        for (date, fields) in by_date {
            let mut entries = vec![("date".to_string(), Scalar::Text(date))];
            entries.extend(fields);
            entries.extend(passthrough.iter().cloned());
            out.push(entries);
        }
    }
    out
}

/// Normalize one raw price partition for `ticker`.
pub fn normalize(rows: RowSet, ticker: &str) -> RowSet {
    let mut rows = unwide(rows);

    let names: Vec<String> = rows.columns().to_vec();
    for name in &names {
        let normalized = normalize_field_name(name);
        let target = match normalized.as_str() {
            "timestamp" | "datetime" => "date".to_string(),
            _ => normalized,
        };
        rows.rename_column(name, &target);
    }

    rows.map_column("date", |v| v.as_date().map_or(Scalar::Null, Scalar::Date));
    rows.retain_rows(|r| matches!(r.get("date"), Some(Scalar::Date(_))));
    for column in NUMERIC_COLUMNS {
        rows.map_column(column, |v| {
            let n = v.coerce_numeric();
            if n.is_numeric() {
                n
            } else {
                Scalar::Null
            }
        });
    }
    rows.set_constant("ticker", Scalar::from(ticker));
    rows.select(&PRICE_COLUMNS);
    rows
}

/// Canonical column order, first `(ticker, date)` wins, sorted.
pub fn finalize(rows: &mut RowSet) -> usize {
    rows.select(&PRICE_COLUMNS);
    let dropped = rows.dedup_by(&["ticker", "date"]);
    rows.sort_by(&["ticker", "date"]);
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> Scalar {
        Scalar::Date(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
    }

    #[test]
    fn test_tabular_partition() {
        let mut raw = RowSet::new();
        raw.push([
            ("timestamp".to_string(), Scalar::from("2024-01-03")),
            ("open".to_string(), Scalar::Int(10)),
            ("adjusted_close".to_string(), Scalar::Float(10.5)),
            ("symbol".to_string(), Scalar::from("IBM")),
        ]);
        raw.push([
            ("timestamp".to_string(), Scalar::from("not a date")),
            ("open".to_string(), Scalar::Int(11)),
        ]);
        let rows = normalize(raw, "IBM");
        assert_eq!(rows.columns(), &["date", "open", "adjusted_close", "ticker"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.get(0, "date"), &d("2024-01-03"));
        assert_eq!(rows.get(0, "ticker"), &Scalar::from("IBM"));
    }

    #[test]
    fn test_prefixed_fields_and_text_numbers() {
        let mut raw = RowSet::new();
        raw.push([
            ("date".to_string(), Scalar::from("2024-01-02")),
            ("4. close".to_string(), Scalar::from("12.5")),
            ("6. volume".to_string(), Scalar::from("n/a")),
        ]);
        let rows = normalize(raw, "X");
        assert_eq!(rows.get(0, "close"), &Scalar::Float(12.5));
        assert_eq!(rows.get(0, "volume"), &Scalar::Null);
    }

    #[test]
    fn test_wide_form_is_unpacked() {
        let mut raw = RowSet::new();
        raw.push([
            ("Weekly Adjusted Time Series.2024-01-05.1. open".to_string(), Scalar::from("10")),
            ("Weekly Adjusted Time Series.2024-01-05.4. close".to_string(), Scalar::from("11")),
            ("Weekly Adjusted Time Series.2024-01-12.1. open".to_string(), Scalar::from("12")),
            ("Meta Data.2. Symbol".to_string(), Scalar::from("IBM")),
        ]);
        let rows = normalize(raw, "IBM");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.get(0, "date"), &d("2024-01-05"));
        assert_eq!(rows.get(0, "close"), &Scalar::Int(11));
        assert_eq!(rows.get(1, "open"), &Scalar::Int(12));
        assert_eq!(rows.get(1, "close"), &Scalar::Null);
        assert!(!rows.has_column("Meta Data.2. Symbol"));
    }

    #[test]
    fn test_finalize_drops_duplicate_keys() {
        let mut rows = RowSet::new();
        for (t, date, close) in [("B", "2024-01-02", 1), ("A", "2024-01-03", 2), ("B", "2024-01-02", 3)] {
            rows.push([
                ("ticker".to_string(), Scalar::from(t)),
                ("date".to_string(), d(date)),
                ("close".to_string(), Scalar::Int(close)),
            ]);
        }
        assert_eq!(finalize(&mut rows), 1);
        assert_eq!(rows.columns(), &["date", "close", "ticker"]);
        assert_eq!(rows.get(0, "ticker"), &Scalar::from("A"));
        assert_eq!(rows.get(1, "close"), &Scalar::Int(1));
    }
}
