//! Economic-indicator bucket.

use ql_common::{RowSet, Scalar};

pub const TABLE: &str = "economic_indicators";

/// Tag rows with their indicator; `"."` and `"None"` are missing values.
pub fn normalize(mut rows: RowSet, indicator: &str) -> RowSet {
    let columns: Vec<String> = rows.columns().to_vec();
    for column in &columns {
        rows.map_column(column, |v| match v {
            Scalar::Text(s) if s == "." || s == "None" => Scalar::Null,
            other => other.clone(),
        });
    }
    rows.map_column("date", |v| v.as_date().map_or(Scalar::Null, Scalar::Date));
    rows.map_column("value", |v| {
        let n = v.coerce_numeric();
        if n.is_numeric() {
            n
        } else {
            Scalar::Null
        }
    });
    rows.set_constant("indicator", Scalar::from(indicator));
    rows
}

pub fn finalize(rows: &mut RowSet) {
    rows.sort_by(&["indicator", "date"]);
}
