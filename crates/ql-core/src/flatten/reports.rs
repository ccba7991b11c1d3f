//! Report-list flattening with period tagging.

use serde_json::{Map, Value};

use ql_common::partition::PERIOD_COLUMN;
use ql_common::{PeriodType, RowSet, Scalar};

use super::{flatten_content, flatten_generic_map, flatten_map_list};

/// Annual/quarterly key pairs, checked in order.
const PERIOD_PAIRS: [(&str, &str); 3] = [
    ("annualReports", "quarterlyReports"),
    ("annualEarnings", "quarterlyEarnings"),
    ("annualEarningsEstimates", "quarterlyEarningsEstimates"),
];

/// List fields preferred when no period pair is present.
const PRIORITY_LISTS: [&str; 4] = ["annualReports", "quarterlyReports", "bestMatches", "data"];

/// Flatten a map of labelled report lists.
///
/// The first annual/quarterly pair with a non-empty list wins and every row
/// is tagged with `period_type`. Otherwise the first list field is flattened
/// untagged, and failing that the whole map becomes one row.
pub fn flatten_reports(payload: &Value) -> RowSet {
    let Some(map) = payload.as_object() else {
        return flatten_content(payload);
    };

    for (annual, quarterly) in PERIOD_PAIRS {
        if !map.contains_key(annual) && !map.contains_key(quarterly) {
            continue;
        }
        let mut rows = RowSet::new();
        for (key, period) in [(annual, PeriodType::Annual), (quarterly, PeriodType::Quarterly)] {
            if let Some(list) = non_empty_list(map, key) {
                let mut part = flatten_map_list(list);
                part.set_constant(PERIOD_COLUMN, Scalar::from(period.as_str()));
                rows.extend(part);
            }
        }
        if !rows.is_empty() {
            return rows;
        }
    }

    if let Some(list) = PRIORITY_LISTS
        .iter()
        .find_map(|k| map.get(*k).filter(|v| v.is_array()))
    {
        return flatten_map_list(list);
    }
    if let Some(list) = map.values().find(|v| v.is_array()) {
        return flatten_map_list(list);
    }
    flatten_generic_map(payload)
}

fn non_empty_list<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key)
        .filter(|v| v.as_array().is_some_and(|a| !a.is_empty()))
}
