//! Canonical row sets.
//!
//! A [`RowSet`] is an ordered sequence of rows plus the ordered union of their
//! column names. Columns are remembered in first-seen order; a column absent
//! from a given row reads as [`Scalar::Null`].

use std::collections::{BTreeMap, HashSet};

use crate::value::Scalar;

/// One canonical row: field name to scalar.
pub type Row = BTreeMap<String, Scalar>;

static NULL: Scalar = Scalar::Null;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl RowSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty row set that still knows its columns.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for c in columns {
            set.ensure_column(c.into());
        }
        set
    }

    /// Single row with a single field.
    pub fn single(column: &str, value: Scalar) -> Self {
        let mut set = Self::new();
        set.push([(column.to_string(), value)]);
        set
    }

    /// Append a row, registering any new columns in encounter order.
    pub fn push<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, Scalar)>,
    {
        let mut row = Row::new();
        for (k, v) in entries {
            self.ensure_column(k.clone());
            row.insert(k, v);
        }
        self.rows.push(row);
    }

    fn ensure_column(&mut self, name: String) {
        if !self.columns.iter().any(|c| *c == name) {
            self.columns.push(name);
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Cell lookup; missing cells read as null.
    pub fn get(&self, row: usize, column: &str) -> &Scalar {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL)
    }

    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Scalar> + 'a {
        self.rows
            .iter()
            .map(move |r| r.get(column).unwrap_or(&NULL))
    }

    /// The `{text: ...}` fallback shape: one row, one `text` column.
    pub fn single_text(&self) -> Option<&str> {
        if self.rows.len() == 1 && self.columns.len() == 1 && self.columns[0] == "text" {
            return self.rows[0].get("text").and_then(Scalar::as_str);
        }
        None
    }

    /// Set a column to the same value on every row.
    pub fn set_constant(&mut self, column: &str, value: Scalar) {
        self.ensure_column(column.to_string());
        for row in &mut self.rows {
            row.insert(column.to_string(), value.clone());
        }
    }

    pub fn drop_column(&mut self, column: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c != column);
        for row in &mut self.rows {
            row.remove(column);
        }
        before != self.columns.len()
    }

    /// Rename a column. When the target already exists, its non-null values win.
    pub fn rename_column(&mut self, from: &str, to: &str) {
        if from == to || !self.has_column(from) {
            return;
        }
        let target_exists = self.has_column(to);
        for row in &mut self.rows {
            if let Some(v) = row.remove(from) {
                let keep_existing = row.get(to).is_some_and(|e| !e.is_null());
                if !keep_existing {
                    row.insert(to.to_string(), v);
                }
            }
        }
        if target_exists {
            self.columns.retain(|c| c != from);
        } else if let Some(slot) = self.columns.iter_mut().find(|c| *c == from) {
            *slot = to.to_string();
        }
    }

    /// Apply `f` to every cell of a column (missing cells included as null).
    pub fn map_column<F>(&mut self, column: &str, mut f: F)
    where
        F: FnMut(&Scalar) -> Scalar,
    {
        if !self.has_column(column) {
            return;
        }
        for row in &mut self.rows {
            let current = row.get(column).cloned().unwrap_or_default();
            row.insert(column.to_string(), f(&current));
        }
    }

    /// Coerce a column to numbers only when every non-null cell is numeric.
    ///
    /// Returns whether the column was converted.
    pub fn coerce_numeric_column(&mut self, column: &str) -> bool {
        if !self.has_column(column) {
            return false;
        }
        let all_numeric = self
            .column_values(column)
            .filter(|v| !v.is_blank())
            .all(|v| v.coerce_numeric().is_numeric());
        if !all_numeric {
            return false;
        }
        self.map_column(column, |v| {
            if v.is_blank() {
                Scalar::Null
            } else {
                v.coerce_numeric()
            }
        });
        true
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Row) -> bool,
    {
        self.rows.retain(|r| keep(r));
    }

    /// Concatenate another row set; columns are unioned.
    pub fn extend(&mut self, other: RowSet) {
        for c in other.columns {
            self.ensure_column(c);
        }
        self.rows.extend(other.rows);
    }

    /// Keep only the named columns, in the given order, skipping absent ones.
    pub fn select(&mut self, columns: &[&str]) {
        let keep: Vec<String> = columns
            .iter()
            .filter(|c| self.has_column(c))
            .map(|c| c.to_string())
            .collect();
        for row in &mut self.rows {
            row.retain(|k, _| keep.iter().any(|c| c == k));
        }
        self.columns = keep;
    }

    /// Drop columns whose every cell is blank.
    pub fn drop_blank_columns(&mut self) -> Vec<String> {
        let blank: Vec<String> = self
            .columns
            .iter()
            .filter(|c| self.column_values(c).all(Scalar::is_blank))
            .cloned()
            .collect();
        for c in &blank {
            self.drop_column(c);
        }
        blank
    }

    /// Split rows by the stringified value of `column`, preserving first-seen order.
    /// The split column is removed from every part.
    pub fn split_by(&self, column: &str) -> Vec<(String, RowSet)> {
        let mut parts: Vec<(String, RowSet)> = Vec::new();
        let remaining: Vec<String> = self.columns.iter().filter(|c| *c != column).cloned().collect();
        for row in &self.rows {
            let key = row.get(column).map(|v| v.to_string()).unwrap_or_default();
            let idx = match parts.iter().position(|(k, _)| *k == key) {
                Some(i) => i,
                None => {
                    parts.push((key, RowSet::with_columns(remaining.iter().cloned())));
                    parts.len() - 1
                }
            };
            let mut r = row.clone();
            r.remove(column);
            parts[idx].1.rows.push(r);
        }
        parts
    }

    /// Remove rows whose key columns repeat an earlier row. Returns how many went.
    pub fn dedup_by(&mut self, keys: &[&str]) -> usize {
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let before = self.rows.len();
        self.rows.retain(|r| {
            let key: Vec<String> = keys
                .iter()
                .map(|k| r.get(*k).map(|v| v.to_string()).unwrap_or_default())
                .collect();
            seen.insert(key)
        });
        before - self.rows.len()
    }

    /// Stable sort by the given key columns; dates and numbers order naturally.
    pub fn sort_by(&mut self, keys: &[&str]) {
        self.rows.sort_by(|a, b| {
            for k in keys {
                let ord = compare_cells(a.get(*k).unwrap_or(&NULL), b.get(*k).unwrap_or(&NULL));
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });
    }
}

/// Dates, then numbers (including numeric text), then other text, then nulls.
fn cell_rank(v: &Scalar) -> u8 {
    match v {
        Scalar::Date(_) => 0,
        Scalar::Null => 3,
        _ if v.as_f64().is_some() => 1,
        _ => 2,
    }
}

fn compare_cells(a: &Scalar, b: &Scalar) -> std::cmp::Ordering {
    let rank = cell_rank(a).cmp(&cell_rank(b));
    if rank != std::cmp::Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Scalar::Date(x), Scalar::Date(y)) => x.cmp(y),
        (Scalar::Null, Scalar::Null) => std::cmp::Ordering::Equal,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RowSet {
        let mut set = RowSet::new();
        set.push([
            ("ticker".to_string(), Scalar::from("AAA")),
            ("period_type".to_string(), Scalar::from("annual")),
        ]);
        set.push([
            ("ticker".to_string(), Scalar::from("AAA")),
            ("period_type".to_string(), Scalar::from("quarterly")),
            ("extra".to_string(), Scalar::Int(1)),
        ]);
        set
    }

    #[test]
    fn test_columns_keep_first_seen_order() {
        let set = sample();
        assert_eq!(set.columns(), &["ticker", "period_type", "extra"]);
        assert_eq!(set.get(0, "extra"), &Scalar::Null);
    }

    #[test]
    fn test_split_by_drops_discriminator() {
        let parts = sample().split_by("period_type");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].0, "annual");
        assert!(!parts[0].1.has_column("period_type"));
        assert_eq!(parts[1].1.get(0, "extra"), &Scalar::Int(1));
    }

    #[test]
    fn test_rename_merges_into_existing() {
        let mut set = RowSet::new();
        set.push([
            ("timestamp".to_string(), Scalar::from("2024-01-02")),
            ("date".to_string(), Scalar::Null),
        ]);
        set.rename_column("timestamp", "date");
        assert_eq!(set.columns(), &["date"]);
        assert_eq!(set.get(0, "date"), &Scalar::from("2024-01-02"));
    }

    #[test]
    fn test_coerce_numeric_column_is_all_or_nothing() {
        let mut set = RowSet::new();
        set.push([("v".to_string(), Scalar::from("1"))]);
        set.push([("v".to_string(), Scalar::from("x"))]);
        assert!(!set.coerce_numeric_column("v"));
        assert_eq!(set.get(0, "v"), &Scalar::from("1"));

        let mut set = RowSet::new();
        set.push([("v".to_string(), Scalar::from("1"))]);
        set.push([("v".to_string(), Scalar::from(""))]);
        assert!(set.coerce_numeric_column("v"));
        assert_eq!(set.get(0, "v"), &Scalar::Int(1));
        assert_eq!(set.get(1, "v"), &Scalar::Null);
    }

    #[test]
    fn test_dedup_and_sort() {
        let mut set = RowSet::new();
        for (t, d) in [("B", 2), ("A", 1), ("B", 2), ("A", 0)] {
            set.push([
                ("ticker".to_string(), Scalar::from(t)),
                ("n".to_string(), Scalar::Int(d)),
            ]);
        }
        assert_eq!(set.dedup_by(&["ticker", "n"]), 1);
        set.sort_by(&["ticker", "n"]);
        assert_eq!(set.get(0, "n"), &Scalar::Int(0));
        assert_eq!(set.get(2, "ticker"), &Scalar::from("B"));
    }

    #[test]
    fn test_sort_mixed_text_orders_numbers_first() {
        let mut set = RowSet::new();
        for v in [Scalar::from("1a"), Scalar::Null, Scalar::from("10"), Scalar::Int(9), Scalar::from("b")] {
            set.push([("v".to_string(), v)]);
        }
        set.sort_by(&["v"]);
        let order: Vec<String> = set.column_values("v").map(|v| v.to_string()).collect();
        assert_eq!(order[..4], ["9", "10", "1a", "b"]);
        assert_eq!(set.get(4, "v"), &Scalar::Null);
    }

    #[test]
    fn test_single_text() {
        let set = RowSet::single("text", Scalar::from("hello"));
        assert_eq!(set.single_text(), Some("hello"));
        assert_eq!(sample().single_text(), None);
    }

    #[test]
    fn test_drop_blank_columns() {
        let mut set = RowSet::new();
        set.push([
            ("a".to_string(), Scalar::from("")),
            ("b".to_string(), Scalar::Int(1)),
        ]);
        assert_eq!(set.drop_blank_columns(), vec!["a".to_string()]);
        assert_eq!(set.columns(), &["b"]);
    }
}
