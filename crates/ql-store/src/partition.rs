//! Partition Writer: persists row sets into the raw tree and reports status.

use std::fs;

use tracing::{info, warn};

use ql_common::partition::PERIOD_COLUMN;
use ql_common::{Endpoint, PartitionKey, PartitionStatus, PeriodType, RowSet, Subject};

use crate::error::{StoreError, StoreResult};
use crate::layout::RawLayout;
use crate::parquet_io::{read_parquet, row_count, write_parquet};

/// One partition produced by [`PartitionWriter::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenPartition {
    pub key: PartitionKey,
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub struct PartitionWriter {
    layout: RawLayout,
}

impl PartitionWriter {
    pub fn new(layout: RawLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &RawLayout {
        &self.layout
    }

    /// Persist `rows` for `(endpoint, subject)`.
    ///
    /// Rows carrying a `period_type` column are split into one partition per
    /// period and the column is dropped; rows with any other period value are
    /// discarded. Otherwise the rows (even none) replace the unqualified
    /// partition.
    pub fn write(
        &self,
        rows: &RowSet,
        endpoint: Endpoint,
        subject: &Subject,
    ) -> StoreResult<Vec<WrittenPartition>> {
        if !rows.has_column(PERIOD_COLUMN) {
            let key = PartitionKey::unqualified(endpoint, subject.clone());
            let n = self.write_key(&key, rows)?;
            return Ok(vec![WrittenPartition { key, rows: n }]);
        }

        let mut written = Vec::new();
        for (value, part) in rows.split_by(PERIOD_COLUMN) {
            match PeriodType::parse(&value) {
                Some(period) => {
                    let key = PartitionKey::new(endpoint, subject.clone(), Some(period));
                    let n = self.write_key(&key, &part)?;
                    written.push(WrittenPartition { key, rows: n });
                }
                None => {
                    warn!(
                        endpoint = %endpoint,
                        subject = %subject,
                        period = %value,
                        rows = part.len(),
                        "dropping rows with unrecognised period"
                    );
                }
            }
        }
        Ok(written)
    }

    fn write_key(&self, key: &PartitionKey, rows: &RowSet) -> StoreResult<usize> {
        let path = self.layout.partition_path(key);
        let n = write_parquet(&path, rows)?;
        info!(partition = %key, path = %path.display(), rows = n, "wrote partition");
        Ok(n)
    }

    /// Absent, empty (zero rows or unreadable), or populated.
    pub fn status(&self, key: &PartitionKey) -> PartitionStatus {
        let path = self.layout.partition_path(key);
        if !path.exists() {
            return PartitionStatus::Absent;
        }
        match row_count(&path) {
            Ok(0) => PartitionStatus::Empty,
            Ok(_) => PartitionStatus::Populated,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable partition; treating as empty");
                PartitionStatus::Empty
            }
        }
    }

    /// Whether the unit needs no refetch.
    ///
    /// Periodized endpoints need both period partitions populated.
    pub fn exists_and_nonempty(&self, endpoint: Endpoint, subject: &Subject) -> bool {
        if endpoint.is_periodized() {
            PeriodType::ALL.iter().all(|p| {
                self.status(&PartitionKey::new(endpoint, subject.clone(), Some(*p)))
                    .is_usable()
            })
        } else {
            self.status(&PartitionKey::unqualified(endpoint, subject.clone()))
                .is_usable()
        }
    }

    pub fn read(&self, key: &PartitionKey) -> StoreResult<RowSet> {
        read_parquet(&self.layout.partition_path(key))
    }

    /// Delete a partition file. Returns whether one existed.
    pub fn remove(&self, key: &PartitionKey) -> StoreResult<bool> {
        let path = self.layout.partition_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(partition = %key, path = %path.display(), "removed partition");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}
