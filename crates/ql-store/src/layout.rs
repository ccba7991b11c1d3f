//! Path layout of the raw partition tree and the domain-table directory.
//!
//! ```text
//! <raw>/<ENDPOINT>/<TICKER>.parquet
//! <raw>/<ENDPOINT>/<annual|quarterly>/<TICKER>.parquet
//! <raw>/<ENDPOINT>/global.parquet
//! <raw>/wrds_*.parquet                     constituent membership
//! <raw>/.locks/<ENDPOINT>/<SUBJECT>.lock
//! <final>/<table>.parquet
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use ql_common::{PartitionKey, PeriodType, MEMBERSHIP_PREFIX};

use crate::error::{StoreError, StoreResult};

const PARQUET_EXT: &str = "parquet";
const LOCK_DIR: &str = ".locks";

/// Layout of the raw partition tree.
#[derive(Debug, Clone)]
pub struct RawLayout {
    root: PathBuf,
}

impl RawLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn endpoint_dir(&self, endpoint_name: &str) -> PathBuf {
        self.root.join(endpoint_name)
    }

    pub fn partition_path(&self, key: &PartitionKey) -> PathBuf {
        let mut path = self.endpoint_dir(key.endpoint.name());
        if let Some(period) = key.period {
            path.push(period.as_str());
        }
        path.push(format!("{}.{}", key.subject.stem(), PARQUET_EXT));
        path
    }

    pub fn lock_path(&self, endpoint_name: &str, subject: &str) -> PathBuf {
        self.root
            .join(LOCK_DIR)
            .join(endpoint_name)
            .join(format!("{}.lock", subject))
    }

    pub fn constituents_path(&self) -> PathBuf {
        self.root
            .join(format!("{}sp500_constituents.{}", MEMBERSHIP_PREFIX, PARQUET_EXT))
    }

    pub fn unique_tickers_path(&self) -> PathBuf {
        self.root
            .join(format!("{}sp500_unique_tickers.{}", MEMBERSHIP_PREFIX, PARQUET_EXT))
    }

    /// Every partition file, sorted by path.
    ///
    /// Dot-directories and membership files are excluded.
    pub fn walk_partitions(&self) -> StoreResult<Vec<RawFile>> {
        let mut files = Vec::new();
        if !self.root.exists() {
            return Ok(files);
        }
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let entries = fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }
                let file_type = entry.file_type().map_err(|e| StoreError::io(&path, e))?;
                if file_type.is_dir() {
                    stack.push(path);
                } else if let Some(raw) = RawFile::classify(&self.root, path) {
                    files.push(raw);
                }
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

/// One partition file found by [`RawLayout::walk_partitions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub path: PathBuf,
    /// Endpoint directory name (the grandparent for period partitions).
    pub endpoint_dir: String,
    pub period: Option<PeriodType>,
    /// File stem: a ticker or `global`.
    pub subject: String,
}

impl RawFile {
    fn classify(root: &Path, path: PathBuf) -> Option<Self> {
        if path.extension().and_then(|e| e.to_str()) != Some(PARQUET_EXT) {
            return None;
        }
        let subject = path.file_stem()?.to_str()?.to_string();
        if subject.starts_with(MEMBERSHIP_PREFIX) {
            return None;
        }
        let parent = path.parent()?;
        if parent == root {
            return None;
        }
        let parent_name = parent.file_name()?.to_str()?;
        let (endpoint_dir, period) = match PeriodType::parse(parent_name) {
            Some(period) => (parent.parent()?.file_name()?.to_str()?.to_string(), Some(period)),
            None => (parent_name.to_string(), None),
        };
        Some(Self {
            path,
            endpoint_dir,
            period,
            subject,
        })
    }
}

/// Layout of the finished domain tables.
#[derive(Debug, Clone)]
pub struct DomainLayout {
    root: PathBuf,
}

impl DomainLayout {
    pub const FACTORS_TABLE: &'static str = "FAMA_FRENCH_FACTORS";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, PARQUET_EXT))
    }

    pub fn factors_path(&self) -> PathBuf {
        self.table_path(Self::FACTORS_TABLE)
    }

    pub fn default_worklist_path(&self) -> PathBuf {
        self.root.join("failures_all.csv")
    }

    /// Names of every table present, sorted.
    pub fn list_tables(&self) -> StoreResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&self.root, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PARQUET_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_common::{Endpoint, Subject};
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_partition_paths() {
        let layout = RawLayout::new("/data/raw");
        let key = PartitionKey::new(
            Endpoint::IncomeStatement,
            Subject::ticker("MSFT"),
            Some(PeriodType::Annual),
        );
        assert_eq!(
            layout.partition_path(&key),
            PathBuf::from("/data/raw/INCOME_STATEMENT/annual/MSFT.parquet")
        );
        let global = PartitionKey::unqualified(Endpoint::RealGdp, Subject::Global);
        assert_eq!(
            layout.partition_path(&global),
            PathBuf::from("/data/raw/REAL_GDP/global.parquet")
        );
        assert_eq!(
            layout.lock_path("CPI", "global"),
            PathBuf::from("/data/raw/.locks/CPI/global.lock")
        );
    }

    #[test]
    fn test_walk_classifies_and_excludes() {
        let dir = TempDir::new().unwrap();
        let layout = RawLayout::new(dir.path());
        touch(&dir.path().join("CASH_FLOW/quarterly/IBM.parquet"));
        touch(&dir.path().join("CASH_FLOW/IBM.parquet"));
        touch(&dir.path().join("TIME_SERIES_DAILY_ADJUSTED/AAPL.parquet"));
        touch(&dir.path().join("TIME_SERIES_DAILY_ADJUSTED/AAPL.parquet.tmp"));
        touch(&dir.path().join("wrds_sp500_constituents.parquet"));
        touch(&dir.path().join(".locks/CPI/global.parquet"));

        let files = layout.walk_partitions().unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].endpoint_dir, "CASH_FLOW");
        assert_eq!(files[0].period, None);
        assert_eq!(files[1].period, Some(PeriodType::Quarterly));
        assert_eq!(files[1].endpoint_dir, "CASH_FLOW");
        assert_eq!(files[2].subject, "AAPL");
    }

    #[test]
    fn test_list_tables_sorted() {
        let dir = TempDir::new().unwrap();
        let layout = DomainLayout::new(dir.path());
        touch(&layout.table_path("price_weekly"));
        touch(&layout.table_path("price_daily"));
        touch(&dir.path().join("failures_all.csv"));
        assert_eq!(layout.list_tables().unwrap(), vec!["price_daily", "price_weekly"]);
    }
}
