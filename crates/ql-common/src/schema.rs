//! Version stamp for files written by the pipeline.

/// Stored in the key-value metadata of every Parquet file we write.
///
/// The major component changes when a reader of the previous version could
/// no longer make sense of the columns.
pub const SCHEMA_VERSION: &str = "1.0.0";

fn major(version: &str) -> Option<u32> {
    version.trim().split('.').next()?.parse().ok()
}

/// Whether a stamp read back from disk shares our major version.
///
/// Unparseable stamps are incompatible.
pub fn is_compatible(version: &str) -> bool {
    match (major(SCHEMA_VERSION), major(version)) {
        (Some(ours), Some(theirs)) => ours == theirs,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_version_decides() {
        assert!(is_compatible("1.0.0"));
        assert!(is_compatible("1.7.3"));
        assert!(!is_compatible("2.0.0"));
        assert!(!is_compatible("0.9.1"));
        assert!(!is_compatible("garbage"));
    }
}
