//! Config snapshots and fingerprints for run logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::PipelineConfig;
use crate::resolve::ResolvedConfig;

/// SHA-256 (hex) over the canonical JSON of a configuration.
pub fn fingerprint(config: &PipelineConfig) -> String {
    // Struct field order is fixed, so the serialization is canonical.
    let json = serde_json::to_string(config).unwrap_or_default();
    sha256_hex(json.as_bytes())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// JSON Schema of the configuration file.
pub fn json_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(PipelineConfig);
    serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
}

/// What a run was configured with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub schema_version: String,
    pub fingerprint: String,
    pub source: Option<String>,
    pub raw_dir: String,
    pub final_dir: String,
    pub captured_at: DateTime<Utc>,
}

impl ConfigSnapshot {
    pub fn capture(resolved: &ResolvedConfig) -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            fingerprint: fingerprint(&resolved.config),
            source: resolved.source.path().map(|p| p.display().to_string()),
            raw_dir: resolved.paths.raw_dir.display().to_string(),
            final_dir: resolved.paths.final_dir.display().to_string(),
            captured_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = PipelineConfig::default();
        let mut b = PipelineConfig::default();
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).len(), 64);
        b.ingest.pause_secs = 1.0;
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn schema_lists_sections() {
        let schema = json_schema();
        let props = schema.get("properties").expect("properties");
        for section in ["data", "window", "provider", "ingest", "endpoints", "quality"] {
            assert!(props.get(section).is_some(), "missing {section}");
        }
    }
}
