//! Provider credentials.
//!
//! The API key comes from the environment first, then from a credentials
//! file. The file is either a YAML map or plain `key=value` lines.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::config::ProviderConfig;

const KEY_STANDARD: &str = "alphavantage_api";
const KEY_PAID: &str = "alphavantage_api_paid";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to read credentials file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("provider API key not found (set {env} or add {key} to a credentials file)")]
    MissingKey { env: String, key: String },
}

impl From<CredentialError> for ql_common::Error {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::MissingKey { .. } => ql_common::Error::MissingCredential(err.to_string()),
            other => ql_common::Error::Config(other.to_string()),
        }
    }
}

/// A provider API key. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(***)")
    }
}

/// Flat string map read from a credentials file.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

impl Credentials {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        let raw = fs::read_to_string(path).map_err(|source| CredentialError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&raw))
    }

    /// Parse YAML, falling back to `key=value` lines when the text is not a map.
    pub fn parse(raw: &str) -> Self {
        if let Ok(serde_yaml::Value::Mapping(map)) = serde_yaml::from_str::<serde_yaml::Value>(raw)
        {
            let values = map
                .into_iter()
                .filter_map(|(k, v)| {
                    let key = k.as_str()?.to_string();
                    let value = match v {
                        serde_yaml::Value::String(s) => s,
                        serde_yaml::Value::Number(n) => n.to_string(),
                        serde_yaml::Value::Bool(b) => b.to_string(),
                        _ => return None,
                    };
                    Some((key, value))
                })
                .collect();
            return Self { values };
        }

        let mut values = BTreeMap::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((k, v)) = line.split_once('=') {
                let v = v.trim().trim_matches('"').trim_matches('\'');
                values.insert(k.trim().to_string(), v.to_string());
            }
        }
        Self { values }
    }
}

fn candidate_files(provider: &ProviderConfig) -> Vec<PathBuf> {
    if let Some(path) = &provider.credentials_file {
        return vec![path.clone()];
    }
    let mut out = Vec::new();
    if let Some(base) = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
    {
        out.push(base.join("quantlab").join("credentials.yml"));
        out.push(base.join("quantlab").join("credentials.yaml"));
    }
    out.push(PathBuf::from("credentials.yml"));
    out.push(PathBuf::from("config").join("credentials.yml"));
    out
}

/// Resolve the provider API key for this configuration.
pub fn resolve_api_key(provider: &ProviderConfig) -> Result<ApiKey, CredentialError> {
    let (env, key) = if provider.use_paid_key {
        (&provider.paid_key_env, KEY_PAID)
    } else {
        (&provider.key_env, KEY_STANDARD)
    };

    if let Ok(v) = std::env::var(env) {
        if !v.trim().is_empty() {
            return Ok(ApiKey::new(v.trim()));
        }
    }

    for path in candidate_files(provider) {
        if !path.exists() {
            continue;
        }
        let creds = Credentials::load(&path)?;
        info!(path = %path.display(), "loaded credentials");
        if let Some(v) = creds.get(key) {
            return Ok(ApiKey::new(v));
        }
    }

    Err(CredentialError::MissingKey {
        env: env.clone(),
        key: key.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_yaml_map() {
        let creds = Credentials::parse("alphavantage_api: abc\nalphavantage_api_paid: \"xyz\"\n");
        assert_eq!(creds.get("alphavantage_api"), Some("abc"));
        assert_eq!(creds.get("alphavantage_api_paid"), Some("xyz"));
    }

    #[test]
    fn parse_key_value_lines() {
        let creds = Credentials::parse("# comment\nalphavantage_api = 'k1'\nbroken line\n");
        assert_eq!(creds.get("alphavantage_api"), Some("k1"));
        assert_eq!(creds.get("broken line"), None);
    }

    #[test]
    fn resolve_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("creds.yml");
        fs::write(&path, "alphavantage_api_test_only: nope\nalphavantage_api: from-file\n").unwrap();
        let provider = ProviderConfig {
            key_env: "QL_TEST_UNSET_KEY_ENV_1".to_string(),
            use_paid_key: false,
            credentials_file: Some(path),
            ..ProviderConfig::default()
        };
        let key = resolve_api_key(&provider).unwrap();
        assert_eq!(key.expose(), "from-file");
        assert_eq!(format!("{:?}", key), "ApiKey(***)");
    }

    #[test]
    fn missing_key_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("creds.yml");
        fs::write(&path, "other: value\n").unwrap();
        let provider = ProviderConfig {
            paid_key_env: "QL_TEST_UNSET_KEY_ENV_2".to_string(),
            credentials_file: Some(path),
            ..ProviderConfig::default()
        };
        let err = resolve_api_key(&provider).unwrap_err();
        assert!(matches!(err, CredentialError::MissingKey { .. }));
        let common: ql_common::Error = err.into();
        assert!(common.is_fatal_config());
    }
}
