//! Reading configuration files in TOML, YAML, or JSON.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::PipelineConfig;

/// Supported configuration formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(LoadError::UnsupportedFormat { extension: ext }),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported config format: {extension:?}")]
    UnsupportedFormat { extension: String },
    #[error("failed to parse {format} config: {message}")]
    Parse { format: String, message: String },
}

impl From<LoadError> for ql_common::Error {
    fn from(err: LoadError) -> Self {
        ql_common::Error::Config(err.to_string())
    }
}

/// Load a configuration file, picking the parser from the extension.
pub fn load_config_from_path(path: &Path) -> Result<PipelineConfig, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let format = ConfigFormat::from_path(path)?;
    parse_config_str(&content, format)
}

/// Parse configuration text. Blank input yields the defaults.
pub fn parse_config_str(content: &str, format: ConfigFormat) -> Result<PipelineConfig, LoadError> {
    if content.trim().is_empty() {
        return Ok(PipelineConfig::default());
    }
    let parse_err = |message: String| LoadError::Parse {
        format: format.as_str().to_string(),
        message,
    };
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string())),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
    }
}
