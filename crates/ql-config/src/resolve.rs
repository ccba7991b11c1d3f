//! Config resolution (CLI → env → XDG → defaults).

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::load::{load_config_from_path, LoadError};
use crate::validate::{validate, ValidationError};

pub const ENV_CONFIG: &str = "QUANTLAB_CONFIG";
pub const ENV_DATA_DIR: &str = "QUANTLAB_DATA";
const DIR_NAME: &str = "quantlab";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("config file {path} does not exist")]
    Missing { path: PathBuf },
    #[error("unable to determine a data directory; set QUANTLAB_DATA")]
    DataDirUnavailable,
}

impl From<ResolveError> for ql_common::Error {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Invalid(v) => v.into(),
            other => ql_common::Error::Config(other.to_string()),
        }
    }
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Cli(PathBuf),
    Env(PathBuf),
    User(PathBuf),
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Cli(p) | ConfigSource::Env(p) | ConfigSource::User(p) => Some(p),
            ConfigSource::Defaults => None,
        }
    }
}

/// Resolved data directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub data_root: PathBuf,
    pub raw_dir: PathBuf,
    pub final_dir: PathBuf,
}

/// Fully resolved configuration with its provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: PipelineConfig,
    pub source: ConfigSource,
    pub paths: ConfigPaths,
}

/// Resolve the configuration file and data directories.
///
/// `explicit` is the `--config` argument; `data_root` the `--data-root` one.
pub fn resolve_config(
    explicit: Option<&Path>,
    data_root: Option<&Path>,
) -> Result<ResolvedConfig, ResolveError> {
    let source = locate_config(explicit)?;
    let config = match source.path() {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            load_config_from_path(path)?
        }
        None => {
            debug!("no configuration file found; using defaults");
            PipelineConfig::default()
        }
    };
    validate(&config)?;
    let paths = resolve_paths(&config, data_root)?;
    Ok(ResolvedConfig {
        config,
        source,
        paths,
    })
}

fn locate_config(explicit: Option<&Path>) -> Result<ConfigSource, ResolveError> {
    // 1) Explicit CLI path must exist
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ResolveError::Missing {
                path: path.to_path_buf(),
            });
        }
        return Ok(ConfigSource::Cli(path.to_path_buf()));
    }

    // 2) Environment override
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(ResolveError::Missing { path });
        }
        return Ok(ConfigSource::Env(path));
    }

    // 3) XDG_CONFIG_HOME, then the platform config dir
    let user = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .map(|base| base.join(DIR_NAME).join(CONFIG_FILE));
    if let Some(path) = user {
        if path.exists() {
            return Ok(ConfigSource::User(path));
        }
    }

    Ok(ConfigSource::Defaults)
}

/// Data root: CLI, then `QUANTLAB_DATA`, then config, then XDG/platform data dir.
pub fn resolve_paths(
    config: &PipelineConfig,
    cli_root: Option<&Path>,
) -> Result<ConfigPaths, ResolveError> {
    let data_root = match cli_root {
        Some(p) => p.to_path_buf(),
        None => resolve_data_root(config)?,
    };
    Ok(ConfigPaths {
        raw_dir: data_root.join(&config.data.raw_dir),
        final_dir: data_root.join(&config.data.final_dir),
        data_root,
    })
}

fn resolve_data_root(config: &PipelineConfig) -> Result<PathBuf, ResolveError> {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(root) = &config.data.root {
        return Ok(root.clone());
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return Ok(PathBuf::from(xdg).join(DIR_NAME));
    }
    if let Some(base) = dirs::data_dir() {
        return Ok(base.join(DIR_NAME));
    }
    Err(ResolveError::DataDirUnavailable)
}
