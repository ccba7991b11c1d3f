//! QuantLab pipeline configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the pipeline configuration file
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation
//! - Provider credential lookup
//! - Config snapshots and fingerprints for run logs

pub mod config;
pub mod credentials;
pub mod load;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use config::{
    DataConfig, EndpointPlan, EndpointsConfig, IngestConfig, PipelineConfig, ProviderConfig,
    QualityConfig, WindowConfig,
};
pub use credentials::{resolve_api_key, ApiKey, CredentialError, Credentials};
pub use load::{load_config_from_path, parse_config_str, ConfigFormat, LoadError};
pub use resolve::{resolve_config, resolve_paths, ConfigPaths, ConfigSource, ResolveError, ResolvedConfig};
pub use snapshot::{fingerprint, json_schema, ConfigSnapshot};
pub use validate::{validate, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
