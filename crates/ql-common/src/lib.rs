//! QuantLab common types, endpoint policy, and errors.
//!
//! This crate provides foundational types shared across the pipeline crates:
//! - Scalar values and the canonical row set
//! - The static endpoint policy table
//! - Raw partition addressing
//! - Common error types

pub mod endpoint;
pub mod error;
pub mod partition;
pub mod rowset;
pub mod schema;
pub mod value;

pub use endpoint::{ArgRule, Bucket, Endpoint, EndpointKind, EndpointPolicy};
pub use error::{Error, Result};
pub use partition::{PartitionKey, PartitionStatus, PeriodType, Subject};
pub use rowset::{Row, RowSet};
pub use schema::SCHEMA_VERSION;
pub use value::{normalize_field_name, parse_date, strip_numeric_prefix, Scalar};

/// Case-insensitive marker the provider embeds in rejected-call payloads.
pub const INVALID_API_CALL: &str = "invalid api call";

/// Reserved file-name prefix for constituent-membership data in the raw tree.
pub const MEMBERSHIP_PREFIX: &str = "wrds_";
