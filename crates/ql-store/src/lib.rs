//! QuantLab storage.
//!
//! This crate provides:
//! - Conversion between row sets and Arrow record batches
//! - Atomic Parquet writes and reads, CSV via the Arrow codec
//! - Raw partition and domain-table path layout
//! - The Partition Writer and advisory partition locks

pub mod csv;
pub mod error;
pub mod layout;
pub mod lock;
pub mod parquet_io;
pub mod partition;
pub mod table;

pub use csv::{parse_csv, parse_csv_text, read_csv, write_csv, CellMode};
pub use error::{StoreError, StoreResult};
pub use layout::{DomainLayout, RawFile, RawLayout};
pub use lock::PartitionLock;
pub use parquet_io::{read_parquet, row_count, write_parquet};
pub use partition::{PartitionWriter, WrittenPartition};
pub use table::{from_record_batches, to_record_batch};
