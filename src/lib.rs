//! File Share Rust Client Library
//!
//! Async client for a cloud file-share service and its companion blob
//! store, with an in-process backend for tests and demos.
//!
//! # Features
//!
//! - Shares, directories and fixed-size files with ranged writes
//! - Sparse files: unwritten regions read as zero and take no storage
//! - Range listing rounded outward to 512-byte boundaries
//! - Server-side copy into blob storage via signed URLs, with abort
//! - Shared access signature issuance and verification
//! - Idempotent create/delete variants
//! - Per-operation timeouts and structured logging via `tracing`
//!
//! # Example
//!
//! ```no_run
//! use fileshare::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("AccountName=demo;AccountKey=c2VjcmV0");
//!     let client = Client::new(config)?;
//!
//!     client.create_share_if_not_exists("share").await?;
//!     client.create_file("share", "sparse.bin", 65536).await?;
//!     client.write_range("share", "sparse.bin", 0, vec![1u8; 512].into()).await?;
//!     client.write_range("share", "sparse.bin", 1512, vec![2u8; 512].into()).await?;
//!
//!     for range in client.list_ranges("share", "sparse.bin").await? {
//!         println!("{}-{}", range.start_offset, range.end_offset);
//!     }
//!
//!     client.delete_share_if_exists("share").await?;
//!     client.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod client;
mod connection;
mod errors;
mod memory;
mod operations;
pub mod protocol;
pub mod sas;
mod service;
mod sparse;
mod types;

// Re-export public API
pub use client::Client;
pub use connection::{ResourceLocator, StorageAccount};
pub use errors::{FileShareError, Result};
pub use memory::MemoryStore;
pub use service::{BlobService, FileService};
pub use sparse::SparseFile;
pub use types::{
    BlobProperties, ClientConfig, CopyState, CopyStatus, DirectoryItem, FileItem, FileProperties,
    FileRange, ListItem, SasPermissions, SharedAccessPolicy, CONNECTION_STRING_ENV,
    FILE_RANGE_ALIGNMENT, MAX_COPY_SOURCE_SIZE, MAX_FILE_SIZE, MAX_RANGE_WRITE_SIZE, SAS_VERSION,
};
