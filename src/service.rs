//! Storage Service Contracts
//!
//! The client talks to two remote stores: the file service (shares,
//! directories and sparse files) and the blob service (containers, blobs and
//! asynchronous copies). Each is a request/response contract; an
//! implementation may be a network client or the in-process
//! [`MemoryStore`](crate::MemoryStore).
//!
//! Service calls are strict: creating an existing resource fails with
//! `ResourceAlreadyExists` and removing a missing one with `ResourceNotFound`.
//! The idempotent `*_if_not_exists` / `*_if_exists` forms live in the client.
//!
//! Paths are share-relative, `/`-separated and already validated; the empty
//! path names the share root.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::errors::Result;
use crate::types::{BlobProperties, FileProperties, FileRange, ListItem};

/// Operations of the file service
#[async_trait]
pub trait FileService: Send + Sync {
    /// Creates an empty share
    async fn create_share(&self, share: &str) -> Result<()>;

    /// Deletes a share and everything it holds
    async fn delete_share(&self, share: &str) -> Result<()>;

    /// Reports whether a share exists
    async fn share_exists(&self, share: &str) -> Result<bool>;

    /// Creates a directory; its parent must exist
    async fn create_directory(&self, share: &str, path: &str) -> Result<()>;

    /// Deletes a directory
    ///
    /// Without `recursive` the directory must be empty, otherwise the call
    /// fails with `DirectoryNotEmpty`.
    async fn delete_directory(&self, share: &str, path: &str, recursive: bool) -> Result<()>;

    /// Lists the files and subdirectories of a directory in name order
    async fn list_directory(&self, share: &str, path: &str) -> Result<Vec<ListItem>>;

    /// Creates (or replaces) an empty file with the given maximum size
    async fn create_file(&self, share: &str, path: &str, max_size: u64) -> Result<()>;

    /// Returns the properties of a file
    async fn get_file_properties(&self, share: &str, path: &str) -> Result<FileProperties>;

    /// Writes `data` into a file starting at `offset`
    async fn write_range(&self, share: &str, path: &str, offset: u64, data: Bytes) -> Result<()>;

    /// Deallocates `length` bytes of a file starting at `offset`
    async fn clear_range(&self, share: &str, path: &str, offset: u64, length: u64) -> Result<()>;

    /// Reads `length` bytes of a file starting at `offset`
    async fn read_range(&self, share: &str, path: &str, offset: u64, length: u64) -> Result<Bytes>;

    /// Lists the written ranges of a file, rounded to the range alignment
    async fn list_ranges(&self, share: &str, path: &str) -> Result<Vec<FileRange>>;

    /// Deletes a file and all its ranges
    async fn delete_file(&self, share: &str, path: &str) -> Result<()>;
}

/// Operations of the blob service
#[async_trait]
pub trait BlobService: Send + Sync {
    /// Creates an empty container
    async fn create_container(&self, container: &str) -> Result<()>;

    /// Deletes a container and all its blobs
    async fn delete_container(&self, container: &str) -> Result<()>;

    /// Stores `data` as the content of a blob, replacing any previous blob
    async fn upload_blob(&self, container: &str, blob: &str, data: Bytes) -> Result<()>;

    /// Returns the content of a blob
    async fn download_blob(&self, container: &str, blob: &str) -> Result<Bytes>;

    /// Returns the properties of a blob, including its copy state
    async fn get_blob_properties(&self, container: &str, blob: &str) -> Result<BlobProperties>;

    /// Starts an asynchronous copy from `source` into a blob
    ///
    /// `source` must carry a read signature. Returns the copy id; the
    /// destination reports `CopyStatus::Pending` until the copy finishes.
    /// Sources larger than `MAX_COPY_SOURCE_SIZE` fail with `InvalidSize`.
    async fn start_copy(&self, container: &str, blob: &str, source: &Url) -> Result<String>;

    /// Aborts the pending copy `copy_id` into a blob
    async fn abort_copy(&self, container: &str, blob: &str, copy_id: &str) -> Result<()>;

    /// Deletes a blob
    async fn delete_blob(&self, container: &str, blob: &str) -> Result<()>;
}
