//! File Share Operations
//!
//! This module implements the operations behind the client (shares,
//! directories, ranged files, blobs, copies and signed URLs) on top of the
//! file and blob service contracts.

use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::connection::{ResourceLocator, StorageAccount};
use crate::errors::{FileShareError, Result};
use crate::protocol::*;
use crate::sas::{generate_sas, sign_uri};
use crate::service::{BlobService, FileService};
use crate::types::*;

/// Maps the outcome of a create call to "was created"
fn created(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_already_exists() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Maps the outcome of a delete call to "was deleted"
fn deleted(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Validates a share-relative path that must name an entry, not the root
fn entry_path(path: &str) -> Result<String> {
    let components = split_path(path)?;
    if components.is_empty() {
        return Err(FileShareError::InvalidArgument(
            "Path must name a file or directory".to_string(),
        ));
    }
    Ok(components.join("/"))
}

/// Handles all file share and blob operations
///
/// This struct is used internally by the Client.
pub struct Operations {
    account: StorageAccount,
    files: Arc<dyn FileService>,
    blobs: Arc<dyn BlobService>,
    operation_timeout: Duration,
    parallel_operations: usize,
    sas_expiry: Duration,
}

impl Operations {
    /// Creates a new Operations handler
    pub fn new(
        account: StorageAccount,
        files: Arc<dyn FileService>,
        blobs: Arc<dyn BlobService>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            account,
            files,
            blobs,
            operation_timeout: Duration::from_millis(config.operation_timeout),
            parallel_operations: config.parallel_operations.max(1),
            sas_expiry: config.sas_expiry,
        }
    }

    /// Account the operations run against
    pub fn account(&self) -> &StorageAccount {
        &self.account
    }

    /// Runs one service call under the operation timeout
    async fn timed<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout(self.operation_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout_ms = self.operation_timeout.as_millis() as u64, "service call timed out");
                Err(FileShareError::OperationTimeout(format!(
                    "{} did not complete within {:?}",
                    operation, self.operation_timeout
                )))
            }
        }
    }

    // Shares and directories

    /// Creates a share
    #[instrument(skip(self), level = "debug")]
    pub async fn create_share(&self, share: &str) -> Result<()> {
        validate_share_name(share)?;
        self.timed("create_share", self.files.create_share(share)).await?;
        info!(share, "share created");
        Ok(())
    }

    /// Creates a share unless it exists; returns whether it was created
    pub async fn create_share_if_not_exists(&self, share: &str) -> Result<bool> {
        created(self.create_share(share).await)
    }

    /// Deletes a share and everything in it
    #[instrument(skip(self), level = "debug")]
    pub async fn delete_share(&self, share: &str) -> Result<()> {
        validate_share_name(share)?;
        self.timed("delete_share", self.files.delete_share(share)).await?;
        info!(share, "share deleted");
        Ok(())
    }

    /// Deletes a share if it exists; returns whether it was deleted
    pub async fn delete_share_if_exists(&self, share: &str) -> Result<bool> {
        deleted(self.delete_share(share).await)
    }

    /// Reports whether a share exists
    pub async fn share_exists(&self, share: &str) -> Result<bool> {
        validate_share_name(share)?;
        self.timed("share_exists", self.files.share_exists(share)).await
    }

    /// Creates a directory whose parent exists
    #[instrument(skip(self), level = "debug")]
    pub async fn create_directory(&self, share: &str, path: &str) -> Result<()> {
        validate_share_name(share)?;
        let path = entry_path(path)?;
        self.timed("create_directory", self.files.create_directory(share, &path))
            .await?;
        info!(share, path = %path, "directory created");
        Ok(())
    }

    /// Creates a directory unless it exists; returns whether it was created
    pub async fn create_directory_if_not_exists(&self, share: &str, path: &str) -> Result<bool> {
        created(self.create_directory(share, path).await)
    }

    /// Deletes a directory, recursively when asked
    #[instrument(skip(self), level = "debug")]
    pub async fn delete_directory(&self, share: &str, path: &str, recursive: bool) -> Result<()> {
        validate_share_name(share)?;
        let path = entry_path(path)?;
        self.timed(
            "delete_directory",
            self.files.delete_directory(share, &path, recursive),
        )
        .await?;
        info!(share, path = %path, recursive, "directory deleted");
        Ok(())
    }

    /// Deletes an empty directory if it exists; returns whether it was deleted
    pub async fn delete_directory_if_exists(&self, share: &str, path: &str) -> Result<bool> {
        deleted(self.delete_directory(share, path, false).await)
    }

    /// Lists the entries of a directory; the empty path lists the share root
    #[instrument(skip(self), level = "debug")]
    pub async fn list_directory(&self, share: &str, path: &str) -> Result<Vec<ListItem>> {
        validate_share_name(share)?;
        let path = split_path(path)?.join("/");
        let items = self
            .timed("list_directory", self.files.list_directory(share, &path))
            .await?;
        debug!(share, path = %path, count = items.len(), "directory listed");
        Ok(items)
    }

    // Files

    /// Creates an empty file with a fixed maximum size
    #[instrument(skip(self), level = "debug")]
    pub async fn create_file(&self, share: &str, path: &str, max_size: u64) -> Result<()> {
        validate_share_name(share)?;
        let path = entry_path(path)?;
        check_file_size(max_size)?;
        self.timed("create_file", self.files.create_file(share, &path, max_size))
            .await?;
        info!(share, path = %path, max_size, "file created");
        Ok(())
    }

    /// Writes `data` at `offset`
    #[instrument(skip(self, data), fields(length = data.len()), level = "debug")]
    pub async fn write_range(&self, share: &str, path: &str, offset: u64, data: Bytes) -> Result<()> {
        validate_share_name(share)?;
        let path = entry_path(path)?;
        let range = range_header(offset, data.len() as u64);
        self.timed("write_range", self.files.write_range(share, &path, offset, data))
            .await?;
        debug!(share, path = %path, range = %range, "range written");
        Ok(())
    }

    /// Deallocates `length` bytes at `offset`
    #[instrument(skip(self), level = "debug")]
    pub async fn clear_range(&self, share: &str, path: &str, offset: u64, length: u64) -> Result<()> {
        validate_share_name(share)?;
        let path = entry_path(path)?;
        self.timed(
            "clear_range",
            self.files.clear_range(share, &path, offset, length),
        )
        .await?;
        debug!(share, path = %path, range = %range_header(offset, length), "range cleared");
        Ok(())
    }

    /// Reads `length` bytes at `offset`
    #[instrument(skip(self), level = "debug")]
    pub async fn read_range(&self, share: &str, path: &str, offset: u64, length: u64) -> Result<Bytes> {
        validate_share_name(share)?;
        let path = entry_path(path)?;
        self.timed(
            "read_range",
            self.files.read_range(share, &path, offset, length),
        )
        .await
    }

    /// Lists the aligned written ranges of a file
    #[instrument(skip(self), level = "debug")]
    pub async fn list_ranges(&self, share: &str, path: &str) -> Result<Vec<FileRange>> {
        validate_share_name(share)?;
        let path = entry_path(path)?;
        let ranges = self
            .timed("list_ranges", self.files.list_ranges(share, &path))
            .await?;
        debug!(share, path = %path, count = ranges.len(), "ranges listed");
        Ok(ranges)
    }

    /// Returns the properties of a file
    pub async fn get_file_properties(&self, share: &str, path: &str) -> Result<FileProperties> {
        validate_share_name(share)?;
        let path = entry_path(path)?;
        self.timed(
            "get_file_properties",
            self.files.get_file_properties(share, &path),
        )
        .await
    }

    /// Reports whether a file exists
    pub async fn file_exists(&self, share: &str, path: &str) -> Result<bool> {
        match self.get_file_properties(share, path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Deletes a file and all its ranges
    #[instrument(skip(self), level = "debug")]
    pub async fn delete_file(&self, share: &str, path: &str) -> Result<()> {
        validate_share_name(share)?;
        let path = entry_path(path)?;
        self.timed("delete_file", self.files.delete_file(share, &path))
            .await?;
        info!(share, path = %path, "file deleted");
        Ok(())
    }

    /// Deletes a file if it exists; returns whether it was deleted
    pub async fn delete_file_if_exists(&self, share: &str, path: &str) -> Result<bool> {
        deleted(self.delete_file(share, path).await)
    }

    /// Creates a file sized to `data` and writes it in ranges
    ///
    /// Ranges of at most `MAX_RANGE_WRITE_SIZE` bytes are written with up to
    /// `parallel_operations` requests in flight.
    #[instrument(skip(self, data), fields(length = data.len()), level = "debug")]
    pub async fn upload_buffer(&self, share: &str, path: &str, data: Bytes) -> Result<()> {
        if data.is_empty() {
            return Err(FileShareError::InvalidSize(0));
        }
        self.create_file(share, path, data.len() as u64).await?;

        let chunks: Vec<(u64, Bytes)> = (0..data.len())
            .step_by(MAX_RANGE_WRITE_SIZE)
            .map(|start| {
                let end = (start + MAX_RANGE_WRITE_SIZE).min(data.len());
                (start as u64, data.slice(start..end))
            })
            .collect();
        let count = chunks.len();

        stream::iter(chunks)
            .map(|(offset, chunk)| self.write_range(share, path, offset, chunk))
            .buffer_unordered(self.parallel_operations)
            .try_collect::<Vec<()>>()
            .await?;

        info!(share, path, bytes = data.len(), ranges = count, "file uploaded");
        Ok(())
    }

    /// Uploads a local file
    pub async fn upload_file(&self, share: &str, path: &str, local_filename: &Path) -> Result<()> {
        let data = read_file_content(local_filename).await?;
        self.upload_buffer(share, path, data).await
    }

    /// Downloads the full content of a file
    pub async fn download_file(&self, share: &str, path: &str) -> Result<Bytes> {
        let properties = self.get_file_properties(share, path).await?;
        self.read_range(share, path, 0, properties.content_length).await
    }

    /// Downloads a file into a local file, creating parent directories
    pub async fn download_to_file(&self, share: &str, path: &str, local_filename: &Path) -> Result<()> {
        let data = self.download_file(share, path).await?;
        write_file_content(local_filename, &data).await
    }

    // Blobs and copies

    /// Creates a blob container
    #[instrument(skip(self), level = "debug")]
    pub async fn create_container(&self, container: &str) -> Result<()> {
        validate_share_name(container)?;
        self.timed("create_container", self.blobs.create_container(container))
            .await?;
        info!(container, "container created");
        Ok(())
    }

    /// Creates a container unless it exists; returns whether it was created
    pub async fn create_container_if_not_exists(&self, container: &str) -> Result<bool> {
        created(self.create_container(container).await)
    }

    /// Deletes a container and its blobs
    #[instrument(skip(self), level = "debug")]
    pub async fn delete_container(&self, container: &str) -> Result<()> {
        validate_share_name(container)?;
        self.timed("delete_container", self.blobs.delete_container(container))
            .await?;
        info!(container, "container deleted");
        Ok(())
    }

    /// Deletes a container if it exists; returns whether it was deleted
    pub async fn delete_container_if_exists(&self, container: &str) -> Result<bool> {
        deleted(self.delete_container(container).await)
    }

    /// Uploads a blob
    #[instrument(skip(self, data), fields(length = data.len()), level = "debug")]
    pub async fn upload_blob(&self, container: &str, blob: &str, data: Bytes) -> Result<()> {
        validate_share_name(container)?;
        validate_blob_name(blob)?;
        self.timed("upload_blob", self.blobs.upload_blob(container, blob, data))
            .await
    }

    /// Downloads a blob
    pub async fn download_blob(&self, container: &str, blob: &str) -> Result<Bytes> {
        validate_share_name(container)?;
        validate_blob_name(blob)?;
        self.timed("download_blob", self.blobs.download_blob(container, blob))
            .await
    }

    /// Returns the properties of a blob
    pub async fn get_blob_properties(&self, container: &str, blob: &str) -> Result<BlobProperties> {
        validate_share_name(container)?;
        validate_blob_name(blob)?;
        self.timed(
            "get_blob_properties",
            self.blobs.get_blob_properties(container, blob),
        )
        .await
    }

    /// Returns the copy state of a blob, None if it never was a copy target
    pub async fn fetch_copy_state(&self, container: &str, blob: &str) -> Result<Option<CopyState>> {
        Ok(self.get_blob_properties(container, blob).await?.copy_state)
    }

    /// Deletes a blob
    #[instrument(skip(self), level = "debug")]
    pub async fn delete_blob(&self, container: &str, blob: &str) -> Result<()> {
        validate_share_name(container)?;
        validate_blob_name(blob)?;
        self.timed("delete_blob", self.blobs.delete_blob(container, blob))
            .await?;
        info!(container, blob, "blob deleted");
        Ok(())
    }

    /// Deletes a blob if it exists; returns whether it was deleted
    pub async fn delete_blob_if_exists(&self, container: &str, blob: &str) -> Result<bool> {
        deleted(self.delete_blob(container, blob).await)
    }

    /// Starts copying the resource behind a signed `source` URL into a blob
    #[instrument(skip(self, source), level = "debug")]
    pub async fn start_copy(&self, container: &str, blob: &str, source: &Url) -> Result<String> {
        validate_share_name(container)?;
        validate_blob_name(blob)?;
        let copy_id = self
            .timed("start_copy", self.blobs.start_copy(container, blob, source))
            .await?;
        info!(container, blob, copy_id = %copy_id, "copy started");
        Ok(copy_id)
    }

    /// Signs a file for reading and starts copying it into a blob
    pub async fn start_copy_from_file(
        &self,
        share: &str,
        path: &str,
        container: &str,
        blob: &str,
    ) -> Result<String> {
        let source = self.signed_file_uri(share, path, SasPermissions::READ)?;
        self.start_copy(container, blob, &source).await
    }

    /// Aborts a pending copy into a blob
    #[instrument(skip(self), level = "debug")]
    pub async fn abort_copy(&self, container: &str, blob: &str, copy_id: &str) -> Result<()> {
        validate_share_name(container)?;
        validate_blob_name(blob)?;
        match self
            .timed("abort_copy", self.blobs.abort_copy(container, blob, copy_id))
            .await
        {
            Ok(()) => {
                info!(container, blob, copy_id, "copy aborted");
                Ok(())
            }
            Err(e) => {
                warn!(container, blob, copy_id, code = e.error_code(), "copy abort rejected");
                Err(e)
            }
        }
    }

    // URIs and signatures

    /// URI of a file or directory in a share
    pub fn file_uri(&self, share: &str, path: &str) -> Result<Url> {
        validate_share_name(share)?;
        self.account.file_uri(share, &split_path(path)?.join("/"))
    }

    /// URI of a blob
    pub fn blob_uri(&self, container: &str, blob: &str) -> Result<Url> {
        validate_share_name(container)?;
        validate_blob_name(blob)?;
        self.account.blob_uri(container, blob)
    }

    fn file_locator(&self, share: &str, path: &str) -> Result<ResourceLocator> {
        validate_share_name(share)?;
        Ok(ResourceLocator::File {
            share: share.to_string(),
            path: entry_path(path)?,
        })
    }

    fn blob_locator(&self, container: &str, blob: &str) -> Result<ResourceLocator> {
        validate_share_name(container)?;
        validate_blob_name(blob)?;
        Ok(ResourceLocator::Blob {
            container: container.to_string(),
            blob: blob.to_string(),
        })
    }

    /// Default policy of client-issued signatures
    fn default_policy(&self, permissions: SasPermissions) -> SharedAccessPolicy {
        SharedAccessPolicy::valid_for(permissions, self.sas_expiry)
    }

    /// Signature token for a file under `policy`
    pub fn file_sas(&self, share: &str, path: &str, policy: &SharedAccessPolicy) -> Result<String> {
        generate_sas(&self.account, &self.file_locator(share, path)?, policy)
    }

    /// Signature token for a blob under `policy`
    pub fn blob_sas(&self, container: &str, blob: &str, policy: &SharedAccessPolicy) -> Result<String> {
        generate_sas(&self.account, &self.blob_locator(container, blob)?, policy)
    }

    /// File URI signed with `permissions` for the configured validity
    pub fn signed_file_uri(&self, share: &str, path: &str, permissions: SasPermissions) -> Result<Url> {
        let locator = self.file_locator(share, path)?;
        sign_uri(&self.account, &locator, &self.default_policy(permissions))
    }

    /// Read-only signature token for a file for the configured validity
    pub fn file_read_sas(&self, share: &str, path: &str) -> Result<String> {
        self.file_sas(share, path, &self.default_policy(SasPermissions::READ))
    }
}
