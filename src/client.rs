//! File Share Client
//!
//! Main client struct for working with file shares, ranged files and the
//! companion blob store.

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

use crate::connection::StorageAccount;
use crate::errors::{FileShareError, Result};
use crate::memory::MemoryStore;
use crate::operations::Operations;
use crate::service::{BlobService, FileService};
use crate::types::*;

/// File share client
///
/// This client provides a high-level, async Rust API over a file service and
/// a blob service. It validates names, bounds every service call by the
/// configured timeout and reports failures as [`FileShareError`]s.
///
/// # Example
///
/// ```no_run
/// use fileshare::{Client, ClientConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ClientConfig::from_env()?;
///     let client = Client::new(config)?;
///
///     client.create_share_if_not_exists("share").await?;
///     client.upload_buffer("share", "hello.txt", b"Hello, share!".to_vec().into()).await?;
///     let data = client.download_file("share", "hello.txt").await?;
///     client.delete_file_if_exists("share", "hello.txt").await?;
///
///     client.close().await;
///     Ok(())
/// }
/// ```
pub struct Client {
    config: ClientConfig,
    ops: Arc<Operations>,
    closed: Arc<RwLock<bool>>,
}

impl Client {
    /// Creates a client backed by an in-process store for the configured account
    pub fn new(config: ClientConfig) -> Result<Self> {
        let account = Self::validate_config(&config)?;
        let store = Arc::new(MemoryStore::new(account.clone()));
        Ok(Self::from_parts(config, account, store.clone(), store))
    }

    /// Creates a client over the given file and blob services
    pub fn with_services(
        config: ClientConfig,
        files: Arc<dyn FileService>,
        blobs: Arc<dyn BlobService>,
    ) -> Result<Self> {
        let account = Self::validate_config(&config)?;
        Ok(Self::from_parts(config, account, files, blobs))
    }

    fn from_parts(
        config: ClientConfig,
        account: StorageAccount,
        files: Arc<dyn FileService>,
        blobs: Arc<dyn BlobService>,
    ) -> Self {
        let ops = Arc::new(Operations::new(account, files, blobs, &config));
        Self {
            config,
            ops,
            closed: Arc::new(RwLock::new(false)),
        }
    }

    /// Validates the client configuration and parses its account
    fn validate_config(config: &ClientConfig) -> Result<StorageAccount> {
        if config.connection_string.trim().is_empty() {
            return Err(FileShareError::ConnectionConfiguration(
                "Connection string is required".to_string(),
            ));
        }

        if config.operation_timeout == 0 {
            return Err(FileShareError::InvalidArgument(
                "Operation timeout must be positive".to_string(),
            ));
        }

        if config.parallel_operations == 0 {
            return Err(FileShareError::InvalidArgument(
                "Parallel operations must be at least 1".to_string(),
            ));
        }

        if config.sas_expiry.is_zero() {
            return Err(FileShareError::InvalidArgument(
                "Signature validity must be positive".to_string(),
            ));
        }

        StorageAccount::parse(&config.connection_string)
    }

    /// Checks if the client is closed
    async fn check_closed(&self) -> Result<()> {
        let closed = self.closed.read().await;
        if *closed {
            return Err(FileShareError::ClientClosed);
        }
        Ok(())
    }

    /// Returns the configuration the client was built with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the storage account the client talks to
    pub fn account(&self) -> &StorageAccount {
        self.ops.account()
    }

    /// Creates a share
    pub async fn create_share(&self, share: &str) -> Result<()> {
        self.check_closed().await?;
        self.ops.create_share(share).await
    }

    /// Creates a share unless it already exists
    ///
    /// Returns true if the share was created by this call.
    pub async fn create_share_if_not_exists(&self, share: &str) -> Result<bool> {
        self.check_closed().await?;
        self.ops.create_share_if_not_exists(share).await
    }

    /// Deletes a share together with its directories and files
    pub async fn delete_share(&self, share: &str) -> Result<()> {
        self.check_closed().await?;
        self.ops.delete_share(share).await
    }

    /// Deletes a share if it exists
    pub async fn delete_share_if_exists(&self, share: &str) -> Result<bool> {
        self.check_closed().await?;
        self.ops.delete_share_if_exists(share).await
    }

    /// Checks if a share exists
    pub async fn share_exists(&self, share: &str) -> Result<bool> {
        self.check_closed().await?;
        self.ops.share_exists(share).await
    }

    /// Creates a directory; its parent directory must exist
    pub async fn create_directory(&self, share: &str, path: &str) -> Result<()> {
        self.check_closed().await?;
        self.ops.create_directory(share, path).await
    }

    /// Creates a directory unless it already exists
    pub async fn create_directory_if_not_exists(&self, share: &str, path: &str) -> Result<bool> {
        self.check_closed().await?;
        self.ops.create_directory_if_not_exists(share, path).await
    }

    /// Deletes an empty directory if it exists
    ///
    /// Fails with `DirectoryNotEmpty` when the directory still has entries.
    pub async fn delete_directory_if_exists(&self, share: &str, path: &str) -> Result<bool> {
        self.check_closed().await?;
        self.ops.delete_directory_if_exists(share, path).await
    }

    /// Deletes a directory and everything below it
    pub async fn delete_directory_recursive(&self, share: &str, path: &str) -> Result<()> {
        self.check_closed().await?;
        self.ops.delete_directory(share, path, true).await
    }

    /// Lists the files and subdirectories of a directory
    ///
    /// The empty path lists the share root. Items come in name order.
    pub async fn list_files_and_directories(&self, share: &str, path: &str) -> Result<Vec<ListItem>> {
        self.check_closed().await?;
        self.ops.list_directory(share, path).await
    }

    /// Creates an empty file with a fixed maximum size
    ///
    /// An existing file at `path` is replaced.
    pub async fn create_file(&self, share: &str, path: &str, max_size: u64) -> Result<()> {
        self.check_closed().await?;
        self.ops.create_file(share, path, max_size).await
    }

    /// Writes `data` into a file starting at `offset`
    pub async fn write_range(&self, share: &str, path: &str, offset: u64, data: Bytes) -> Result<()> {
        self.check_closed().await?;
        self.ops.write_range(share, path, offset, data).await
    }

    /// Deallocates a region of a file
    pub async fn clear_range(&self, share: &str, path: &str, offset: u64, length: u64) -> Result<()> {
        self.check_closed().await?;
        self.ops.clear_range(share, path, offset, length).await
    }

    /// Reads a region of a file; unwritten bytes read as zero
    pub async fn read_range(&self, share: &str, path: &str, offset: u64, length: u64) -> Result<Bytes> {
        self.check_closed().await?;
        self.ops.read_range(share, path, offset, length).await
    }

    /// Lists the written ranges of a file, rounded outward to 512-byte boundaries
    pub async fn list_ranges(&self, share: &str, path: &str) -> Result<Vec<FileRange>> {
        self.check_closed().await?;
        self.ops.list_ranges(share, path).await
    }

    /// Retrieves the size, allocation and modification time of a file
    pub async fn get_file_properties(&self, share: &str, path: &str) -> Result<FileProperties> {
        self.check_closed().await?;
        self.ops.get_file_properties(share, path).await
    }

    /// Checks if a file exists
    pub async fn file_exists(&self, share: &str, path: &str) -> Result<bool> {
        self.check_closed().await?;
        self.ops.file_exists(share, path).await
    }

    /// Uploads data from a buffer as a new file of exactly that size
    pub async fn upload_buffer(&self, share: &str, path: &str, data: Bytes) -> Result<()> {
        self.check_closed().await?;
        self.ops.upload_buffer(share, path, data).await
    }

    /// Uploads a file from the local filesystem
    pub async fn upload_file(&self, share: &str, path: &str, local_filename: impl AsRef<Path>) -> Result<()> {
        self.check_closed().await?;
        self.ops.upload_file(share, path, local_filename.as_ref()).await
    }

    /// Downloads a file and returns its content
    pub async fn download_file(&self, share: &str, path: &str) -> Result<Bytes> {
        self.check_closed().await?;
        self.ops.download_file(share, path).await
    }

    /// Downloads a file and saves it to the local filesystem
    pub async fn download_to_file(&self, share: &str, path: &str, local_filename: impl AsRef<Path>) -> Result<()> {
        self.check_closed().await?;
        self.ops.download_to_file(share, path, local_filename.as_ref()).await
    }

    /// Deletes a file
    pub async fn delete_file(&self, share: &str, path: &str) -> Result<()> {
        self.check_closed().await?;
        self.ops.delete_file(share, path).await
    }

    /// Deletes a file if it exists
    ///
    /// Returns false, without error, when there was nothing to delete.
    pub async fn delete_file_if_exists(&self, share: &str, path: &str) -> Result<bool> {
        self.check_closed().await?;
        self.ops.delete_file_if_exists(share, path).await
    }

    /// Creates a blob container
    pub async fn create_container(&self, container: &str) -> Result<()> {
        self.check_closed().await?;
        self.ops.create_container(container).await
    }

    /// Creates a blob container unless it already exists
    pub async fn create_container_if_not_exists(&self, container: &str) -> Result<bool> {
        self.check_closed().await?;
        self.ops.create_container_if_not_exists(container).await
    }

    /// Deletes a blob container if it exists
    pub async fn delete_container_if_exists(&self, container: &str) -> Result<bool> {
        self.check_closed().await?;
        self.ops.delete_container_if_exists(container).await
    }

    /// Uploads a blob
    pub async fn upload_blob(&self, container: &str, blob: &str, data: Bytes) -> Result<()> {
        self.check_closed().await?;
        self.ops.upload_blob(container, blob, data).await
    }

    /// Downloads a blob
    pub async fn download_blob(&self, container: &str, blob: &str) -> Result<Bytes> {
        self.check_closed().await?;
        self.ops.download_blob(container, blob).await
    }

    /// Retrieves the properties of a blob
    pub async fn get_blob_properties(&self, container: &str, blob: &str) -> Result<BlobProperties> {
        self.check_closed().await?;
        self.ops.get_blob_properties(container, blob).await
    }

    /// Deletes a blob if it exists
    pub async fn delete_blob_if_exists(&self, container: &str, blob: &str) -> Result<bool> {
        self.check_closed().await?;
        self.ops.delete_blob_if_exists(container, blob).await
    }

    /// Starts copying the resource behind a signed URL into a blob
    ///
    /// Returns the copy id used to abort the copy.
    pub async fn start_copy(&self, container: &str, blob: &str, source: &Url) -> Result<String> {
        self.check_closed().await?;
        self.ops.start_copy(container, blob, source).await
    }

    /// Starts copying a share file into a blob, signing the file for reading
    pub async fn start_copy_from_file(
        &self,
        share: &str,
        path: &str,
        container: &str,
        blob: &str,
    ) -> Result<String> {
        self.check_closed().await?;
        self.ops.start_copy_from_file(share, path, container, blob).await
    }

    /// Retrieves the copy state of a blob
    pub async fn fetch_copy_state(&self, container: &str, blob: &str) -> Result<Option<CopyState>> {
        self.check_closed().await?;
        self.ops.fetch_copy_state(container, blob).await
    }

    /// Aborts a pending copy into a blob
    ///
    /// Fails with `CopyAlreadyCompleted` when the copy already succeeded.
    pub async fn abort_copy(&self, container: &str, blob: &str, copy_id: &str) -> Result<()> {
        self.check_closed().await?;
        self.ops.abort_copy(container, blob, copy_id).await
    }

    /// URI of a file or directory
    pub fn file_uri(&self, share: &str, path: &str) -> Result<Url> {
        self.ops.file_uri(share, path)
    }

    /// URI of a blob
    pub fn blob_uri(&self, container: &str, blob: &str) -> Result<Url> {
        self.ops.blob_uri(container, blob)
    }

    /// URI of an item returned by a directory listing
    pub fn item_uri(&self, share: &str, item: &ListItem) -> Result<Url> {
        self.ops.file_uri(share, item.path())
    }

    /// Read-only signature token for a file, valid for the configured expiry
    ///
    /// Append it to the file URI as its query string to obtain a copy source.
    pub fn generate_file_sas(&self, share: &str, path: &str) -> Result<String> {
        self.ops.file_read_sas(share, path)
    }

    /// Signature token for a file under a custom policy
    pub fn generate_file_sas_with_policy(
        &self,
        share: &str,
        path: &str,
        policy: &SharedAccessPolicy,
    ) -> Result<String> {
        self.ops.file_sas(share, path, policy)
    }

    /// Signature token for a blob under a custom policy
    pub fn generate_blob_sas_with_policy(
        &self,
        container: &str,
        blob: &str,
        policy: &SharedAccessPolicy,
    ) -> Result<String> {
        self.ops.blob_sas(container, blob, policy)
    }

    /// File URI carrying a signature with the given permissions
    pub fn signed_file_uri(&self, share: &str, path: &str, permissions: SasPermissions) -> Result<Url> {
        self.ops.signed_file_uri(share, path, permissions)
    }

    /// Closes the client
    ///
    /// After calling close, all service operations will return ClientClosed
    /// error. It's safe to call close multiple times.
    pub async fn close(&self) {
        let mut closed = self.closed.write().await;
        if *closed {
            return;
        }
        *closed = true;
    }
}
