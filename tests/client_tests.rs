//! Unit tests for the file share client
//!
//! This test module verifies the client's behavior including configuration validation,
//! lifecycle management, and error handling for various edge cases.

use async_trait::async_trait;
use bytes::Bytes;
use fileshare::{
    Client, ClientConfig, FileProperties, FileRange, FileService, FileShareError, ListItem,
    MemoryStore, Result, StorageAccount,
};
use std::sync::Arc;
use std::time::Duration;

const CONNECTION_STRING: &str =
    "DefaultEndpointsProtocol=https;AccountName=demo;AccountKey=c2VjcmV0LWtleS1mb3ItdGVzdHM=;EndpointSuffix=core.windows.net";

/// Test suite for client configuration
///
/// These tests verify that the client correctly validates configuration
/// and applies default values where appropriate.
#[cfg(test)]
mod config_tests {
    use super::*;

    /// Test creating client with valid configuration
    #[test]
    fn test_client_creation_valid_config() {
        // Arrange: Create valid configuration
        let config = ClientConfig::new(CONNECTION_STRING);

        // Act: Create client
        let result = Client::new(config);

        // Assert: Verify client creation succeeds
        assert!(result.is_ok(), "Client should be created with valid config");
        assert_eq!(result.unwrap().account().name(), "demo");
    }

    /// Test creating client with an empty connection string
    ///
    /// This test verifies that the client rejects configurations
    /// with no account settings.
    #[test]
    fn test_client_creation_empty_connection_string() {
        // Arrange: Create config with empty connection string
        let config = ClientConfig::new("");

        // Act: Attempt to create client
        let result = Client::new(config);

        // Assert: Verify creation fails with a configuration error
        assert!(
            matches!(result, Err(FileShareError::ConnectionConfiguration(_))),
            "Client creation should fail without a connection string"
        );
    }

    /// Test creating client with a connection string missing the account key
    #[test]
    fn test_client_creation_missing_key() {
        // Arrange: Create config without AccountKey
        let config = ClientConfig::new("AccountName=demo");

        // Act: Attempt to create client
        let result = Client::new(config);

        // Assert: Verify creation fails
        assert!(
            matches!(result, Err(FileShareError::ConnectionConfiguration(_))),
            "Client creation should fail without an account key"
        );
    }

    /// Test that zero-valued settings are rejected
    #[test]
    fn test_client_creation_invalid_settings() {
        let config = ClientConfig::new(CONNECTION_STRING).with_operation_timeout(0);
        assert!(Client::new(config).is_err(), "Zero timeout should be rejected");

        let config = ClientConfig::new(CONNECTION_STRING).with_parallel_operations(0);
        assert!(Client::new(config).is_err(), "Zero parallelism should be rejected");

        let config = ClientConfig::new(CONNECTION_STRING).with_sas_expiry(Duration::ZERO);
        assert!(Client::new(config).is_err(), "Zero signature validity should be rejected");
    }

    /// Test that a client over supplied services validates its configuration
    #[test]
    fn test_with_services_validates_config() {
        // Arrange: Services for the demo account
        let account = StorageAccount::parse(CONNECTION_STRING).unwrap();
        let store = Arc::new(MemoryStore::new(account));

        // Act: Build clients with a valid and an invalid configuration
        let valid = Client::with_services(ClientConfig::new(CONNECTION_STRING), store.clone(), store.clone());
        let invalid = Client::with_services(ClientConfig::new("AccountName=demo"), store.clone(), store);

        // Assert: Only the valid configuration yields a client
        assert_eq!(valid.unwrap().account().name(), "demo");
        assert!(matches!(invalid, Err(FileShareError::ConnectionConfiguration(_))));
    }

    /// Test configuration builder pattern
    ///
    /// This test verifies that the configuration builder methods
    /// correctly set custom values for all configuration options.
    #[test]
    fn test_config_builder() {
        // Arrange & Act: Build config with custom values
        let config = ClientConfig::new(CONNECTION_STRING)
            .with_operation_timeout(60000)
            .with_sas_expiry(Duration::from_secs(3600))
            .with_parallel_operations(8);

        // Assert: Verify all custom values are set
        assert_eq!(config.operation_timeout, 60000, "Operation timeout should be set to 60000");
        assert_eq!(config.sas_expiry, Duration::from_secs(3600), "Signature validity should be one hour");
        assert_eq!(config.parallel_operations, 8, "Parallel operations should be set to 8");
    }

    /// Test default configuration values
    #[test]
    fn test_config_defaults() {
        // Arrange & Act: Create config with only a connection string
        let config = ClientConfig::new(CONNECTION_STRING);

        // Assert: Verify default values are applied
        assert_eq!(config.operation_timeout, 30000, "Default operation_timeout should be 30000ms");
        assert_eq!(
            config.sas_expiry,
            Duration::from_secs(24 * 60 * 60),
            "Default signature validity should be 24 hours"
        );
        assert_eq!(config.parallel_operations, 4, "Default parallel_operations should be 4");
    }
}

/// Test suite for client lifecycle management
///
/// These tests verify that the client properly manages its lifecycle,
/// including initialization, operation, and shutdown.
#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    /// Test closing the client
    ///
    /// This test verifies that the client can be closed and that
    /// subsequent operations fail with appropriate errors.
    #[tokio::test]
    async fn test_client_close() {
        // Arrange: Create client
        let client = Client::new(ClientConfig::new(CONNECTION_STRING)).unwrap();

        // Act: Close the client
        client.close().await;

        // Assert: Operations after close should fail
        let result = client.create_share("share").await;
        assert!(
            matches!(result, Err(FileShareError::ClientClosed)),
            "Operations after close should return ClientClosed"
        );
    }

    /// Test that close is idempotent
    #[tokio::test]
    async fn test_client_close_idempotent() {
        // Arrange: Create client
        let client = Client::new(ClientConfig::new(CONNECTION_STRING)).unwrap();

        // Act: Close multiple times
        client.close().await;
        client.close().await;
        client.close().await;

        // Assert: No panic should occur (test passes if we reach here)
    }
}

/// Test suite for error handling
///
/// These tests verify that the client properly handles various error
/// conditions and returns appropriate error types.
#[cfg(test)]
mod error_tests {
    use super::*;

    /// Test share name validation
    #[tokio::test]
    async fn test_invalid_share_name() {
        // Arrange: Create client
        let client = Client::new(ClientConfig::new(CONNECTION_STRING)).unwrap();

        // Act: Attempt to create shares with invalid names
        let upper = client.create_share("Share").await;
        let short = client.create_share("ab").await;

        // Assert: Should fail with InvalidArgument
        assert!(matches!(upper, Err(FileShareError::InvalidArgument(_))));
        assert!(matches!(short, Err(FileShareError::InvalidArgument(_))));

        // Cleanup
        client.close().await;
    }

    /// Test operations on a share that does not exist
    #[tokio::test]
    async fn test_missing_share() {
        let client = Client::new(ClientConfig::new(CONNECTION_STRING)).unwrap();

        let result = client.create_directory("missing", "dir").await;
        assert!(matches!(result, Err(FileShareError::ResourceNotFound(_))));

        let result = client.download_file("missing", "file.txt").await;
        assert!(matches!(result, Err(FileShareError::ResourceNotFound(_))));
    }

    /// Test invalid file sizes
    ///
    /// This test verifies that zero and oversized files are rejected with
    /// InvalidSize before reaching the service.
    #[tokio::test]
    async fn test_invalid_file_size() {
        let client = Client::new(ClientConfig::new(CONNECTION_STRING)).unwrap();
        client.create_share("share").await.unwrap();

        let result = client.create_file("share", "empty.bin", 0).await;
        assert!(matches!(result, Err(FileShareError::InvalidSize(0))));

        let result = client.create_file("share", "huge.bin", fileshare::MAX_FILE_SIZE + 1).await;
        assert!(matches!(result, Err(FileShareError::InvalidSize(_))));

        let result = client.upload_buffer("share", "empty.txt", bytes::Bytes::new()).await;
        assert!(matches!(result, Err(FileShareError::InvalidSize(0))));
    }

    /// Test that a path must name an entry
    #[tokio::test]
    async fn test_root_path_rejected() {
        let client = Client::new(ClientConfig::new(CONNECTION_STRING)).unwrap();
        client.create_share("share").await.unwrap();

        let result = client.create_file("share", "", 512).await;
        assert!(matches!(result, Err(FileShareError::InvalidArgument(_))));

        let result = client.create_directory("share", "bad:name").await;
        assert!(matches!(result, Err(FileShareError::InvalidArgument(_))));
    }

    /// File service whose share creation outlasts any short timeout
    struct SlowFileService {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait]
    impl FileService for SlowFileService {
        async fn create_share(&self, share: &str) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.create_share(share).await
        }

        async fn delete_share(&self, share: &str) -> Result<()> {
            self.inner.delete_share(share).await
        }

        async fn share_exists(&self, share: &str) -> Result<bool> {
            self.inner.share_exists(share).await
        }

        async fn create_directory(&self, share: &str, path: &str) -> Result<()> {
            self.inner.create_directory(share, path).await
        }

        async fn delete_directory(&self, share: &str, path: &str, recursive: bool) -> Result<()> {
            self.inner.delete_directory(share, path, recursive).await
        }

        async fn list_directory(&self, share: &str, path: &str) -> Result<Vec<ListItem>> {
            self.inner.list_directory(share, path).await
        }

        async fn create_file(&self, share: &str, path: &str, max_size: u64) -> Result<()> {
            self.inner.create_file(share, path, max_size).await
        }

        async fn get_file_properties(&self, share: &str, path: &str) -> Result<FileProperties> {
            self.inner.get_file_properties(share, path).await
        }

        async fn write_range(&self, share: &str, path: &str, offset: u64, data: Bytes) -> Result<()> {
            self.inner.write_range(share, path, offset, data).await
        }

        async fn clear_range(&self, share: &str, path: &str, offset: u64, length: u64) -> Result<()> {
            self.inner.clear_range(share, path, offset, length).await
        }

        async fn read_range(&self, share: &str, path: &str, offset: u64, length: u64) -> Result<Bytes> {
            self.inner.read_range(share, path, offset, length).await
        }

        async fn list_ranges(&self, share: &str, path: &str) -> Result<Vec<FileRange>> {
            self.inner.list_ranges(share, path).await
        }

        async fn delete_file(&self, share: &str, path: &str) -> Result<()> {
            self.inner.delete_file(share, path).await
        }
    }

    /// Test that a service call exceeding the operation timeout fails
    ///
    /// This test verifies that a slow service surfaces OperationTimeout
    /// instead of blocking the caller, and that faster calls still succeed.
    #[tokio::test]
    async fn test_operation_timeout() {
        // Arrange: Client with a 50ms timeout over a file service that takes 500ms
        let account = StorageAccount::parse(CONNECTION_STRING).unwrap();
        let files = Arc::new(SlowFileService {
            inner: MemoryStore::new(account.clone()),
            delay: Duration::from_millis(500),
        });
        let blobs = Arc::new(MemoryStore::new(account));
        let config = ClientConfig::new(CONNECTION_STRING).with_operation_timeout(50);
        let client = Client::with_services(config, files, blobs).unwrap();

        // Act: Create a share through the slow call
        let result = client.create_share("share").await;

        // Assert: The call times out while unaffected calls still answer
        assert!(
            matches!(result, Err(FileShareError::OperationTimeout(_))),
            "Slow service call should time out, got {:?}",
            result
        );
        assert!(!client.share_exists("share").await.unwrap());
    }
}
