//! File Share Protocol Types and Constants
//!
//! This module defines the protocol-level constants and data structures
//! shared by the client, the service traits and the in-memory store.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Alignment unit of persisted file ranges in bytes
///
/// The file service stores written data in units of this size. Range
/// listings report boundaries rounded outward to this alignment.
pub const FILE_RANGE_ALIGNMENT: u64 = 512;

/// Largest maximum size a file may declare at creation (1 TiB)
pub const MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024 * 1024;

/// Largest payload a single range write carries during whole-file upload (4 MiB)
pub const MAX_RANGE_WRITE_SIZE: usize = 4 * 1024 * 1024;

/// Largest source a copy may read (256 MiB)
///
/// A copy materializes the whole source, holes included, as blob content
/// while the store is locked, so larger sources are refused.
pub const MAX_COPY_SOURCE_SIZE: u64 = 256 * 1024 * 1024;

/// Service version stamped into signed access tokens
pub const SAS_VERSION: &str = "2015-04-05";

/// Environment variable read by [`ClientConfig::from_env`]
pub const CONNECTION_STRING_ENV: &str = "STORAGE_CONNECTION_STRING";

/// Share and container name length limits
pub const MIN_CONTAINER_NAME_LEN: usize = 3;
pub const MAX_CONTAINER_NAME_LEN: usize = 63;

/// Maximum length of a single file or directory name
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Characters that may not appear in file or directory names
pub const INVALID_NAME_CHARS: &[char] = &['"', '\\', '/', ':', '|', '<', '>', '*', '?'];

/// A written region of a file, reported as a closed interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileRange {
    /// First byte of the range (inclusive)
    pub start_offset: u64,
    /// Last byte of the range (inclusive)
    pub end_offset: u64,
}

impl FileRange {
    /// Creates a range covering `start_offset..=end_offset`
    pub fn new(start_offset: u64, end_offset: u64) -> Self {
        Self {
            start_offset,
            end_offset,
        }
    }

    /// Number of bytes covered by the range
    pub fn length(&self) -> u64 {
        self.end_offset - self.start_offset + 1
    }
}

/// A file entry returned by a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    /// Name of the file within its directory
    pub name: String,
    /// Path of the file relative to the share root
    pub path: String,
    /// Declared maximum size of the file
    pub content_length: u64,
}

/// A directory entry returned by a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryItem {
    /// Name of the directory within its parent
    pub name: String,
    /// Path of the directory relative to the share root
    pub path: String,
}

/// An entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListItem {
    /// A file entry
    File(FileItem),
    /// A subdirectory entry
    Directory(DirectoryItem),
}

impl ListItem {
    /// Name of the entry within its directory
    pub fn name(&self) -> &str {
        match self {
            ListItem::File(file) => &file.name,
            ListItem::Directory(dir) => &dir.name,
        }
    }

    /// Path of the entry relative to the share root
    pub fn path(&self) -> &str {
        match self {
            ListItem::File(file) => &file.path,
            ListItem::Directory(dir) => &dir.path,
        }
    }

    /// Returns true for file entries
    pub fn is_file(&self) -> bool {
        matches!(self, ListItem::File(_))
    }

    /// Returns true for directory entries
    pub fn is_directory(&self) -> bool {
        matches!(self, ListItem::Directory(_))
    }
}

/// Properties of a file on a share
#[derive(Debug, Clone)]
pub struct FileProperties {
    /// Path of the file relative to the share root
    pub path: String,
    /// Declared maximum size of the file
    pub content_length: u64,
    /// Bytes covered by the file's reported ranges
    pub allocated_bytes: u64,
    /// Time of the last create, write or clear
    pub last_modified: DateTime<Utc>,
}

/// State of an asynchronous copy into a blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStatus {
    /// Copy is in progress
    Pending,
    /// Copy finished and the destination holds the source content
    Success,
    /// Copy was aborted; the destination is empty
    Aborted,
    /// Copy could not complete
    Failed,
}

impl CopyStatus {
    /// Protocol spelling of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyStatus::Pending => "pending",
            CopyStatus::Success => "success",
            CopyStatus::Aborted => "aborted",
            CopyStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Copy information attached to a destination blob
#[derive(Debug, Clone)]
pub struct CopyState {
    /// Opaque identifier returned when the copy was started
    pub copy_id: String,
    /// Current status of the copy
    pub status: CopyStatus,
    /// Source URI with the access signature removed
    pub source: String,
    /// Bytes copied so far
    pub bytes_copied: u64,
    /// Size of the source when the copy started
    pub total_bytes: u64,
    /// Time the copy reached a terminal status
    pub completion_time: Option<DateTime<Utc>>,
    /// Reason for a failed or aborted copy
    pub status_description: Option<String>,
}

/// Properties of a blob in a container
#[derive(Debug, Clone)]
pub struct BlobProperties {
    /// Name of the blob within its container
    pub name: String,
    /// Size of the blob content
    pub content_length: u64,
    /// Time of the last upload or copy transition
    pub last_modified: DateTime<Utc>,
    /// State of the last copy into this blob, if any
    pub copy_state: Option<CopyState>,
}

bitflags! {
    /// Permissions granted by a shared access signature
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SasPermissions: u8 {
        /// Read content, properties and copy sources
        const READ = 0b0000_0001;
        /// Create new files or blobs
        const CREATE = 0b0000_0010;
        /// Write content
        const WRITE = 0b0000_0100;
        /// Delete the resource
        const DELETE = 0b0000_1000;
        /// List directory or container contents
        const LIST = 0b0001_0000;
    }
}

impl SasPermissions {
    const SYMBOLS: [(SasPermissions, char); 5] = [
        (SasPermissions::READ, 'r'),
        (SasPermissions::CREATE, 'c'),
        (SasPermissions::WRITE, 'w'),
        (SasPermissions::DELETE, 'd'),
        (SasPermissions::LIST, 'l'),
    ];

    /// Encodes the permissions in canonical `rcwdl` order
    pub fn to_permission_string(&self) -> String {
        Self::SYMBOLS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, symbol)| *symbol)
            .collect()
    }

    /// Decodes a permission string; unknown symbols yield None
    pub fn from_permission_string(s: &str) -> Option<Self> {
        let mut permissions = SasPermissions::empty();
        for c in s.chars() {
            let (flag, _) = Self::SYMBOLS.iter().find(|(_, symbol)| *symbol == c)?;
            permissions |= *flag;
        }
        Some(permissions)
    }
}

/// Access policy of a shared access signature
#[derive(Debug, Clone)]
pub struct SharedAccessPolicy {
    /// Operations the signature allows
    pub permissions: SasPermissions,
    /// Time the signature becomes valid; valid immediately when None
    pub start: Option<DateTime<Utc>>,
    /// Time the signature stops being valid
    pub expiry: DateTime<Utc>,
}

impl SharedAccessPolicy {
    /// Creates a policy valid from now for the given duration
    pub fn valid_for(permissions: SasPermissions, validity: Duration) -> Self {
        let expiry = chrono::Duration::from_std(validity)
            .ok()
            .and_then(|validity| Utc::now().checked_add_signed(validity))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            permissions,
            start: None,
            expiry,
        }
    }
}

/// Client configuration options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Account connection string, `Key=Value` pairs separated by `;`
    pub connection_string: String,
    /// Timeout for a single service call in milliseconds
    pub operation_timeout: u64,
    /// Validity window of signed access tokens issued by the client
    pub sas_expiry: Duration,
    /// Maximum number of range writes in flight during whole-file upload
    pub parallel_operations: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            operation_timeout: 30000,
            sas_expiry: Duration::from_secs(24 * 60 * 60),
            parallel_operations: 4,
        }
    }
}

impl ClientConfig {
    /// Creates a new client configuration from an account connection string
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    /// Creates a configuration from the `STORAGE_CONNECTION_STRING` variable
    pub fn from_env() -> crate::Result<Self> {
        std::env::var(CONNECTION_STRING_ENV).map(Self::new).map_err(|_| {
            crate::FileShareError::ConnectionConfiguration(format!(
                "{} is not set",
                CONNECTION_STRING_ENV
            ))
        })
    }

    /// Sets the per-operation timeout in milliseconds
    pub fn with_operation_timeout(mut self, timeout: u64) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Sets the validity window of issued access tokens
    pub fn with_sas_expiry(mut self, expiry: Duration) -> Self {
        self.sas_expiry = expiry;
        self
    }

    /// Sets the number of range writes in flight during upload
    pub fn with_parallel_operations(mut self, parallel: usize) -> Self {
        self.parallel_operations = parallel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_string_order() {
        let perms = SasPermissions::LIST | SasPermissions::READ | SasPermissions::WRITE;
        assert_eq!(perms.to_permission_string(), "rwl");
        assert_eq!(SasPermissions::all().to_permission_string(), "rcwdl");
    }

    #[test]
    fn test_permission_string_parse() {
        assert_eq!(
            SasPermissions::from_permission_string("rw"),
            Some(SasPermissions::READ | SasPermissions::WRITE)
        );
        assert_eq!(
            SasPermissions::from_permission_string(""),
            Some(SasPermissions::empty())
        );
        assert_eq!(SasPermissions::from_permission_string("rx"), None);
    }

    #[test]
    fn test_file_range_len() {
        assert_eq!(FileRange::new(0, 511).length(), 512);
        assert_eq!(FileRange::new(1024, 2047).length(), 1024);
    }

    #[test]
    fn test_policy_valid_for() {
        let policy = SharedAccessPolicy::valid_for(SasPermissions::READ, Duration::from_secs(3600));
        let remaining = policy.expiry - Utc::now();
        assert!(remaining > chrono::Duration::minutes(59));
        assert!(remaining <= chrono::Duration::hours(1));
    }
}
