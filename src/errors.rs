//! File Share Error Definitions
//!
//! This module defines all error types for the file share client.
//! Errors are grouped into argument errors, resource-state errors, copy
//! protocol errors, account/authentication errors and transport errors.

use thiserror::Error;

/// Result type alias for file share operations
pub type Result<T> = std::result::Result<T, FileShareError>;

/// Base error type for all file share errors
#[derive(Error, Debug)]
pub enum FileShareError {
    /// Client has been closed
    #[error("Client is closed")]
    ClientClosed,

    /// Declared maximum file size is zero or above the service limit
    #[error("Invalid file size: {0}")]
    InvalidSize(u64),

    /// A range extends past the end of the file
    #[error("Range out of bounds: offset {offset} + length {length} exceeds file size {max_size}")]
    RangeOutOfBounds {
        /// First byte of the requested range
        offset: u64,
        /// Number of bytes requested
        length: u64,
        /// Declared maximum size of the file
        max_size: u64,
    },

    /// Abort was requested for a copy that already succeeded
    #[error("Copy already completed: {0}")]
    CopyAlreadyCompleted(String),

    /// Abort was requested for a blob without a pending copy
    #[error("No pending copy operation on {0}")]
    NoPendingCopy(String),

    /// Abort was requested with a copy id that does not match the pending copy
    #[error("Copy id mismatch: expected {expected}, got {actual}")]
    CopyIdMismatch {
        /// Id of the pending copy
        expected: String,
        /// Id supplied by the caller
        actual: String,
    },

    /// A copy onto the destination is still pending
    #[error("A copy operation is already pending on {0}")]
    CopyPending(String),

    /// Share, directory, file, container or blob does not exist
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Share, directory, file or container already exists
    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    /// A file stands where a directory was requested, or the reverse
    #[error("Resource type mismatch: {0}")]
    ResourceTypeMismatch(String),

    /// Directory still holds files or subdirectories
    #[error("Directory is not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Account connection string is malformed
    #[error("Invalid connection configuration: {0}")]
    ConnectionConfiguration(String),

    /// Signed access token is missing, expired, tampered or lacks permission
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid argument was provided
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Service call did not finish within the configured timeout
    #[error("Operation timed out: {0}")]
    OperationTimeout(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FileShareError {
    /// Returns the storage protocol error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            FileShareError::ClientClosed => "ClientClosed",
            FileShareError::InvalidSize(_) => "InvalidHeaderValue",
            FileShareError::RangeOutOfBounds { .. } => "InvalidRange",
            FileShareError::CopyAlreadyCompleted(_) => "NoPendingCopyOperation",
            FileShareError::NoPendingCopy(_) => "NoPendingCopyOperation",
            FileShareError::CopyIdMismatch { .. } => "CopyIdMismatch",
            FileShareError::CopyPending(_) => "PendingCopyOperation",
            FileShareError::ResourceNotFound(_) => "ResourceNotFound",
            FileShareError::ResourceAlreadyExists(_) => "ResourceAlreadyExists",
            FileShareError::ResourceTypeMismatch(_) => "ResourceTypeMismatch",
            FileShareError::DirectoryNotEmpty(_) => "DirectoryNotEmpty",
            FileShareError::ConnectionConfiguration(_) => "InvalidConnectionString",
            FileShareError::AuthenticationFailed(_) => "AuthenticationFailed",
            FileShareError::InvalidArgument(_) => "InvalidInput",
            FileShareError::OperationTimeout(_) => "OperationTimedOut",
            FileShareError::Io(_) => "IoError",
        }
    }

    /// Returns true when the error reports a missing resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, FileShareError::ResourceNotFound(_))
    }

    /// Returns true when the error reports an already existing resource
    pub fn is_already_exists(&self) -> bool {
        matches!(self, FileShareError::ResourceAlreadyExists(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = FileShareError::DirectoryNotEmpty("share/dir".to_string());
        assert_eq!(err.error_code(), "DirectoryNotEmpty");

        let err = FileShareError::RangeOutOfBounds {
            offset: 65_000,
            length: 1024,
            max_size: 65_536,
        };
        assert_eq!(err.error_code(), "InvalidRange");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(FileShareError::ResourceNotFound("share".to_string()).is_not_found());
        assert!(FileShareError::ResourceAlreadyExists("share".to_string()).is_already_exists());
        assert!(!FileShareError::ClientClosed.is_not_found());
    }

    #[test]
    fn test_type_mismatch_is_not_already_exists() {
        let err = FileShareError::ResourceTypeMismatch("share/thing".to_string());
        assert_eq!(err.error_code(), "ResourceTypeMismatch");
        assert!(!err.is_already_exists());
        assert!(!err.is_not_found());
    }
}
