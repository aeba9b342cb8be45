//! Error types for the sync engine.

use std::io;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// The engine's public operations never return these to the caller; they are
/// logged and folded into boolean outcomes. Component-level APIs (store,
/// marker, credentials) surface them directly.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The network or the remote store is unreachable.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// The remote store rejected or failed a request.
    #[error("store error: {message}")]
    Store {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The requested object does not exist in the remote store.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The remote store refused our credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A single upload or download failed.
    #[error("transfer of {key} failed: {message}")]
    Transfer {
        /// Remote key of the failed transfer.
        key: String,
        /// Error message.
        message: String,
    },

    /// Listing a remote prefix failed.
    #[error("listing {prefix} failed: {message}")]
    Listing {
        /// Prefix that was being listed.
        prefix: String,
        /// Error message.
        message: String,
    },

    /// The local asset tree could not be walked.
    #[error("scanning {path} failed: {message}")]
    Scan {
        /// Path that could not be read.
        path: String,
        /// Error message.
        message: String,
    },

    /// The offline marker could not be created or removed.
    #[error("offline marker I/O error: {0}")]
    Marker(#[source] io::Error),

    /// Local filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store returned a response we could not decode.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Credential material is missing or invalid.
    #[error("invalid credentials: {0}")]
    Credentials(String),

    /// A remote key cannot be mapped onto the local sync root.
    #[error("invalid remote key: {0}")]
    InvalidKey(String),
}

impl SyncError {
    /// Creates a retryable store error.
    pub fn store_retryable(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable store error.
    pub fn store_fatal(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried on a later cycle.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Store { retryable, .. } => *retryable,
            SyncError::Connectivity(_) => true,
            SyncError::Listing { .. } => true,
            SyncError::Scan { .. } => true,
            SyncError::Transfer { .. } => true,
            SyncError::Marker(_) => true,
            _ => false,
        }
    }
}
