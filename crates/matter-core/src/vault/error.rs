//! Vault error handling
//!
//! Typed errors for file operations inside the notes vault, with
//! recovery suggestions for the ones a user can act on.

use std::io;
use thiserror::Error;

/// Errors that can occur while reading or writing vault files
#[derive(Error, Debug)]
pub enum VaultError {
    /// Path does not exist (when expected to)
    #[error("File not found: '{path}'")]
    NotFound { path: String },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'")]
    PermissionDenied {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error("Disk full or quota exceeded while writing to '{path}'")]
    DiskFull {
        path: String,
        #[source]
        source: io::Error,
    },

    /// File is not valid UTF-8 text
    #[error("'{path}' is not valid UTF-8 text")]
    InvalidText { path: String },

    /// Path escapes the vault root
    #[error("Path '{path}' is outside the vault")]
    OutsideVault { path: String },

    /// Rename failed
    #[error("Could not rename '{from}' to '{to}': {source}")]
    RenameFailed {
        from: String,
        to: String,
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl VaultError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.)
    pub fn from_io(error: io::Error, path: impl Into<String>) -> Self {
        let path = path.into();
        match error.kind() {
            io::ErrorKind::PermissionDenied => VaultError::PermissionDenied {
                path,
                source: error,
            },
            io::ErrorKind::NotFound => VaultError::NotFound { path },
            io::ErrorKind::InvalidData => VaultError::InvalidText { path },
            _ if is_disk_full_error(&error) => VaultError::DiskFull {
                path,
                source: error,
            },
            _ => VaultError::Io {
                path,
                source: error,
            },
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            VaultError::DiskFull { .. } => Some("Free up disk space and try again."),
            VaultError::PermissionDenied { .. } => {
                Some("Check file and directory permissions of the vault folder.")
            }
            VaultError::InvalidText { .. } => {
                Some("The file was modified outside the vault. Restore it or delete it to have it recreated.")
            }
            _ => None,
        }
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;
