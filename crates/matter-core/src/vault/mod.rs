//! Notes vault file access
//!
//! The sync engine only needs a handful of text-file operations, expressed by
//! the [`Vault`] trait. Paths are vault-relative and `/`-separated.
//!
//! Implementations:
//! - [`NativeVault`] - a directory on the local disk (tokio::fs)
//! - [`MemoryVault`] - in-memory, for tests

mod error;
mod memory;
mod native;

use async_trait::async_trait;

pub use error::{VaultError, VaultResult};
pub use memory::MemoryVault;
pub use native::NativeVault;

/// Text file operations on a notes vault
#[async_trait]
pub trait Vault: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &str) -> VaultResult<bool>;

    /// Read a UTF-8 text file
    async fn read(&self, path: &str) -> VaultResult<String>;

    /// Write a UTF-8 text file, replacing any previous content
    async fn write(&self, path: &str, content: &str) -> VaultResult<()>;

    /// Create a directory (and parents)
    async fn mkdir(&self, path: &str) -> VaultResult<()>;

    /// Move a file to a new path
    async fn rename(&self, from: &str, to: &str) -> VaultResult<()>;

    /// List the names of files (not directories) directly inside a directory
    async fn list(&self, dir: &str) -> VaultResult<Vec<String>>;

    /// Delete a file or an empty directory
    async fn remove(&self, path: &str) -> VaultResult<()>;
}

/// Normalize a vault-relative path
///
/// Converts backslashes, collapses repeated separators, drops `.` segments
/// and strips leading/trailing slashes. An empty result means the vault root.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a directory and a file name into a normalized vault path
pub fn join(dir: &str, name: &str) -> String {
    normalize_path(&format!("{}/{}", dir, name))
}
