//! Vault backed by a directory on the local disk
//!
//! Writes are atomic: content goes to a temporary sibling file which is then
//! renamed over the target, so a crash never leaves a half-written note.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{normalize_path, Vault, VaultError, VaultResult};

/// Suffix for in-flight temporary files
const TEMP_SUFFIX: &str = ".matter-tmp";

/// A notes vault rooted at a local directory
#[derive(Debug, Clone)]
pub struct NativeVault {
    root: PathBuf,
}

impl NativeVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The vault root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a vault-relative path to a filesystem path
    fn full_path(&self, path: &str) -> VaultResult<PathBuf> {
        let normalized = normalize_path(path);
        if normalized.split('/').any(|segment| segment == "..") {
            return Err(VaultError::OutsideVault {
                path: path.to_string(),
            });
        }

        if normalized.is_empty() {
            Ok(self.root.clone())
        } else {
            Ok(self.root.join(normalized))
        }
    }
}

#[async_trait]
impl Vault for NativeVault {
    async fn exists(&self, path: &str) -> VaultResult<bool> {
        let full_path = self.full_path(path)?;
        fs::try_exists(&full_path)
            .await
            .map_err(|e| VaultError::from_io(e, path))
    }

    async fn read(&self, path: &str) -> VaultResult<String> {
        let full_path = self.full_path(path)?;
        fs::read_to_string(&full_path)
            .await
            .map_err(|e| VaultError::from_io(e, path))
    }

    async fn write(&self, path: &str, content: &str) -> VaultResult<()> {
        let full_path = self.full_path(path)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| VaultError::from_io(e, path))?;
        }

        let temp_path = format!("{}{}", normalize_path(path), TEMP_SUFFIX);
        let temp_full_path = self.full_path(&temp_path)?;

        let mut file = fs::File::create(&temp_full_path)
            .await
            .map_err(|e| VaultError::from_io(e, temp_path.as_str()))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| VaultError::from_io(e, temp_path.as_str()))?;
        file.sync_all()
            .await
            .map_err(|e| VaultError::from_io(e, temp_path.as_str()))?;
        drop(file);

        self.rename(&temp_path, path).await
    }

    async fn mkdir(&self, path: &str) -> VaultResult<()> {
        let full_path = self.full_path(path)?;
        fs::create_dir_all(&full_path)
            .await
            .map_err(|e| VaultError::from_io(e, path))
    }

    async fn rename(&self, from: &str, to: &str) -> VaultResult<()> {
        let from_path = self.full_path(from)?;
        let to_path = self.full_path(to)?;

        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| VaultError::from_io(e, to))?;
        }

        fs::rename(&from_path, &to_path)
            .await
            .map_err(|source| VaultError::RenameFailed {
                from: from.to_string(),
                to: to.to_string(),
                source,
            })
    }

    async fn list(&self, dir: &str) -> VaultResult<Vec<String>> {
        let full_path = self.full_path(dir)?;
        let mut entries = fs::read_dir(&full_path)
            .await
            .map_err(|e| VaultError::from_io(e, dir))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| VaultError::from_io(e, dir))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| VaultError::from_io(e, dir))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if file_type.is_file() && !name.ends_with(TEMP_SUFFIX) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    async fn remove(&self, path: &str) -> VaultResult<()> {
        let full_path = self.full_path(path)?;
        let metadata = fs::metadata(&full_path)
            .await
            .map_err(|e| VaultError::from_io(e, path))?;

        let result = if metadata.is_dir() {
            fs::remove_dir(&full_path).await
        } else {
            fs::remove_file(&full_path).await
        };
        result.map_err(|e| VaultError::from_io(e, path))
    }
}
