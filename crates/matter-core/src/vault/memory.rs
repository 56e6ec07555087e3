//! In-memory vault for tests

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{normalize_path, Vault, VaultError, VaultResult};

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<String, String>,
    dirs: BTreeSet<String>,
}

impl Tree {
    fn add_dir_with_parents(&mut self, dir: &str) {
        let mut current = String::new();
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);
            self.dirs.insert(current.clone());
        }
    }

    fn has_children(&self, dir: &str) -> bool {
        let prefix = format!("{}/", dir);
        self.files.keys().any(|f| f.starts_with(&prefix))
            || self.dirs.iter().any(|d| d.starts_with(&prefix))
    }
}

/// In-memory vault
///
/// Counts writes so tests can assert that a sync run touched nothing, and can
/// be told to fail writes under a path prefix.
#[derive(Debug, Default)]
pub struct MemoryVault {
    tree: Mutex<Tree>,
    writes: AtomicUsize,
    failing_prefix: Mutex<Option<String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `write` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot of every file and its content
    pub fn files(&self) -> BTreeMap<String, String> {
        self.tree().files.clone()
    }

    /// Make every write under `prefix` fail with a permission error
    pub fn fail_writes_under(&self, prefix: &str) {
        *self
            .failing_prefix
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(normalize_path(prefix));
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self, path: &str) -> VaultResult<()> {
        let failing = self
            .failing_prefix
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match failing {
            Some(prefix) if path.starts_with(&prefix) => Err(VaultError::from_io(
                io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
                path,
            )),
            _ => Ok(()),
        }
    }
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

#[async_trait]
impl Vault for MemoryVault {
    async fn exists(&self, path: &str) -> VaultResult<bool> {
        let path = normalize_path(path);
        let tree = self.tree();
        Ok(path.is_empty() || tree.files.contains_key(&path) || tree.dirs.contains(&path))
    }

    async fn read(&self, path: &str) -> VaultResult<String> {
        let path = normalize_path(path);
        self.tree()
            .files
            .get(&path)
            .cloned()
            .ok_or(VaultError::NotFound { path })
    }

    async fn write(&self, path: &str, content: &str) -> VaultResult<()> {
        let path = normalize_path(path);
        self.check_writable(&path)?;

        let mut tree = self.tree();
        tree.add_dir_with_parents(parent_of(&path));
        tree.files.insert(path, content.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> VaultResult<()> {
        let path = normalize_path(path);
        self.tree().add_dir_with_parents(&path);
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> VaultResult<()> {
        let from = normalize_path(from);
        let to = normalize_path(to);
        self.check_writable(&to)?;

        let mut tree = self.tree();
        let content = tree.files.remove(&from).ok_or_else(|| VaultError::RenameFailed {
            from: from.clone(),
            to: to.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, "source missing"),
        })?;
        tree.add_dir_with_parents(parent_of(&to));
        tree.files.insert(to, content);
        Ok(())
    }

    async fn list(&self, dir: &str) -> VaultResult<Vec<String>> {
        let dir = normalize_path(dir);
        let tree = self.tree();
        if !dir.is_empty() && !tree.dirs.contains(&dir) {
            return Err(VaultError::NotFound { path: dir });
        }

        Ok(tree
            .files
            .keys()
            .filter(|f| parent_of(f) == dir)
            .map(|f| f.rsplit('/').next().unwrap_or(f).to_string())
            .collect())
    }

    async fn remove(&self, path: &str) -> VaultResult<()> {
        let path = normalize_path(path);
        let mut tree = self.tree();

        if tree.files.remove(&path).is_some() {
            return Ok(());
        }
        if tree.dirs.contains(&path) {
            if tree.has_children(&path) {
                return Err(VaultError::from_io(
                    io::Error::new(io::ErrorKind::Other, "directory not empty"),
                    path,
                ));
            }
            tree.dirs.remove(&path);
            return Ok(());
        }
        Err(VaultError::NotFound { path })
    }
}
