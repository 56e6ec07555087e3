//! Sync state persistence
//!
//! The state is always read and written whole. Another process (the same
//! vault open on a second device) may rewrite it between any two calls, so
//! callers reload before deciding instead of caching.
//!
//! Implementations:
//! - [`JsonStateStore`] - a JSON file, written atomically (temp file + rename)
//! - [`MemoryStateStore`] - in-memory, for tests

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::state::SyncState;

/// Errors reading or writing the persisted state
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read sync state from '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sync state in '{path}' is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize sync state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write sync state to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Load/save access to the persisted [`SyncState`]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the full state; defaults when nothing has been saved yet
    async fn load(&self) -> Result<SyncState, StateError>;

    /// Replace the persisted state
    async fn save(&self, state: &SyncState) -> Result<(), StateError>;
}

/// State stored as a JSON file
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load(&self) -> Result<SyncState, StateError> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SyncState::default());
            }
            Err(source) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if json.trim().is_empty() {
            return Ok(SyncState::default());
        }

        serde_json::from_str(&json).map_err(|source| StateError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, state: &SyncState) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(state)?;
        atomic_write(&self.path, json.as_bytes())
            .await
            .map_err(|source| StateError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
async fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&temp_path, path).await
}

/// State held in memory
///
/// Clones share the same underlying state, which lets tests play the part of
/// a second device writing between the engine's reloads.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    state: Arc<Mutex<SyncState>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStateStore {
    pub fn new(state: SyncState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            saves: Arc::new(Mutex::new(0)),
        }
    }

    /// Current state, without going through `load`
    pub fn snapshot(&self) -> SyncState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Mutate the stored state directly (as another process would)
    pub fn update(&self, f: impl FnOnce(&mut SyncState)) {
        f(&mut self.state.lock().unwrap_or_else(|e| e.into_inner()));
    }

    /// Number of `save` calls so far
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<SyncState, StateError> {
        Ok(self.snapshot())
    }

    async fn save(&self, state: &SyncState) -> Result<(), StateError> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state.clone();
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
