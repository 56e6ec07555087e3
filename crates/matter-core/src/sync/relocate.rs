//! Moving the data directory
//!
//! Only files the identity map knows about are moved; anything else the user
//! keeps in the old directory stays put. A failure part way through leaves
//! the copies already made in the new directory.

use tracing::{error, info};

use super::client::FeedApi;
use super::engine::SyncEngine;
use super::error::SyncError;
use super::store::StateStore;
use crate::notify::Notifier;
use crate::vault::{self, Vault};

/// Result of [`SyncEngine::move_data_dir`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelocateOutcome {
    /// The new directory is the current one
    Unchanged,
    /// A sync is running; nothing was touched
    Busy,
    /// Files moved into the new directory
    Moved { files: usize },
}

impl<A, V, S, N> SyncEngine<A, V, S, N>
where
    A: FeedApi,
    V: Vault,
    S: StateStore,
    N: Notifier,
{
    /// Move generated notes to `new_dir` and make it the data directory
    pub async fn move_data_dir(&self, new_dir: &str) -> Result<RelocateOutcome, SyncError> {
        let new_dir = vault::normalize_path(new_dir);
        let mut state = self.store().load().await?;
        let old_dir = state.data_dir.clone();

        if new_dir == vault::normalize_path(&old_dir) {
            return Ok(RelocateOutcome::Unchanged);
        }
        if state.is_syncing {
            self.notifier()
                .notify("Wait for the current sync to end and try again.");
            return Ok(RelocateOutcome::Busy);
        }

        state.is_syncing = true;
        self.store().save(&state).await?;

        let names: Vec<String> = state.content_map.keys().cloned().collect();
        match self.move_files(&old_dir, &new_dir, &names).await {
            Ok(files) => {
                let mut state = self.store().load().await?;
                state.data_dir = new_dir.clone();
                state.is_syncing = false;
                self.store().save(&state).await?;

                info!(from = %old_dir, to = %new_dir, files, "Data directory moved");
                self.notifier().notify("Sync folder updated");
                Ok(RelocateOutcome::Moved { files })
            }
            Err(e) => {
                error!("Failed to move data directory: {}", e);
                self.notifier().notify(&e.to_string());

                let mut state = self.store().load().await?;
                state.is_syncing = false;
                self.store().save(&state).await?;
                Err(e)
            }
        }
    }

    async fn move_files(
        &self,
        old_dir: &str,
        new_dir: &str,
        names: &[String],
    ) -> Result<usize, SyncError> {
        let vault = self.vault();
        if !new_dir.is_empty() {
            vault.mkdir(new_dir).await?;
        }
        if !vault.exists(old_dir).await? {
            return Ok(0);
        }

        let present: Vec<String> = vault
            .list(old_dir)
            .await?
            .into_iter()
            .filter(|name| names.contains(name))
            .collect();

        for name in &present {
            let content = vault.read(&vault::join(old_dir, name)).await?;
            vault.write(&vault::join(new_dir, name), &content).await?;
        }
        for name in &present {
            vault.remove(&vault::join(old_dir, name)).await?;
        }

        if !old_dir.is_empty() && vault.list(old_dir).await?.is_empty() {
            // Subdirectories keep it alive; remove() refuses non-empty dirs
            if let Err(e) = vault.remove(old_dir).await {
                info!("Left old data directory in place: {}", e);
            }
        }

        Ok(present.len())
    }
}
