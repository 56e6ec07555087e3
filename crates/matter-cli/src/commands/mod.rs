//! Command handlers

pub mod config;
pub mod login;
pub mod settings;
pub mod status;
pub mod sync;
pub mod watch;

use anyhow::{Context, Result};

use matter_core::sync::{JsonStateStore, MatterClient, SyncEngine};
use matter_core::{Config, NativeVault};

use crate::notifier::ConsoleNotifier;
use crate::output::Output;

/// Engine wired to the real API, the vault on disk and the console
pub type CliEngine = SyncEngine<MatterClient, NativeVault, JsonStateStore, ConsoleNotifier>;

/// State store for the configured vault
pub fn state_store(config: &Config) -> JsonStateStore {
    JsonStateStore::new(config.state_path())
}

/// Build the engine for the configured vault
pub fn build_engine(config: &Config, output: &Output) -> Result<CliEngine> {
    let client = MatterClient::with_host(&config.api_host)
        .context("Failed to create Matter API client")?;

    Ok(SyncEngine::new(
        client,
        NativeVault::new(config.vault_dir.clone()),
        state_store(config),
        ConsoleNotifier::new(output.is_quiet()),
    ))
}
