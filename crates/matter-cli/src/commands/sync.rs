//! Sync command handler

use anyhow::{anyhow, Result};

use matter_core::sync::SyncError;
use matter_core::Config;

use super::build_engine;
use crate::output::Output;

/// Run one manual sync
pub async fn sync(config: &Config, output: &Output) -> Result<()> {
    let engine = build_engine(config, output)?;

    output.message(&format!("Syncing into {}...", config.vault_dir.display()));
    let outcome = engine.sync().await.map_err(with_hint)?;
    output.print_outcome(&outcome);

    Ok(())
}

/// Attach the recovery suggestion, if any, to a failed run
fn with_hint(error: SyncError) -> anyhow::Error {
    match error.recovery_suggestion() {
        Some(hint) => anyhow!("{}\n{}", error, hint),
        None => error.into(),
    }
}
