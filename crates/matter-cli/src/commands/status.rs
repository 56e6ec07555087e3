//! Status command handler

use anyhow::{Context, Result};

use matter_core::sync::StateStore;
use matter_core::Config;

use super::state_store;
use crate::output::{or_not_set, Output, OutputFormat};

/// Show sign-in and sync status for the configured vault
pub async fn show(config: &Config, output: &Output) -> Result<()> {
    let store = state_store(config);
    let state = store.load().await.context("Failed to load sync state")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "vault_dir": config.vault_dir,
                    "state_file": store.path(),
                    "signed_in": state.has_credentials(),
                    "setup_complete": state.has_completed_initial_setup,
                    "last_sync": state.last_sync,
                    "is_syncing": state.is_syncing,
                    "data_dir": state.data_dir,
                    "sync_interval": state.sync_interval,
                    "mapped_files": state.content_map.len()
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", or_not_set(state.last_sync.map(|t| t.to_rfc3339())));
        }
        OutputFormat::Human => {
            println!("Matter Sync Status");
            println!("==================");
            println!();
            println!("Account:");
            println!(
                "  Signed in: {}",
                if state.has_credentials() { "yes" } else { "no" }
            );
            println!(
                "  Setup:     {}",
                if state.has_completed_initial_setup {
                    "complete"
                } else {
                    "incomplete"
                }
            );
            println!();
            println!("Sync:");
            println!(
                "  Last sync: {}",
                or_not_set(
                    state
                        .last_sync
                        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"))
                )
            );
            println!(
                "  Running:   {}",
                if state.is_syncing { "yes" } else { "no" }
            );
            if state.sync_interval == 0 {
                println!("  Interval:  manual");
            } else {
                println!("  Interval:  every {} min", state.sync_interval);
            }
            println!();
            println!("Storage:");
            println!("  Vault:     {}", config.vault_dir.display());
            println!("  Folder:    {}", state.data_dir);
            println!("  State:     {}", store.path().display());
            println!("  Notes:     {}", state.content_map.len());
        }
    }

    Ok(())
}
