//! Watch command handler
//!
//! Syncs on launch, then keeps a scheduler running until Ctrl-C.

use anyhow::{Context, Result};
use tracing::warn;

use matter_core::sync::{Scheduler, SyncOutcome};
use matter_core::Config;

use super::build_engine;
use crate::output::Output;

/// Run the scheduler in the foreground
pub async fn watch(config: &Config, output: &Output) -> Result<()> {
    let engine = build_engine(config, output)?;
    let scheduler = Scheduler::new(engine, config.tick());

    match scheduler.initial_sync().await {
        Ok(Some(outcome @ SyncOutcome::Completed(_))) => output.print_outcome(&outcome),
        Ok(_) => {}
        // Already notified by the engine; keep watching
        Err(e) => warn!("Initial sync failed: {}", e),
    }

    output.message(&format!(
        "Watching for new highlights every {}s (Ctrl-C to stop)",
        config.tick().as_secs()
    ));

    let handle = scheduler.spawn();
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    output.message("Stopping...");
    handle.shutdown().await;

    Ok(())
}
