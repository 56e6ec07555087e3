//! Vault settings command handlers
//!
//! These settings live in the vault's sync state, so every device syncing the
//! vault sees the same values.

use anyhow::{bail, Context, Result};
use chrono::Utc;

use matter_core::models::{Annotation, FeedEntry};
use matter_core::sync::{NotifyPreference, RelocateOutcome, StateStore, SyncState};
use matter_core::{Config, Renderer};

use super::{build_engine, state_store};
use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "data_dir, sync_interval, sync_on_launch, notify_on_sync, \
                          recreate_if_missing, metadata_template, highlight_template";

/// Show vault settings
pub async fn show(config: &Config, output: &Output) -> Result<()> {
    let state = state_store(config)
        .load()
        .await
        .context("Failed to load sync state")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": state.data_dir,
                    "sync_interval": state.sync_interval,
                    "sync_on_launch": state.sync_on_launch,
                    "notify_on_sync": state.notify_on_sync,
                    "recreate_if_missing": state.recreate_if_missing,
                    "metadata_template": state.metadata_template,
                    "highlight_template": state.highlight_template
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", state.data_dir);
        }
        OutputFormat::Human => {
            println!("Settings:");
            println!("  data_dir:            {}", state.data_dir);
            println!("  sync_interval:       {}", describe_interval(state.sync_interval));
            println!("  sync_on_launch:      {}", state.sync_on_launch);
            println!("  notify_on_sync:      {}", state.notify_on_sync);
            println!("  recreate_if_missing: {}", state.recreate_if_missing);
            println!(
                "  metadata_template:   {}",
                describe_template(state.metadata_template.as_deref())
            );
            println!(
                "  highlight_template:  {}",
                describe_template(state.highlight_template.as_deref())
            );
        }
    }

    Ok(())
}

/// Set a vault setting
///
/// `data_dir` moves existing notes; template keys take a file path (or
/// `none` to restore the default).
pub async fn set(config: &Config, key: String, value: String, output: &Output) -> Result<()> {
    if key == "data_dir" {
        return move_data_dir(config, &value, output).await;
    }

    let template = match key.as_str() {
        "metadata_template" | "highlight_template" => read_template(&key, &value)?,
        _ => None,
    };

    let store = state_store(config);
    let mut state = store.load().await.context("Failed to load sync state")?;
    apply(&mut state, &key, &value, template)?;
    store.save(&state).await.context("Failed to save sync state")?;

    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

async fn move_data_dir(config: &Config, value: &str, output: &Output) -> Result<()> {
    let engine = build_engine(config, output)?;

    match engine
        .move_data_dir(value)
        .await
        .context("Failed to move the sync folder")?
    {
        RelocateOutcome::Unchanged => output.message("Sync folder unchanged."),
        RelocateOutcome::Busy => bail!("Wait for the current sync to end and try again."),
        RelocateOutcome::Moved { files } => {
            output.success(&format!("Sync folder updated ({} notes moved)", files))
        }
    }

    Ok(())
}

/// Apply a setting that does not touch the vault
fn apply(state: &mut SyncState, key: &str, value: &str, template: Option<String>) -> Result<()> {
    match key {
        "sync_interval" => {
            state.sync_interval = value
                .parse()
                .context("Invalid value for sync_interval. Use minutes (0 for manual).")?;
        }
        "sync_on_launch" => {
            state.sync_on_launch = value
                .parse()
                .context("Invalid value for sync_on_launch. Use 'true' or 'false'.")?;
        }
        "notify_on_sync" => {
            state.notify_on_sync = value
                .parse::<NotifyPreference>()
                .map_err(anyhow::Error::msg)?;
        }
        "recreate_if_missing" => {
            state.recreate_if_missing = value
                .parse()
                .context("Invalid value for recreate_if_missing. Use 'true' or 'false'.")?;
        }
        "metadata_template" => {
            state.metadata_template = template;
        }
        "highlight_template" => {
            state.highlight_template = template;
        }
        _ => {
            bail!("Unknown setting: '{}'\nValid keys: {}", key, VALID_KEYS);
        }
    }
    Ok(())
}

/// Read a template file and check that it renders; `none` clears it
fn read_template(key: &str, value: &str) -> Result<Option<String>> {
    if value.is_empty() || value == "none" {
        return Ok(None);
    }

    let template = std::fs::read_to_string(value)
        .with_context(|| format!("Failed to read template file: {}", value))?;
    check_template(key, &template)?;
    Ok(Some(template))
}

fn check_template(key: &str, template: &str) -> Result<()> {
    let sample = FeedEntry::new("0", "Sample", "https://example.com")
        .with_annotation(Annotation::new("Sample highlight", 0, Utc::now()).with_note("note"));

    let result = if key == "metadata_template" {
        Renderer::new(Some(template), None).render_metadata(&sample)
    } else {
        Renderer::new(None, Some(template)).render_entry(&sample)
    };
    result.context("Template does not render")?;
    Ok(())
}

fn describe_interval(minutes: u64) -> String {
    if minutes == 0 {
        "manual".to_string()
    } else {
        format!("every {} min", minutes)
    }
}

fn describe_template(template: Option<&str>) -> String {
    match template {
        Some(t) if !t.trim().is_empty() => format!("custom ({} lines)", t.lines().count()),
        _ => "default".to_string(),
    }
}
