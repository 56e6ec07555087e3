//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use matter_core::Config;

use crate::output::{or_not_set, Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "vault_dir": config.vault_dir,
                    "state_file": config.state_path(),
                    "api_host": config.api_host,
                    "tick_secs": config.tick_secs,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.vault_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  vault_dir:  {}", config.vault_dir.display());
            println!("  state_file: {}", config.state_path().display());
            println!("  api_host:   {}", config.api_host);
            println!("  tick_secs:  {}", config.tick_secs);
            println!(
                "  log_file:   {}",
                or_not_set(config.log_file.as_ref().map(|p| p.display()))
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "vault_dir" => {
            config.vault_dir = value.into();
        }
        "state_file" => {
            config.state_file = optional_path(value);
        }
        "api_host" => {
            if value.is_empty() {
                bail!("api_host cannot be empty");
            }
            config.api_host = value.to_string();
        }
        "tick_secs" => {
            config.tick_secs = value
                .parse()
                .context("Invalid value for tick_secs. Use a number of seconds.")?;
        }
        "log_file" => {
            config.log_file = optional_path(value);
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: vault_dir, state_file, api_host, tick_secs, log_file",
                key
            );
        }
    }
    Ok(())
}

fn optional_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.into())
    }
}
