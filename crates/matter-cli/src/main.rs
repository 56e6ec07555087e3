//! Matter Sync CLI
//!
//! Command-line host for matter-sync - keeps a folder of Markdown notes in
//! step with your Matter highlights.

use std::fs::File;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use matter_core::Config;

mod commands;
mod notifier;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "matter-sync")]
#[command(about = "Sync Matter highlights into a Markdown notes vault")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect this vault to your Matter account
    Login {
        /// Vault folder for synced notes (default: Matter)
        #[arg(long)]
        data_dir: Option<String>,
    },
    /// Forget the stored Matter tokens
    Logout,
    /// Sync once now
    Sync,
    /// Sync on launch, then on schedule until Ctrl-C
    Watch,
    /// Show sign-in and sync status
    Status,
    /// Show or set host configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show or set vault sync settings
    Settings {
        #[command(subcommand)]
        command: Option<SettingsCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (vault_dir, state_file, api_host, tick_secs, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[derive(Subcommand, Clone)]
enum SettingsCommands {
    /// Show current settings
    Show,
    /// Set a setting
    Set {
        /// Setting key (data_dir, sync_interval, sync_on_launch, notify_on_sync,
        /// recreate_if_missing, metadata_template, highlight_template)
        key: String,
        /// Setting value (template keys take a file path, or `none`)
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands work on the file itself
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    let config = Config::load_with_cli_override(config_path)?;
    init_logging(&config);

    match cli.command {
        Commands::Login { data_dir } => commands::login::login(&config, data_dir, &output).await,
        Commands::Logout => commands::login::logout(&config, &output).await,
        Commands::Sync => commands::sync::sync(&config, &output).await,
        Commands::Watch => commands::watch::watch(&config, &output).await,
        Commands::Status => commands::status::show(&config, &output).await,
        Commands::Settings { command } => {
            handle_settings_command(command, &config, &output).await
        }
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

async fn handle_settings_command(
    command: Option<SettingsCommands>,
    config: &Config,
    output: &Output,
) -> Result<()> {
    match command {
        Some(SettingsCommands::Show) | None => commands::settings::show(config, output).await,
        Some(SettingsCommands::Set { key, value }) => {
            commands::settings::set(config, key, value, output).await
        }
    }
}

/// Initialize logging
///
/// Only initializes if MATTER_LOG environment variable is set.
/// Logs to config.log_file when set, otherwise to stderr.
fn init_logging(config: &Config) {
    // Only log if MATTER_LOG is set
    let Ok(log_level) = std::env::var("MATTER_LOG") else {
        return;
    };

    let env_filter = EnvFilter::new(format!(
        "matter_core={},matter_cli={}",
        log_level, log_level
    ));

    let Some(log_path) = config.log_file.clone() else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
        return;
    };

    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    // Initialize file-based logging (ignore error if already initialized)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("Logging initialized to {:?}", log_path);
}
