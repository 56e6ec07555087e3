//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/matter-sync/config.toml)
//! 3. Environment variables (MATTER_* prefix)
//!
//! Environment variables take precedence over config file values.
//!
//! This is host configuration (where the vault is, how often to tick). Sync
//! settings that travel with the vault live in [`crate::sync::SyncState`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::MATTER_API_HOST;

/// Environment variable prefix
const ENV_PREFIX: &str = "MATTER";

/// Default seconds between scheduler ticks
const DEFAULT_TICK_SECS: u64 = 60;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the notes vault
    #[serde(default = "default_vault_dir")]
    pub vault_dir: PathBuf,

    /// Sync state file (defaults to `<vault_dir>/.matter/data.json`)
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    /// Matter API host
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Seconds between scheduler due checks
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Log file used when MATTER_LOG is set
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vault_dir: default_vault_dir(),
            state_file: None,
            api_host: default_api_host(),
            tick_secs: DEFAULT_TICK_SECS,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (MATTER_VAULT_DIR, MATTER_API_HOST, MATTER_STATE_FILE, MATTER_TICK_SECS)
    /// 2. Config file (~/.config/matter-sync/config.toml or MATTER_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // MATTER_VAULT_DIR
        if let Ok(val) = std::env::var(format!("{}_VAULT_DIR", ENV_PREFIX)) {
            self.vault_dir = PathBuf::from(val);
        }

        // MATTER_STATE_FILE
        if let Ok(val) = std::env::var(format!("{}_STATE_FILE", ENV_PREFIX)) {
            self.state_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        // MATTER_API_HOST
        if let Ok(val) = std::env::var(format!("{}_API_HOST", ENV_PREFIX)) {
            if !val.is_empty() {
                self.api_host = val;
            }
        }

        // MATTER_TICK_SECS
        if let Ok(val) = std::env::var(format!("{}_TICK_SECS", ENV_PREFIX)) {
            if let Ok(secs) = val.parse() {
                self.tick_secs = secs;
            }
        }
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with MATTER_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("matter-sync")
            .join("config.toml")
    }

    /// Get the path to the sync state file
    pub fn state_path(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| self.vault_dir.join(".matter").join("data.json"))
    }

    /// Scheduler tick, never shorter than one second
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }
}

/// Get the default vault directory
fn default_vault_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_api_host() -> String {
    MATTER_API_HOST.to_string()
}

fn default_tick_secs() -> u64 {
    DEFAULT_TICK_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "MATTER_VAULT_DIR",
        "MATTER_STATE_FILE",
        "MATTER_API_HOST",
        "MATTER_TICK_SECS",
        "MATTER_CONFIG",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_host, "https://api.getmatter.app/api/v11");
        assert_eq!(config.tick_secs, 60);
        assert!(config.state_file.is_none());
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_state_path() {
        let mut config = Config::default();
        config.vault_dir = PathBuf::from("/notes");
        assert_eq!(config.state_path(), PathBuf::from("/notes/.matter/data.json"));

        config.state_file = Some(PathBuf::from("/elsewhere/state.json"));
        assert_eq!(config.state_path(), PathBuf::from("/elsewhere/state.json"));
    }

    #[test]
    fn test_tick_has_a_floor() {
        let mut config = Config::default();
        config.tick_secs = 0;
        assert_eq!(config.tick(), Duration::from_secs(1));
    }

    #[test]
    fn test_env_override_vault_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("MATTER_VAULT_DIR", "/tmp/vault-test");
        config.apply_env_overrides();

        assert_eq!(config.vault_dir, PathBuf::from("/tmp/vault-test"));
    }

    #[test]
    fn test_env_override_state_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("MATTER_STATE_FILE", "/tmp/data.json");
        config.apply_env_overrides();
        assert_eq!(config.state_file, Some(PathBuf::from("/tmp/data.json")));

        // Empty string clears it
        env::set_var("MATTER_STATE_FILE", "");
        config.apply_env_overrides();
        assert!(config.state_file.is_none());
    }

    #[test]
    fn test_env_override_api_host_and_tick() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("MATTER_API_HOST", "http://localhost:8000/api/v11");
        env::set_var("MATTER_TICK_SECS", "5");
        config.apply_env_overrides();
        assert_eq!(config.api_host, "http://localhost:8000/api/v11");
        assert_eq!(config.tick_secs, 5);

        // Unparseable values are ignored
        env::set_var("MATTER_TICK_SECS", "soon");
        config.apply_env_overrides();
        assert_eq!(config.tick_secs, 5);
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            vault_dir: PathBuf::from("/notes"),
            state_file: None,
            api_host: "https://api.example.com".to_string(),
            tick_secs: 30,
            log_file: Some(PathBuf::from("/tmp/matter.log")),
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("vault_dir"));
        assert!(toml_str.contains("api_host"));
        assert!(toml_str.contains("tick_secs"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.vault_dir, config.vault_dir);
        assert_eq!(parsed.api_host, config.api_host);
        assert_eq!(parsed.tick_secs, config.tick_secs);
        assert_eq!(parsed.log_file, config.log_file);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            vault_dir = "/custom/vault"
            tick_secs = 15
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.vault_dir, PathBuf::from("/custom/vault"));
        assert_eq!(config.tick_secs, 15);
        assert_eq!(config.api_host, MATTER_API_HOST);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        // Should return defaults when file doesn't exist
        assert_eq!(config.tick_secs, 60);
        assert!(config.state_file.is_none());
    }

    #[test]
    fn test_save_and_load_with_cli_override() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.vault_dir = PathBuf::from("/notes");
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_with_cli_override(Some(&path)).unwrap();
        assert_eq!(loaded.vault_dir, PathBuf::from("/notes"));
    }

    #[test]
    fn test_config_file_path_env_override() {
        let _guard = EnvGuard::new(ENV_VARS);

        assert!(Config::config_file_path().ends_with("matter-sync/config.toml"));

        env::set_var("MATTER_CONFIG", "/tmp/custom.toml");
        assert_eq!(Config::config_file_path(), PathBuf::from("/tmp/custom.toml"));
    }
}
