//! Persisted sync state
//!
//! One `SyncState` exists per vault. It is stored as a single JSON object with
//! camelCase keys; every field has a default, used when the key is missing or
//! `null`, so that objects written by older versions (or with unknown extra
//! keys) load cleanly.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default data directory inside the vault
pub const DEFAULT_DATA_DIR: &str = "Matter";

/// Default minutes between scheduled syncs
pub const DEFAULT_SYNC_INTERVAL: u64 = 60;

/// When sync notifications are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyPreference {
    Never,
    Error,
    #[default]
    Always,
}

impl NotifyPreference {
    /// Whether start/finish progress messages are shown
    pub fn shows_progress(self) -> bool {
        matches!(self, NotifyPreference::Always)
    }

    /// Whether failures and warnings are shown
    pub fn shows_errors(self) -> bool {
        !matches!(self, NotifyPreference::Never)
    }
}

impl fmt::Display for NotifyPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotifyPreference::Never => "never",
            NotifyPreference::Error => "error",
            NotifyPreference::Always => "always",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for NotifyPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "never" => Ok(NotifyPreference::Never),
            "error" => Ok(NotifyPreference::Error),
            "always" => Ok(NotifyPreference::Always),
            other => Err(format!(
                "Invalid notify preference '{}'. Use 'never', 'error' or 'always'.",
                other
            )),
        }
    }
}

/// Persisted state shared by every device syncing into the same vault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredState")]
pub struct SyncState {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Pending device-pairing session
    pub qr_session_token: Option<String>,
    /// Vault-relative directory holding generated notes
    pub data_dir: String,
    /// Minutes between scheduled syncs; 0 means manual only
    pub sync_interval: u64,
    pub sync_on_launch: bool,
    pub notify_on_sync: NotifyPreference,
    pub has_completed_initial_setup: bool,
    /// Watermark: annotations created after this are "new"
    pub last_sync: Option<DateTime<Utc>>,
    /// Cooperative cross-process lock
    pub is_syncing: bool,
    /// Generated file name -> remote record id
    pub content_map: BTreeMap<String, String>,
    pub recreate_if_missing: bool,
    pub metadata_template: Option<String>,
    pub highlight_template: Option<String>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            qr_session_token: None,
            data_dir: DEFAULT_DATA_DIR.to_string(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
            sync_on_launch: true,
            notify_on_sync: NotifyPreference::default(),
            has_completed_initial_setup: false,
            last_sync: None,
            is_syncing: false,
            content_map: BTreeMap::new(),
            recreate_if_missing: true,
            metadata_template: None,
            highlight_template: None,
        }
    }
}

/// On-disk shape: any key may be missing or `null`
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StoredState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    qr_session_token: Option<String>,
    data_dir: Option<String>,
    sync_interval: Option<u64>,
    sync_on_launch: Option<bool>,
    notify_on_sync: Option<NotifyPreference>,
    has_completed_initial_setup: Option<bool>,
    last_sync: Option<DateTime<Utc>>,
    is_syncing: Option<bool>,
    content_map: Option<BTreeMap<String, String>>,
    recreate_if_missing: Option<bool>,
    metadata_template: Option<String>,
    highlight_template: Option<String>,
}

impl From<StoredState> for SyncState {
    fn from(stored: StoredState) -> Self {
        let defaults = SyncState::default();
        Self {
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            qr_session_token: stored.qr_session_token,
            data_dir: stored.data_dir.unwrap_or(defaults.data_dir),
            sync_interval: stored.sync_interval.unwrap_or(defaults.sync_interval),
            sync_on_launch: stored.sync_on_launch.unwrap_or(defaults.sync_on_launch),
            notify_on_sync: stored.notify_on_sync.unwrap_or(defaults.notify_on_sync),
            has_completed_initial_setup: stored
                .has_completed_initial_setup
                .unwrap_or(defaults.has_completed_initial_setup),
            last_sync: stored.last_sync,
            is_syncing: stored.is_syncing.unwrap_or(defaults.is_syncing),
            content_map: stored.content_map.unwrap_or(defaults.content_map),
            recreate_if_missing: stored
                .recreate_if_missing
                .unwrap_or(defaults.recreate_if_missing),
            metadata_template: stored.metadata_template,
            highlight_template: stored.highlight_template,
        }
    }
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an access token is present
    pub fn has_credentials(&self) -> bool {
        self.access_token
            .as_deref()
            .map_or(false, |token| !token.is_empty())
    }

    /// The set of record ids currently mapped to a file
    pub fn mapped_ids(&self) -> BTreeSet<String> {
        self.content_map.values().cloned().collect()
    }

    /// Whether any file name is mapped to this record id
    pub fn is_mapped(&self, record_id: &str) -> bool {
        self.content_map.values().any(|id| id == record_id)
    }

    /// File names mapped to this record id
    pub fn names_for(&self, record_id: &str) -> Vec<&str> {
        self.content_map
            .iter()
            .filter(|(_, id)| id.as_str() == record_id)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Clear credentials and setup progress (sign out)
    pub fn clear_credentials(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.qr_session_token = None;
        self.has_completed_initial_setup = false;
    }
}
