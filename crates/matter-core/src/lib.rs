//! Matter Sync Core Library
//!
//! This crate provides the core functionality for matter-sync, which keeps a
//! folder of Markdown notes in step with the highlights saved in Matter.
//!
//! # Architecture
//!
//! - **Feed**: the Matter highlights feed is the source of truth
//! - **Vault**: one Markdown note per article, appended to as highlights arrive
//! - **State**: a JSON file inside the vault, shared by every device syncing it
//!
//! # Quick Start
//!
//! ```text
//! let engine = SyncEngine::new(
//!     MatterClient::new()?,
//!     NativeVault::new(&config.vault_dir),
//!     JsonStateStore::new(config.state_path()),
//!     LogNotifier,
//! );
//! engine.sync().await?;
//! ```
//!
//! # Modules
//!
//! - `sync`: Feed client, reconciliation engine, scheduler and persisted state
//! - `models`: Feed records and annotations
//! - `render`: Markdown templates
//! - `identity`: File name <-> record id mapping
//! - `vault`: Notes vault file access
//! - `notify`: User-facing notifications
//! - `config`: Application configuration

pub mod config;
pub mod identity;
pub mod models;
pub mod notify;
pub mod render;
pub mod sync;
pub mod vault;

pub use config::Config;
pub use models::{Annotation, FeedEntry};
pub use notify::{LogNotifier, Notifier};
pub use render::{Renderer, TemplateError};
pub use sync::{
    JsonStateStore, MatterClient, Scheduler, SyncEngine, SyncError, SyncOutcome, SyncReport,
    SyncState,
};
pub use vault::{NativeVault, Vault, VaultError};
