//! Incremental sync from the Matter highlights feed
//!
//! ## Flow
//!
//! 1. [`Scheduler`] decides when a run is due (or a user asks for one)
//! 2. [`SyncEngine`] pages the feed through a [`FeedApi`]
//! 3. Each record becomes one note in the vault, named by the identity map
//! 4. Progress is persisted in [`SyncState`] through a [`StateStore`]
//!
//! ## Usage
//!
//! ```ignore
//! let engine = SyncEngine::new(client, vault, store, notifier);
//! let scheduler = Scheduler::new(engine, DEFAULT_TICK);
//! scheduler.initial_sync().await?;
//! let handle = scheduler.spawn();
//! ```

mod client;
mod engine;
mod error;
mod relocate;
mod scheduler;
mod state;
mod store;

#[cfg(test)]
mod testing;

pub use client::{
    ApiError, FeedApi, FeedPage, MatterClient, TokenPair, TokenResponse, CLIENT_TYPE,
    MATTER_API_HOST,
};
pub use engine::{SkipReason, SyncEngine, SyncOutcome, SyncReport};
pub use error::SyncError;
pub use relocate::RelocateOutcome;
pub use scheduler::{is_due, Scheduler, SchedulerCommand, SchedulerHandle, DEFAULT_TICK};
pub use state::{NotifyPreference, SyncState, DEFAULT_DATA_DIR, DEFAULT_SYNC_INTERVAL};
pub use store::{JsonStateStore, MemoryStateStore, StateError, StateStore};
