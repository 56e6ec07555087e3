//! Periodic sync scheduling
//!
//! The scheduler ticks on a fixed interval and asks the engine to sync when
//! the user's interval has elapsed since the last run. It runs as a single
//! tokio task controlled through a command channel.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::client::FeedApi;
use super::engine::{SyncEngine, SyncOutcome};
use super::error::SyncError;
use super::state::SyncState;
use super::store::StateStore;
use crate::notify::Notifier;
use crate::vault::Vault;

/// Default tick between due checks
pub const DEFAULT_TICK: Duration = Duration::from_secs(60);

/// Commands sent to a running scheduler
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Sync now regardless of the interval
    SyncNow,
    /// Stop the scheduler task
    Shutdown,
}

/// Handle for controlling a spawned scheduler
pub struct SchedulerHandle {
    pub command_tx: mpsc::Sender<SchedulerCommand>,
    pub task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask for an immediate sync
    pub async fn sync_now(&self) {
        let _ = self.command_tx.send(SchedulerCommand::SyncNow).await;
    }

    /// Stop the scheduler and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.command_tx.send(SchedulerCommand::Shutdown).await;
        if let Err(e) = self.task.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }
}

/// Whether a scheduled sync is due at `now`
///
/// Requires finished setup, credentials and a non-zero interval. A vault that
/// has never synced is always due. An interval too large to represent never
/// comes due.
pub fn is_due(state: &SyncState, now: DateTime<Utc>) -> bool {
    if !state.has_completed_initial_setup || !state.has_credentials() || state.sync_interval == 0 {
        return false;
    }

    let Some(last) = state.last_sync else {
        return true;
    };
    let interval = i64::try_from(state.sync_interval)
        .ok()
        .and_then(chrono::Duration::try_minutes);
    match interval {
        Some(interval) => now.signed_duration_since(last) >= interval,
        None => {
            debug!("Sync interval {} out of range", state.sync_interval);
            false
        }
    }
}

/// Drives a [`SyncEngine`] on a timer
pub struct Scheduler<A, V, S, N> {
    engine: SyncEngine<A, V, S, N>,
    tick: Duration,
}

impl<A, V, S, N> Scheduler<A, V, S, N>
where
    A: FeedApi,
    V: Vault,
    S: StateStore,
    N: Notifier,
{
    pub fn new(engine: SyncEngine<A, V, S, N>, tick: Duration) -> Self {
        Self { engine, tick }
    }

    pub fn engine(&self) -> &SyncEngine<A, V, S, N> {
        &self.engine
    }

    /// Startup: clear a flag left by a crashed run, then sync on launch
    ///
    /// Returns `None` when no sync was attempted.
    pub async fn initial_sync(&self) -> Result<Option<SyncOutcome>, SyncError> {
        let store = self.engine.store();
        let mut state = store.load().await?;
        if state.is_syncing {
            info!("Clearing stale sync flag");
        }
        state.is_syncing = false;
        store.save(&state).await?;

        if !state.has_completed_initial_setup || !state.has_credentials() {
            self.engine
                .notifier()
                .notify("Finish setting up Matter in settings");
            return Ok(None);
        }
        if !state.sync_on_launch {
            debug!("Sync on launch disabled");
            return Ok(None);
        }

        self.engine.sync().await.map(Some)
    }

    /// One tick: sync if the interval has elapsed
    pub async fn loop_check(&self) -> Result<Option<SyncOutcome>, SyncError> {
        let state = self.engine.store().load().await?;
        if !is_due(&state, Utc::now()) {
            return Ok(None);
        }
        self.engine.sync().await.map(Some)
    }

    /// Manual trigger; skips the interval check but not the engine's guard
    pub async fn sync_now(&self) -> Result<SyncOutcome, SyncError> {
        self.engine.sync().await
    }

    /// Run until `Shutdown` arrives or every sender is dropped
    pub async fn run(self, mut command_rx: mpsc::Receiver<SchedulerCommand>) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; startup is initial_sync's job
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.loop_check().await {
                        warn!("Scheduled sync failed: {}", e);
                    }
                }
                cmd = command_rx.recv() => match cmd {
                    Some(SchedulerCommand::SyncNow) => {
                        if let Err(e) = self.sync_now().await {
                            warn!("Manual sync failed: {}", e);
                        }
                    }
                    Some(SchedulerCommand::Shutdown) | None => break,
                }
            }
        }

        info!("Scheduler stopped");
    }
}

impl<A, V, S, N> Scheduler<A, V, S, N>
where
    A: FeedApi + 'static,
    V: Vault + 'static,
    S: StateStore + 'static,
    N: Notifier + 'static,
{
    /// Spawn [`Scheduler::run`] on the current runtime
    pub fn spawn(self) -> SchedulerHandle {
        let (command_tx, command_rx) = mpsc::channel(16);
        let task = tokio::spawn(self.run(command_rx));
        SchedulerHandle { command_tx, task }
    }
}
