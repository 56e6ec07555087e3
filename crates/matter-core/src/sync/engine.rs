//! Reconciliation engine
//!
//! One run pulls the whole highlights feed and folds it into the vault:
//!
//! 1. Guard on the persisted `isSyncing` flag and take it
//! 2. Page through the feed (newest first), refreshing the token once per
//!    rejected page
//! 3. Walk the records oldest first, creating or appending one note each
//! 4. Commit each record's file name as soon as it is handled
//! 5. Move the watermark and release the flag
//!
//! State is reloaded before every decision because another device may be
//! syncing into the same vault at the same time.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::client::{ApiError, FeedApi};
use super::error::SyncError;
use super::store::StateStore;
use crate::identity::{self, IdentityMap};
use crate::models::FeedEntry;
use crate::notify::Notifier;
use crate::render::Renderer;
use crate::vault::Vault;

/// Why a run did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another run (here or on another device) holds the flag
    AlreadySyncing,
    /// Not signed in
    NoAccessToken,
}

/// Per-run counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Records received from the feed
    pub records: usize,
    /// New notes written
    pub created: usize,
    /// Notes that received new highlights
    pub appended: usize,
    /// Records that needed no write
    pub unchanged: usize,
    /// Records materialized by another device during this run
    pub conflicts: usize,
    /// Deleted notes left deleted
    pub skipped_missing: usize,
    /// Records whose templates failed to render
    pub template_failures: usize,
}

/// Result of calling [`SyncEngine::sync`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Completed(SyncReport),
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::Skipped(_) => None,
        }
    }
}

/// What happened to a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordAction {
    Created,
    Appended,
    Unchanged,
    Conflict,
    SkippedMissing,
    TemplateFailed,
}

/// Sync engine over a feed, a vault, a state store and a notifier
pub struct SyncEngine<A, V, S, N> {
    api: A,
    vault: V,
    store: S,
    notifier: N,
}

impl<A, V, S, N> SyncEngine<A, V, S, N>
where
    A: FeedApi,
    V: Vault,
    S: StateStore,
    N: Notifier,
{
    pub fn new(api: A, vault: V, store: S, notifier: N) -> Self {
        Self {
            api,
            vault,
            store,
            notifier,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Run one sync
    ///
    /// Returns `Skipped` without touching anything when another run holds the
    /// flag or there are no credentials. On failure the flag is still
    /// released and a single failure notification is sent.
    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        let mut state = self.store.load().await?;
        if state.is_syncing {
            info!("Sync already in progress, skipping");
            return Ok(SyncOutcome::Skipped(SkipReason::AlreadySyncing));
        }
        let access_token = match state.access_token.clone().filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => {
                info!("Not signed in to Matter, skipping sync");
                return Ok(SyncOutcome::Skipped(SkipReason::NoAccessToken));
            }
        };

        state.is_syncing = true;
        self.store.save(&state).await?;

        let started_at = Utc::now();
        let initial = state.mapped_ids();
        if state.notify_on_sync.shows_progress() {
            self.notifier.notify("Syncing with Matter");
        }
        info!("Sync started");

        let result = self.run(access_token, &initial).await;
        let finished = self.finish(&result, started_at).await;

        match (result, finished) {
            (Ok(report), Ok(())) => {
                info!(
                    records = report.records,
                    created = report.created,
                    appended = report.appended,
                    "Sync finished"
                );
                Ok(SyncOutcome::Completed(report))
            }
            (Ok(_), Err(e)) => {
                error!("Failed to release sync state: {}", e);
                Err(e)
            }
            (Err(e), finished) => {
                if let Err(release) = finished {
                    error!("Failed to release sync state: {}", release);
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        access_token: String,
        initial: &BTreeSet<String>,
    ) -> Result<SyncReport, SyncError> {
        let mut records = self.fetch_all(access_token).await?;
        records.reverse();

        let mut report = SyncReport {
            records: records.len(),
            ..SyncReport::default()
        };
        let mut committed = BTreeSet::new();

        for record in &records {
            let action = self.handle_record(record, initial, &mut committed).await?;
            match action {
                RecordAction::Created => report.created += 1,
                RecordAction::Appended => report.appended += 1,
                RecordAction::Unchanged => report.unchanged += 1,
                RecordAction::Conflict => report.conflicts += 1,
                RecordAction::SkippedMissing => report.skipped_missing += 1,
                RecordAction::TemplateFailed => report.template_failures += 1,
            }
        }

        Ok(report)
    }

    /// Fetch every feed page, newest records first
    async fn fetch_all(&self, mut access_token: String) -> Result<Vec<FeedEntry>, SyncError> {
        let mut records = Vec::new();
        let mut next = Some(self.api.feed_url());

        while let Some(url) = next {
            let page = match self.api.fetch_page(&url, &access_token).await {
                Ok(page) => page,
                Err(e) if e.is_auth() => {
                    warn!("Feed request rejected, refreshing access token");
                    access_token = self.refresh_tokens().await?;
                    self.api.fetch_page(&url, &access_token).await?
                }
                Err(e) => return Err(e.into()),
            };

            debug!("Fetched {} records", page.records.len());
            records.extend(page.records);
            next = page.next;
        }

        Ok(records)
    }

    /// Trade the stored refresh token for a new pair and persist it
    async fn refresh_tokens(&self) -> Result<String, SyncError> {
        let state = self.store.load().await?;
        let refresh_token = state
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Auth("no refresh token stored".to_string()))?;

        let pair = self.api.refresh_access_token(&refresh_token).await?;

        let mut state = self.store.load().await?;
        state.access_token = Some(pair.access_token.clone());
        if let Some(refresh_token) = pair.refresh_token {
            state.refresh_token = Some(refresh_token);
        }
        self.store.save(&state).await?;

        info!("Access token refreshed");
        Ok(pair.access_token)
    }

    async fn handle_record(
        &self,
        record: &FeedEntry,
        initial: &BTreeSet<String>,
        committed: &mut BTreeSet<String>,
    ) -> Result<RecordAction, SyncError> {
        let state = self.store.load().await?;
        let id = record.id.as_str();

        if !initial.contains(id) && !committed.contains(id) && state.is_mapped(id) {
            debug!(record = id, "Record materialized elsewhere during this run, skipping");
            return Ok(RecordAction::Conflict);
        }

        if !state.data_dir.is_empty() && !self.vault.exists(&state.data_dir).await? {
            self.vault.mkdir(&state.data_dir).await?;
        }

        let map = IdentityMap::new(&self.vault, &state);
        let name = map.resolve_name(&record.content.title, id).await?;
        let path = map.path_for(&name);
        let renderer = Renderer::new(
            state.metadata_template.as_deref(),
            state.highlight_template.as_deref(),
        );

        let action = if self.vault.exists(&path).await? {
            let new_annotations = record.annotations_since(state.last_sync);
            if new_annotations.is_empty() {
                RecordAction::Unchanged
            } else {
                match renderer.render_annotations(&new_annotations) {
                    Ok(rendered) => {
                        let existing = self.vault.read(&path).await?;
                        let content = format!("{}\n{}", existing.trim_end(), rendered);
                        if content == existing {
                            RecordAction::Unchanged
                        } else {
                            self.vault.write(&path, &content).await?;
                            RecordAction::Appended
                        }
                    }
                    Err(e) => {
                        warn!(record = id, "{}", e);
                        RecordAction::TemplateFailed
                    }
                }
            }
        } else if state.is_mapped(id) && !state.recreate_if_missing {
            RecordAction::SkippedMissing
        } else {
            match renderer.render_entry(record) {
                Ok(rendered) => {
                    self.vault.write(&path, &rendered).await?;
                    RecordAction::Created
                }
                Err(e) => {
                    warn!(record = id, "{}", e);
                    RecordAction::TemplateFailed
                }
            }
        };
        debug!(record = id, file = %name, ?action, "Handled record");

        if action != RecordAction::TemplateFailed {
            let mut state = self.store.load().await?;
            identity::commit(&mut state, &name, id);
            self.store.save(&state).await?;
            committed.insert(id.to_string());
        }

        Ok(action)
    }

    /// Release the flag, move the watermark on success and notify
    async fn finish(
        &self,
        result: &Result<SyncReport, SyncError>,
        started_at: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let mut state = self.store.load().await?;
        let prefs = state.notify_on_sync;

        match result {
            Ok(report) => {
                state.last_sync = Some(started_at);
                if report.template_failures > 0 && prefs.shows_errors() {
                    self.notifier.notify(&format!(
                        "{} Matter entries could not be rendered, check your templates",
                        report.template_failures
                    ));
                }
                if prefs.shows_progress() {
                    self.notifier.notify("Finished syncing with Matter");
                }
            }
            Err(e) => {
                error!("Sync failed: {}", e);
                if prefs.shows_errors() {
                    self.notifier.notify(e.user_message());
                }
            }
        }

        state.is_syncing = false;
        self.store.save(&state).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Annotation;
    use crate::notify::RecordingNotifier;
    use crate::sync::state::{NotifyPreference, SyncState};
    use crate::sync::store::MemoryStateStore;
    use crate::sync::testing::{signed_in, FakeApi, RacingStore};
    use crate::vault::MemoryVault;
    use chrono::{Duration, TimeZone};

    type TestEngine = SyncEngine<FakeApi, MemoryVault, MemoryStateStore, RecordingNotifier>;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap()
    }

    fn entry(id: &str, title: &str) -> FeedEntry {
        FeedEntry::new(id, title, format!("https://example.com/{}", id))
    }

    fn engine(api: FakeApi, state: SyncState) -> (TestEngine, MemoryStateStore, RecordingNotifier) {
        let store = MemoryStateStore::new(state);
        let notifier = RecordingNotifier::new();
        let engine = SyncEngine::new(api, MemoryVault::new(), store.clone(), notifier.clone());
        (engine, store, notifier)
    }

    fn completed(outcome: SyncOutcome) -> SyncReport {
        match outcome {
            SyncOutcome::Completed(report) => report,
            other => panic!("expected a completed run, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_sync_creates_notes() {
        let api = FakeApi::with_pages(vec![vec![
            entry("1", "On Writing").with_annotation(Annotation::new("Omit needless words", 3, at(2))),
        ]]);
        let (engine, store, notifier) = engine(api, signed_in());

        let report = completed(engine.sync().await.unwrap());
        assert_eq!(report.records, 1);
        assert_eq!(report.created, 1);

        let files = engine.vault().files();
        let note = files.get("Matter/On Writing.md").unwrap();
        assert!(note.starts_with("## Metadata\n* URL: [https://example.com/1]"));
        assert!(note.ends_with("## Highlights\n* Omit needless words"));

        let state = store.snapshot();
        assert_eq!(state.content_map.get("On Writing.md").map(String::as_str), Some("1"));
        assert!(!state.is_syncing);
        assert!(state.last_sync.is_some());
        assert_eq!(
            notifier.messages(),
            vec!["Syncing with Matter", "Finished syncing with Matter"]
        );
    }

    #[tokio::test]
    async fn test_records_processed_oldest_first_across_pages() {
        // Feed is newest first: page 1 holds 4 and 3, page 2 holds 2 and 1
        let api = FakeApi::with_pages(vec![
            vec![entry("4", "Same"), entry("3", "Same")],
            vec![entry("2", "Same"), entry("1", "Same")],
        ]);
        let (engine, store, _) = engine(api, signed_in());

        completed(engine.sync().await.unwrap());
        assert_eq!(engine.api().fetch_count(), 2);

        let map = store.snapshot().content_map;
        assert_eq!(map.get("Same.md").map(String::as_str), Some("1"));
        assert_eq!(map.get("Same-2.md").map(String::as_str), Some("2"));
        assert_eq!(map.get("Same-3.md").map(String::as_str), Some("3"));
        assert_eq!(map.get("Same-4.md").map(String::as_str), Some("4"));
    }

    #[tokio::test]
    async fn test_second_sync_without_new_data_writes_nothing() {
        let api = FakeApi::with_pages(vec![vec![
            entry("2", "B").with_annotation(Annotation::new("b", 1, at(3))),
            entry("1", "A").with_annotation(Annotation::new("a", 1, at(2))),
        ]]);
        let (engine, _, _) = engine(api, signed_in());

        completed(engine.sync().await.unwrap());
        let writes = engine.vault().write_count();
        let files = engine.vault().files();

        let report = completed(engine.sync().await.unwrap());
        assert_eq!(report.unchanged, 2);
        assert_eq!(engine.vault().write_count(), writes);
        assert_eq!(engine.vault().files(), files);
    }

    #[tokio::test]
    async fn test_new_annotation_is_appended() {
        let first = entry("1", "A").with_annotation(Annotation::new("first", 10, at(2)));
        let api = FakeApi::with_pages(vec![vec![first.clone()]]);
        let (engine, _, _) = engine(api, signed_in());

        completed(engine.sync().await.unwrap());
        let original = engine.vault().files()["Matter/A.md"].clone();

        let later = Utc::now() + Duration::hours(1);
        let updated = first.with_annotation(Annotation::new("second", 2, later).with_note("why"));
        engine.api().set_pages(vec![vec![updated]]);

        let report = completed(engine.sync().await.unwrap());
        assert_eq!(report.appended, 1);
        assert_eq!(
            engine.vault().files()["Matter/A.md"],
            format!("{}\n* second\n  * **Note**: why", original.trim_end())
        );
    }

    #[tokio::test]
    async fn test_append_preserves_user_edits() {
        let api = FakeApi::new();
        let mut state = signed_in();
        state.last_sync = Some(at(5));
        state.content_map.insert("A.md".to_string(), "1".to_string());
        let (engine, _, _) = engine(api, state);
        engine
            .vault()
            .write("Matter/A.md", "my own summary\n\n\n")
            .await
            .unwrap();

        engine.api().set_pages(vec![vec![entry("1", "A")
            .with_annotation(Annotation::new("old", 1, at(4)))
            .with_annotation(Annotation::new("new", 2, at(6)))]]);

        completed(engine.sync().await.unwrap());
        assert_eq!(engine.vault().files()["Matter/A.md"], "my own summary\n* new");
    }

    #[tokio::test]
    async fn test_colliding_titles_are_stable_across_syncs() {
        let api = FakeApi::with_pages(vec![vec![entry("2", "What: Why"), entry("1", "What/ Why")]]);
        let (engine, store, _) = engine(api, signed_in());

        completed(engine.sync().await.unwrap());
        let first = store.snapshot().content_map;
        assert_eq!(first.get("What- Why.md").map(String::as_str), Some("1"));
        assert_eq!(first.get("What- Why-2.md").map(String::as_str), Some("2"));

        completed(engine.sync().await.unwrap());
        assert_eq!(store.snapshot().content_map, first);
        assert_eq!(engine.vault().files().len(), 2);
    }

    #[tokio::test]
    async fn test_record_materialized_elsewhere_is_skipped() {
        let api = FakeApi::with_pages(vec![vec![entry("2", "Theirs"), entry("1", "Mine")]]);
        let memory = MemoryStateStore::new(signed_in());
        let store = RacingStore::new(memory.clone(), |state| {
            state
                .content_map
                .insert("Theirs.md".to_string(), "2".to_string());
        });
        let engine = SyncEngine::new(api, MemoryVault::new(), store, RecordingNotifier::new());

        let report = completed(engine.sync().await.unwrap());
        assert_eq!(report.created, 1);
        assert_eq!(report.conflicts, 1);

        let files = engine.vault().files();
        assert!(files.contains_key("Matter/Mine.md"));
        assert!(!files.contains_key("Matter/Theirs.md"));
        assert!(!memory.snapshot().is_syncing);
    }

    #[tokio::test]
    async fn test_highlights_rendered_in_reading_order() {
        let api = FakeApi::with_pages(vec![vec![entry("1", "A")
            .with_annotation(Annotation::new("thirty", 30, at(2)))
            .with_annotation(Annotation::new("five", 5, at(3)))
            .with_annotation(Annotation::new("twelve", 12, at(4)))]]);
        let (engine, _, _) = engine(api, signed_in());

        completed(engine.sync().await.unwrap());
        let note = &engine.vault().files()["Matter/A.md"];
        assert!(note.ends_with("* five\n* twelve\n* thirty"));
    }

    #[tokio::test]
    async fn test_auth_failure_refreshes_once_and_retries() {
        let api = FakeApi::with_pages(vec![vec![entry("1", "A")]]);
        api.fail_auth(1);
        api.refresh_to(Some("access-2"));
        let (engine, store, _) = engine(api, signed_in());

        let report = completed(engine.sync().await.unwrap());
        assert_eq!(report.created, 1);
        assert_eq!(engine.api().refresh_count(), 1);
        assert_eq!(engine.api().tokens_seen(), vec!["access-1", "access-2"]);

        let state = store.snapshot();
        assert_eq!(state.access_token.as_deref(), Some("access-2"));
        assert_eq!(state.refresh_token.as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn test_second_auth_failure_aborts() {
        let api = FakeApi::with_pages(vec![vec![entry("1", "A")]]);
        api.fail_auth(2);
        api.refresh_to(Some("access-2"));
        let (engine, store, notifier) = engine(api, signed_in());

        let err = engine.sync().await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(engine.api().refresh_count(), 1);
        assert_eq!(engine.api().fetch_count(), 2);

        let state = store.snapshot();
        assert!(!state.is_syncing);
        assert!(state.last_sync.is_none());
        assert!(engine.vault().files().is_empty());
        assert_eq!(
            notifier.messages(),
            vec![
                "Syncing with Matter",
                "Unable to sync with Matter, please sign in again."
            ]
        );
    }

    #[tokio::test]
    async fn test_refresh_without_token_fails_the_run() {
        let api = FakeApi::with_pages(vec![vec![entry("1", "A")]]);
        api.fail_auth(1);
        api.refresh_to(None);
        let (engine, store, _) = engine(api, signed_in());

        let err = engine.sync().await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(engine.api().fetch_count(), 1);
        assert!(!store.snapshot().is_syncing);
    }

    #[tokio::test]
    async fn test_request_failure_notifies_once() {
        let api = FakeApi::with_pages(vec![vec![entry("1", "A")]]);
        api.fail_request(502);
        let mut state = signed_in();
        state.notify_on_sync = NotifyPreference::Error;
        let (engine, store, notifier) = engine(api, state);

        let err = engine.sync().await.unwrap_err();
        assert!(matches!(err, SyncError::Api(ApiError::Request { status: 502, .. })));
        assert_eq!(engine.api().refresh_count(), 0);
        assert!(!store.snapshot().is_syncing);
        assert_eq!(
            notifier.messages(),
            vec!["There was a problem syncing with Matter, try again later."]
        );
    }

    #[tokio::test]
    async fn test_skips_while_another_run_holds_the_flag() {
        let mut state = signed_in();
        state.is_syncing = true;
        let (engine, store, notifier) = engine(FakeApi::new(), state);

        let outcome = engine.sync().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::AlreadySyncing));
        assert_eq!(engine.api().fetch_count(), 0);
        assert_eq!(store.save_count(), 0);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_skips_without_access_token() {
        let (engine, _, _) = engine(FakeApi::new(), SyncState::default());

        let outcome = engine.sync().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::NoAccessToken));
        assert!(outcome.report().is_none());
        assert_eq!(engine.api().fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_deleted_note_respects_recreate_setting() {
        let api = FakeApi::with_pages(vec![vec![entry("1", "A")]]);
        let mut state = signed_in();
        state.content_map.insert("A.md".to_string(), "1".to_string());
        state.recreate_if_missing = false;
        let (engine, store, _) = engine(api, state);

        let report = completed(engine.sync().await.unwrap());
        assert_eq!(report.skipped_missing, 1);
        assert!(engine.vault().files().is_empty());

        store.update(|s| s.recreate_if_missing = true);
        let report = completed(engine.sync().await.unwrap());
        assert_eq!(report.created, 1);
        assert!(engine.vault().files().contains_key("Matter/A.md"));
    }

    #[tokio::test]
    async fn test_template_failure_is_isolated_and_retried() {
        let api = FakeApi::with_pages(vec![vec![
            entry("2", "B").with_annotation(Annotation::new("b", 1, at(2))),
            entry("1", "A"),
        ]]);
        let mut state = signed_in();
        state.highlight_template = Some("{{ text | no_such_filter }}".to_string());
        let (engine, store, notifier) = engine(api, state);

        let report = completed(engine.sync().await.unwrap());
        assert_eq!(report.created, 1);
        assert_eq!(report.template_failures, 1);
        assert!(!store.snapshot().is_mapped("2"));
        assert!(notifier
            .messages()
            .iter()
            .any(|m| m == "1 Matter entries could not be rendered, check your templates"));

        store.update(|s| s.highlight_template = None);
        let report = completed(engine.sync().await.unwrap());
        assert_eq!(report.created, 1);
        assert!(store.snapshot().is_mapped("2"));
    }

    #[tokio::test]
    async fn test_notifications_respect_never() {
        let api = FakeApi::with_pages(vec![vec![entry("1", "A")]]);
        api.fail_request(500);
        let mut state = signed_in();
        state.notify_on_sync = NotifyPreference::Never;
        let (engine, _, notifier) = engine(api, state);

        assert!(engine.sync().await.is_err());
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_custom_data_dir_is_created() {
        let api = FakeApi::with_pages(vec![vec![entry("1", "A")]]);
        let mut state = signed_in();
        state.data_dir = "Reading/Highlights".to_string();
        let (engine, _, _) = engine(api, state);

        completed(engine.sync().await.unwrap());
        assert!(engine.vault().exists("Reading/Highlights").await.unwrap());
        assert!(engine.vault().files().contains_key("Reading/Highlights/A.md"));
    }

    #[tokio::test]
    async fn test_vault_failure_releases_flag() {
        let api = FakeApi::with_pages(vec![vec![entry("1", "A")]]);
        let (engine, store, _) = engine(api, signed_in());
        engine.vault().fail_writes_under("Matter");

        let err = engine.sync().await.unwrap_err();
        assert!(matches!(err, SyncError::Vault(_)));
        assert!(!store.snapshot().is_syncing);
        assert!(store.snapshot().content_map.is_empty());
    }
}
