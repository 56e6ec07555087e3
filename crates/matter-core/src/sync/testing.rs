//! Test doubles for the sync engine

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::client::{ApiError, FeedApi, FeedPage, TokenPair};
use super::state::SyncState;
use super::store::{MemoryStateStore, StateError, StateStore};
use crate::models::FeedEntry;

pub const START_URL: &str = "https://feed.test/highlights_feed/";

/// Scripted feed: fixed pages keyed by URL, optional auth failures
#[derive(Default)]
pub struct FakeApi {
    pages: Mutex<HashMap<String, FeedPage>>,
    auth_failures: AtomicUsize,
    request_failure: Mutex<Option<u16>>,
    refreshed_token: Mutex<Option<String>>,
    fetches: AtomicUsize,
    refreshes: AtomicUsize,
    tokens_seen: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `pages` in order, newest records first as the real feed does
    pub fn with_pages(pages: Vec<Vec<FeedEntry>>) -> Self {
        let api = Self::new();
        api.set_pages(pages);
        api
    }

    pub fn set_pages(&self, pages: Vec<Vec<FeedEntry>>) {
        let count = pages.len();
        let mut map = self.pages.lock().unwrap();
        map.clear();
        for (i, records) in pages.into_iter().enumerate() {
            let next = if i + 1 < count {
                Some(page_url(i + 1))
            } else {
                None
            };
            map.insert(page_url(i), FeedPage { records, next });
        }
    }

    /// Reject the next `n` fetches with an auth error
    pub fn fail_auth(&self, n: usize) {
        self.auth_failures.store(n, Ordering::SeqCst);
    }

    /// Reject every fetch with this status
    pub fn fail_request(&self, status: u16) {
        *self.request_failure.lock().unwrap() = Some(status);
    }

    /// Token handed out on refresh; `None` makes refresh fail
    pub fn refresh_to(&self, token: Option<&str>) {
        *self.refreshed_token.lock().unwrap() = token.map(str::to_string);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }
}

fn page_url(i: usize) -> String {
    if i == 0 {
        START_URL.to_string()
    } else {
        format!("{}?page={}", START_URL, i + 1)
    }
}

#[async_trait]
impl FeedApi for FakeApi {
    fn feed_url(&self) -> String {
        START_URL.to_string()
    }

    async fn fetch_page(&self, url: &str, access_token: &str) -> Result<FeedPage, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen
            .lock()
            .unwrap()
            .push(access_token.to_string());

        if let Some(status) = *self.request_failure.lock().unwrap() {
            return Err(ApiError::Request {
                status,
                body: "scripted failure".to_string(),
            });
        }

        let remaining = self.auth_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.auth_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ApiError::Auth("server responded 401".to_string()));
        }

        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(FeedPage {
                records: Vec::new(),
                next: None,
            }))
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> Result<TokenPair, ApiError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        match self.refreshed_token.lock().unwrap().clone() {
            Some(access_token) => Ok(TokenPair {
                access_token,
                refresh_token: Some("refresh-2".to_string()),
            }),
            None => Err(ApiError::Auth(
                "refresh did not return an access token".to_string(),
            )),
        }
    }
}

/// Store that plays a second device: once the run has started, the first
/// load applies a pending change before returning
#[derive(Clone)]
pub struct RacingStore {
    pub inner: MemoryStateStore,
    pending: Arc<Mutex<Option<Box<dyn FnOnce(&mut SyncState) + Send>>>>,
}

impl RacingStore {
    pub fn new(inner: MemoryStateStore, change: impl FnOnce(&mut SyncState) + Send + 'static) -> Self {
        Self {
            inner,
            pending: Arc::new(Mutex::new(Some(Box::new(change)))),
        }
    }
}

#[async_trait]
impl StateStore for RacingStore {
    async fn load(&self) -> Result<SyncState, StateError> {
        let state = self.inner.load().await?;
        if state.is_syncing {
            let pending = self.pending.lock().unwrap().take();
            if let Some(change) = pending {
                self.inner.update(change);
                return self.inner.load().await;
            }
        }
        Ok(state)
    }

    async fn save(&self, state: &SyncState) -> Result<(), StateError> {
        self.inner.save(state).await
    }
}

/// Signed-in state with setup complete
pub fn signed_in() -> SyncState {
    let mut state = SyncState::default();
    state.access_token = Some("access-1".to_string());
    state.refresh_token = Some("refresh-1".to_string());
    state.has_completed_initial_setup = true;
    state
}
