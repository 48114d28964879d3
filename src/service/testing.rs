//! Fakes for the pipeline's collaborators.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::config::ListIds;
use crate::domain::{Category, FeedRow, ListSnapshot, RepoEvent};
use crate::error::IngestError;
use crate::firehose::EventSource;
use crate::lists::ListService;
use crate::persistence::{CursorStore, IngestWriter, MemoryPersistence, RetentionStore};

pub(crate) fn list_ids() -> ListIds {
    let list = |name: &str| format!("at://did:plc:curator/app.bsky.graph.list/{name}");
    ListIds {
        news_deny: list("news-deny"),
        data_deny: list("data-deny"),
        news_allow: list("news-allow"),
        data_allow: list("data-allow"),
        journalists: list("journalists"),
    }
}

pub(crate) fn snapshot(deny_news: &[&str], journalists: &[&str]) -> ListSnapshot {
    let set = |ids: &[&str]| ids.iter().map(|id| id.to_string()).collect();
    ListSnapshot {
        deny_news: set(deny_news),
        journalists: set(journalists),
        ..ListSnapshot::default()
    }
}

/// List service backed by a map; unknown lists are empty.
#[derive(Debug, Default)]
pub(crate) struct FakeLists {
    members: Mutex<HashMap<String, HashSet<String>>>,
    failing: Mutex<HashSet<String>>,
    reject_login: AtomicBool,
    logins: AtomicUsize,
    fetches: AtomicUsize,
    fail_after: AtomicUsize,
}

impl FakeLists {
    pub(crate) fn new() -> Self {
        Self {
            fail_after: AtomicUsize::new(usize::MAX),
            ..Self::default()
        }
    }

    pub(crate) fn set(&self, list: &str, members: &[&str]) {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(list.to_string(), members.iter().map(|m| m.to_string()).collect());
    }

    pub(crate) fn fail(&self, list: &str) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(list.to_string());
    }

    /// Fails every fetch once `fetches` have been served.
    pub(crate) fn fail_after(&self, fetches: usize) {
        self.fail_after.store(fetches, Ordering::SeqCst);
    }

    pub(crate) fn reject_login(&self) {
        self.reject_login.store(true, Ordering::SeqCst);
    }

    pub(crate) fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ListService for FakeLists {
    async fn login(&self) -> Result<(), IngestError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.reject_login.load(Ordering::SeqCst) {
            return Err(IngestError::Auth("invalid password".to_string()));
        }
        Ok(())
    }

    async fn list_members(&self, list: &str) -> Result<HashSet<String>, IngestError> {
        let served = self.fetches.fetch_add(1, Ordering::SeqCst);
        if served >= self.fail_after.load(Ordering::SeqCst)
            || self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(list)
        {
            return Err(IngestError::ListFetch {
                list: list.to_string(),
                message: "503 Service Unavailable".to_string(),
            });
        }
        Ok(self
            .members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(list)
            .cloned()
            .unwrap_or_default())
    }
}

/// Replays a fixed event sequence, then ends.
#[derive(Debug, Default)]
pub(crate) struct FakeSource {
    events: VecDeque<RepoEvent>,
    pub(crate) connected_with: Option<Option<i64>>,
    pub(crate) refuse_connect: bool,
}

impl FakeSource {
    pub(crate) fn new(events: Vec<RepoEvent>) -> Self {
        Self {
            events: events.into(),
            ..Self::default()
        }
    }
}

impl EventSource for FakeSource {
    async fn connect(&mut self, cursor: Option<i64>) -> Result<(), IngestError> {
        if self.refuse_connect {
            return Err(IngestError::Transport("connection refused".to_string()));
        }
        self.connected_with = Some(cursor);
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<RepoEvent>, IngestError> {
        Ok(self.events.pop_front())
    }
}

/// Memory store that records cursor writes and can be told to fail inserts.
#[derive(Debug, Default)]
pub(crate) struct RecordingStore {
    pub(crate) inner: MemoryPersistence,
    cursor_writes: Mutex<Vec<i64>>,
    fail_upserts: AtomicBool,
    purges: AtomicUsize,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cursor_writes(&self) -> Vec<i64> {
        self.cursor_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn purges(&self) -> usize {
        self.purges.load(Ordering::SeqCst)
    }

    pub(crate) async fn rows(&self, category: Category) -> Vec<FeedRow> {
        self.inner.rows(category).await
    }
}

impl IngestWriter for RecordingStore {
    async fn upsert(&self, category: Category, rows: &[FeedRow]) -> Result<u64, IngestError> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(IngestError::Persistence("connection reset".to_string()));
        }
        self.inner.upsert(category, rows).await
    }

    async fn remove(&self, uris: &[String]) -> Result<u64, IngestError> {
        self.inner.remove(uris).await
    }
}

impl CursorStore for RecordingStore {
    async fn load_cursor(&self, service: &str) -> Result<Option<i64>, IngestError> {
        self.inner.load_cursor(service).await
    }

    async fn store_cursor(&self, service: &str, seq: i64) -> Result<(), IngestError> {
        self.cursor_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(seq);
        self.inner.store_cursor(service, seq).await
    }
}

impl RetentionStore for RecordingStore {
    async fn purge_journalist_before(&self, cutoff: DateTime<Utc>) -> Result<u64, IngestError> {
        self.purges.fetch_add(1, Ordering::SeqCst);
        self.inner.purge_journalist_before(cutoff).await
    }
}
