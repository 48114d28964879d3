//! Live driver status shared with the ops surface.
//!
//! The subscription driver is the only writer. The state machine value sits
//! in a [`tokio::sync::watch`] channel so observers can await transitions;
//! counters are plain atomics.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use super::{Category, ListSizes};

const NO_SEQ: i64 = -1;

/// Subscription driver state machine.
///
/// `Disconnected → Authenticating → Resuming → Streaming`, and back to
/// `Disconnected` on a fatal error or end of stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubscriptionState {
    /// Not connected.
    Disconnected,
    /// Logging in to the upstream service and loading lists.
    Authenticating,
    /// Loading the stored cursor and opening the stream.
    Resuming {
        /// Position the stream resumes from; `None` means provider default.
        cursor: Option<i64>,
    },
    /// Consuming events.
    Streaming,
}

/// Point-in-time copy of [`IngestStatus`], serialized by `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Current driver state.
    pub subscription: SubscriptionState,
    /// When the process started.
    pub started_at: DateTime<Utc>,
    /// Sequence of the most recent commit handled.
    pub last_seq: Option<i64>,
    /// Last cursor durably stored.
    pub stored_cursor: Option<i64>,
    /// Commit events handled (including failed ones).
    pub commits_processed: u64,
    /// Commit events whose processing failed.
    pub events_failed: u64,
    /// Rows inserted into the headline table.
    pub headlines_written: u64,
    /// Rows inserted into the chart table.
    pub charts_written: u64,
    /// Rows inserted into the journalist table.
    pub journalist_posts_written: u64,
    /// Rows removed by delete operations.
    pub rows_deleted: u64,
    /// Rows removed by retention purges.
    pub rows_purged: u64,
    /// Successful list refreshes.
    pub list_refreshes: u64,
    /// Failed list refreshes.
    pub list_refresh_failures: u64,
    /// Member counts of the active snapshot.
    pub list_sizes: ListSizes,
}

/// Shared, lock-free driver status.
#[derive(Debug)]
pub struct IngestStatus {
    state: watch::Sender<SubscriptionState>,
    list_sizes: watch::Sender<ListSizes>,
    started_at: DateTime<Utc>,
    last_seq: AtomicI64,
    stored_cursor: AtomicI64,
    commits_processed: AtomicU64,
    events_failed: AtomicU64,
    headlines_written: AtomicU64,
    charts_written: AtomicU64,
    journalist_posts_written: AtomicU64,
    rows_deleted: AtomicU64,
    rows_purged: AtomicU64,
    list_refreshes: AtomicU64,
    list_refresh_failures: AtomicU64,
}

impl IngestStatus {
    /// Creates a status in the `Disconnected` state with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(SubscriptionState::Disconnected),
            list_sizes: watch::Sender::new(ListSizes::default()),
            started_at: Utc::now(),
            last_seq: AtomicI64::new(NO_SEQ),
            stored_cursor: AtomicI64::new(NO_SEQ),
            commits_processed: AtomicU64::new(0),
            events_failed: AtomicU64::new(0),
            headlines_written: AtomicU64::new(0),
            charts_written: AtomicU64::new(0),
            journalist_posts_written: AtomicU64::new(0),
            rows_deleted: AtomicU64::new(0),
            rows_purged: AtomicU64::new(0),
            list_refreshes: AtomicU64::new(0),
            list_refresh_failures: AtomicU64::new(0),
        }
    }

    /// Publishes a state transition.
    pub fn set_state(&self, state: SubscriptionState) {
        tracing::debug!(?state, "subscription state changed");
        self.state.send_replace(state);
    }

    /// Current driver state.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        self.state.borrow().clone()
    }

    /// Records a handled commit.
    pub fn record_commit(&self, seq: i64, failed: bool) {
        self.last_seq.store(seq, Ordering::Relaxed);
        self.commits_processed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.events_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records rows inserted into a category table.
    pub fn record_written(&self, category: Category, rows: u64) {
        let counter = match category {
            Category::Headline => &self.headlines_written,
            Category::Chart => &self.charts_written,
            Category::Journalist => &self.journalist_posts_written,
        };
        counter.fetch_add(rows, Ordering::Relaxed);
    }

    /// Records rows removed by delete operations.
    pub fn record_deleted(&self, rows: u64) {
        self.rows_deleted.fetch_add(rows, Ordering::Relaxed);
    }

    /// Records rows removed by a retention purge.
    pub fn record_purged(&self, rows: u64) {
        self.rows_purged.fetch_add(rows, Ordering::Relaxed);
    }

    /// Records a durably stored cursor.
    pub fn record_cursor(&self, seq: i64) {
        self.stored_cursor.store(seq, Ordering::Relaxed);
    }

    /// Records the outcome of a list refresh.
    pub fn record_list_refresh(&self, sizes: Option<ListSizes>) {
        match sizes {
            Some(sizes) => {
                self.list_refreshes.fetch_add(1, Ordering::Relaxed);
                self.list_sizes.send_replace(sizes);
            }
            None => {
                self.list_refresh_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Takes a consistent-enough copy for reporting.
    #[must_use]
    pub fn report(&self) -> StatusReport {
        let seq = |value: &AtomicI64| Some(value.load(Ordering::Relaxed)).filter(|v| *v != NO_SEQ);
        StatusReport {
            subscription: self.state(),
            started_at: self.started_at,
            last_seq: seq(&self.last_seq),
            stored_cursor: seq(&self.stored_cursor),
            commits_processed: self.commits_processed.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
            headlines_written: self.headlines_written.load(Ordering::Relaxed),
            charts_written: self.charts_written.load(Ordering::Relaxed),
            journalist_posts_written: self.journalist_posts_written.load(Ordering::Relaxed),
            rows_deleted: self.rows_deleted.load(Ordering::Relaxed),
            rows_purged: self.rows_purged.load(Ordering::Relaxed),
            list_refreshes: self.list_refreshes.load(Ordering::Relaxed),
            list_refresh_failures: self.list_refresh_failures.load(Ordering::Relaxed),
            list_sizes: *self.list_sizes.borrow(),
        }
    }
}

impl Default for IngestStatus {
    fn default() -> Self {
        Self::new()
    }
}
