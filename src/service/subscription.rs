//! Subscription driver.
//!
//! Owns the event loop: login, initial list load, cursor resume, then one
//! commit at a time through extract → classify → write. The cursor and the
//! list/retention maintenance run on sequence-number cadences.

use std::num::NonZeroU64;
use std::sync::Arc;

use chrono::Utc;

use super::batch::{apply_batch, build_batch};
use super::extractor::extract_operations;
use super::list_cache::ListCache;
use super::retention::RetentionPurger;
use super::validator::{LexiconValidator, SchemaValidator};
use crate::config::{IngestConfig, ListIds};
use crate::domain::{Commit, IngestStatus, RepoEvent, SubscriptionState};
use crate::error::IngestError;
use crate::firehose::EventSource;
use crate::lists::ListService;
use crate::persistence::{CursorStore, IngestWriter, RetentionStore};

/// Driver tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSettings {
    /// Service identity of the cursor row.
    pub service: String,
    /// Store the cursor when `seq % cursor_interval == 0`.
    pub cursor_interval: NonZeroU64,
    /// Refresh lists and purge when `seq % refresh_interval == 0`.
    pub refresh_interval: NonZeroU64,
    /// Journalist retention window in hours.
    pub retention_hours: u32,
}

impl SubscriptionSettings {
    /// Settings taken from the ingest configuration.
    #[must_use]
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            service: config.subscription_endpoint.clone(),
            cursor_interval: config.cursor_update_interval,
            refresh_interval: config.list_refresh_interval,
            retention_hours: config.retention_hours,
        }
    }
}

/// The firehose subscription: a single consumer that processes commits
/// strictly in the order the source delivers them.
#[derive(Debug)]
pub struct FirehoseSubscription<S, L, E, V = LexiconValidator> {
    store: Arc<S>,
    lists: L,
    source: E,
    validator: V,
    cache: ListCache,
    purger: RetentionPurger,
    settings: SubscriptionSettings,
    status: Arc<IngestStatus>,
}

impl<S, L, E> FirehoseSubscription<S, L, E>
where
    S: IngestWriter + CursorStore + RetentionStore,
    L: ListService,
    E: EventSource,
{
    /// Creates a driver using the [`LexiconValidator`].
    #[must_use]
    pub fn new(
        store: Arc<S>,
        lists: L,
        source: E,
        list_ids: ListIds,
        settings: SubscriptionSettings,
        status: Arc<IngestStatus>,
    ) -> Self {
        Self::with_validator(store, lists, source, LexiconValidator, list_ids, settings, status)
    }
}

impl<S, L, E, V> FirehoseSubscription<S, L, E, V>
where
    S: IngestWriter + CursorStore + RetentionStore,
    L: ListService,
    E: EventSource,
    V: SchemaValidator,
{
    /// Creates a driver with a custom schema validator.
    #[must_use]
    pub fn with_validator(
        store: Arc<S>,
        lists: L,
        source: E,
        validator: V,
        list_ids: ListIds,
        settings: SubscriptionSettings,
        status: Arc<IngestStatus>,
    ) -> Self {
        Self {
            store,
            lists,
            source,
            validator,
            cache: ListCache::new(list_ids),
            purger: RetentionPurger::new(settings.retention_hours),
            settings,
            status,
        }
    }

    /// Runs until the source ends or a fatal error occurs. The status is
    /// left in [`SubscriptionState::Disconnected`] either way.
    ///
    /// # Errors
    ///
    /// Returns login failures, the initial list load failure, cursor load
    /// failures, connect failures and source failures. Errors while
    /// handling individual commits are logged and never returned.
    pub async fn run(&mut self) -> Result<(), IngestError> {
        let result = self.drive().await;
        if let Err(err) = &result {
            tracing::error!(error = %err, kind = err.kind(), "subscription stopped");
        }
        self.status.set_state(SubscriptionState::Disconnected);
        result
    }

    async fn drive(&mut self) -> Result<(), IngestError> {
        self.status.set_state(SubscriptionState::Authenticating);
        self.lists.login().await?;
        match self.cache.refresh(&self.lists).await {
            Ok(sizes) => self.status.record_list_refresh(Some(sizes)),
            Err(err) => {
                self.status.record_list_refresh(None);
                return Err(err);
            }
        }

        let cursor = self.store.load_cursor(&self.settings.service).await?;
        self.status.set_state(SubscriptionState::Resuming { cursor });
        self.source.connect(cursor).await?;
        self.status.set_state(SubscriptionState::Streaming);
        tracing::info!(service = %self.settings.service, ?cursor, "streaming");

        let mut last_seq: Option<i64> = None;
        while let Some(event) = self.source.next_event().await? {
            let RepoEvent::Commit(commit) = event else {
                continue;
            };
            if last_seq.is_some_and(|last| commit.seq <= last) {
                tracing::warn!(seq = commit.seq, ?last_seq, "sequence went backwards");
            }
            last_seq = Some(commit.seq);
            self.process(&commit).await;
        }
        tracing::info!(?last_seq, "event stream ended");
        Ok(())
    }

    async fn process(&self, commit: &Commit) {
        let failed = match self.handle_commit(commit).await {
            Ok(()) => false,
            Err(err) => {
                tracing::warn!(
                    seq = commit.seq,
                    repo = %commit.repo,
                    error = %err,
                    kind = err.kind(),
                    "failed to process commit"
                );
                true
            }
        };
        self.status.record_commit(commit.seq, failed);

        if on_cadence(commit.seq, self.settings.cursor_interval) {
            self.store_cursor(commit.seq).await;
        }
        if on_cadence(commit.seq, self.settings.refresh_interval) {
            self.maintain().await;
        }
    }

    /// Extracts, classifies and writes one commit.
    ///
    /// # Errors
    ///
    /// Returns the storage failure that aborted the commit's writes.
    pub async fn handle_commit(&self, commit: &Commit) -> Result<(), IngestError> {
        let ops = extract_operations(commit, &self.validator);
        if ops.posts.is_empty() {
            return Ok(());
        }
        let snapshot = self.cache.snapshot().await;
        let batch = build_batch(&ops, &snapshot, Utc::now());
        apply_batch(self.store.as_ref(), &batch, &self.status).await
    }

    async fn store_cursor(&self, seq: i64) {
        match self.store.store_cursor(&self.settings.service, seq).await {
            Ok(()) => {
                self.status.record_cursor(seq);
                tracing::debug!(seq, "cursor stored");
            }
            Err(err) => tracing::warn!(seq, error = %err, "failed to store cursor"),
        }
    }

    async fn maintain(&self) {
        let (refresh, purge) = tokio::join!(
            self.cache.refresh(&self.lists),
            self.purger.purge(self.store.as_ref()),
        );
        match refresh {
            Ok(sizes) => self.status.record_list_refresh(Some(sizes)),
            Err(err) => {
                self.status.record_list_refresh(None);
                tracing::warn!(error = %err, "list refresh failed, keeping previous snapshot");
            }
        }
        match purge {
            Ok(rows) => self.status.record_purged(rows),
            Err(err) => tracing::warn!(error = %err, "retention purge failed"),
        }
    }
}

/// Whether `seq` is a multiple of `interval`. Negative sequences never are.
fn on_cadence(seq: i64, interval: NonZeroU64) -> bool {
    u64::try_from(seq).is_ok_and(|seq| seq % interval == 0)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::records::POST_NSID;
    use crate::domain::{BlockMap, Category, OpAction, RepoOp};
    use crate::firehose::testing::{cid_for, external_embed, post_ipld, record_block};
    use crate::service::testing::{FakeLists, FakeSource, RecordingStore, list_ids};

    const SERVICE: &str = "wss://bsky.network";
    const REPORTER: &str = "did:plc:reporter";

    fn every(interval: u64) -> NonZeroU64 {
        let Some(interval) = NonZeroU64::new(interval) else {
            panic!("cadence must be positive");
        };
        interval
    }

    fn settings() -> SubscriptionSettings {
        SubscriptionSettings {
            service: SERVICE.to_string(),
            cursor_interval: every(20),
            refresh_interval: every(10_000),
            retention_hours: 336,
        }
    }

    /// A commit by the reporter creating one post per `(rkey, text)`.
    fn commit(seq: i64, posts: &[(&str, &str)]) -> RepoEvent {
        let mut blocks = BlockMap::new();
        let mut ops = Vec::new();
        for (i, (rkey, text)) in posts.iter().enumerate() {
            let cid = cid_for(u8::try_from(i).unwrap_or(0).wrapping_add(1));
            blocks.insert(cid, record_block(&post_ipld(text, None)));
            ops.push(RepoOp {
                action: OpAction::Create,
                path: format!("{POST_NSID}/{rkey}"),
                cid: Some(cid),
            });
        }
        RepoEvent::Commit(Commit {
            seq,
            repo: REPORTER.to_string(),
            ops,
            blocks,
        })
    }

    fn empty_commit(seq: i64) -> RepoEvent {
        commit(seq, &[])
    }

    fn driver(
        store: &Arc<RecordingStore>,
        lists: FakeLists,
        events: Vec<RepoEvent>,
    ) -> FirehoseSubscription<RecordingStore, FakeLists, FakeSource> {
        lists.set(&list_ids().journalists, &[REPORTER]);
        FirehoseSubscription::new(
            Arc::clone(store),
            lists,
            FakeSource::new(events),
            list_ids(),
            settings(),
            Arc::new(IngestStatus::new()),
        )
    }

    fn uris(rows: &[crate::domain::FeedRow]) -> Vec<&str> {
        rows.iter().map(|r| r.uri.as_str()).collect()
    }

    #[tokio::test]
    async fn cursor_is_stored_on_multiples_only() {
        let store = Arc::new(RecordingStore::new());
        let events = (5..=24).map(empty_commit).collect();
        let mut sub = driver(&store, FakeLists::new(), events);
        assert!(sub.run().await.is_ok());

        assert_eq!(store.cursor_writes(), vec![20]);
        assert_eq!(sub.status.report().stored_cursor, Some(20));
        assert_eq!(sub.status.report().last_seq, Some(24));
    }

    #[test]
    fn cadence_never_fires_on_negative_sequences() {
        assert!(on_cadence(40, every(20)));
        assert!(!on_cadence(41, every(20)));
        assert!(!on_cadence(-20, every(20)));
        assert!(!on_cadence(i64::MIN, every(1)));
        assert!(on_cadence(i64::MAX, every(1)));
    }

    #[tokio::test]
    async fn resumes_from_stored_cursor() {
        let store = Arc::new(RecordingStore::new());
        assert!(store.inner.store_cursor(SERVICE, 40).await.is_ok());
        let mut sub = driver(&store, FakeLists::new(), Vec::new());
        assert!(sub.run().await.is_ok());
        assert_eq!(sub.source.connected_with, Some(Some(40)));
    }

    #[tokio::test]
    async fn cold_start_connects_without_cursor() {
        let store = Arc::new(RecordingStore::new());
        let mut sub = driver(&store, FakeLists::new(), Vec::new());
        assert!(sub.run().await.is_ok());
        assert_eq!(sub.source.connected_with, Some(None));
    }

    #[tokio::test]
    async fn malformed_op_does_not_sink_the_commit() {
        let store = Arc::new(RecordingStore::new());
        let RepoEvent::Commit(mut bad) = commit(3, &[("good", "fine")]) else {
            panic!("expected commit");
        };
        bad.ops.insert(
            0,
            RepoOp {
                action: OpAction::Create,
                path: format!("{POST_NSID}/orphan"),
                cid: Some(cid_for(99)),
            },
        );
        let mut sub = driver(&store, FakeLists::new(), vec![RepoEvent::Commit(bad)]);
        assert!(sub.run().await.is_ok());

        let rows = store.rows(Category::Journalist).await;
        assert_eq!(uris(&rows), vec!["at://did:plc:reporter/app.bsky.feed.post/good"]);
    }

    #[tokio::test]
    async fn storage_failure_skips_event_and_continues() {
        let store = Arc::new(RecordingStore::new());
        store.fail_upserts(true);
        let events = vec![commit(1, &[("a", "first")]), commit(2, &[("b", "second")])];
        let mut sub = driver(&store, FakeLists::new(), events);
        assert!(sub.run().await.is_ok());

        let report = sub.status.report();
        assert_eq!(report.commits_processed, 2);
        assert_eq!(report.events_failed, 2);
        assert!(store.rows(Category::Journalist).await.is_empty());
    }

    #[tokio::test]
    async fn events_are_processed_in_received_order() {
        let store = Arc::new(RecordingStore::new());
        let events = vec![commit(19, &[("nineteen", "a")]), commit(18, &[("eighteen", "b")])];
        let mut sub = driver(&store, FakeLists::new(), events);
        assert!(sub.run().await.is_ok());

        let rows = store.rows(Category::Journalist).await;
        assert_eq!(
            uris(&rows),
            vec![
                "at://did:plc:reporter/app.bsky.feed.post/nineteen",
                "at://did:plc:reporter/app.bsky.feed.post/eighteen",
            ]
        );
        assert_eq!(sub.status.report().last_seq, Some(18));
    }

    #[tokio::test]
    async fn post_matching_two_categories_lands_in_both() {
        let store = Arc::new(RecordingStore::new());
        let text = "📰 📊 https://news.test/chart";
        let RepoEvent::Commit(mut event) = commit(7, &[("both", text)]) else {
            panic!("expected commit");
        };
        let Some(cid) = event.ops.first().and_then(|op| op.cid) else {
            panic!("missing cid");
        };
        event
            .blocks
            .insert(cid, record_block(&post_ipld(text, Some(external_embed(true)))));
        let mut sub = driver(&store, FakeLists::new(), vec![RepoEvent::Commit(event)]);
        assert!(sub.run().await.is_ok());

        let headline = store.rows(Category::Headline).await;
        let chart = store.rows(Category::Chart).await;
        assert_eq!(uris(&headline), uris(&chart));
        assert_eq!(headline.len(), 1);
    }

    #[tokio::test]
    async fn rejected_login_is_fatal() {
        let store = Arc::new(RecordingStore::new());
        let lists = FakeLists::new();
        lists.reject_login();
        let mut sub = driver(&store, lists, vec![empty_commit(1)]);

        let result = sub.run().await;
        assert!(matches!(&result, Err(err) if err.is_fatal()));
        assert_eq!(sub.lists.fetches(), 0);
        assert_eq!(sub.source.connected_with, None);
        assert_eq!(sub.status.state(), SubscriptionState::Disconnected);
    }

    #[tokio::test]
    async fn initial_list_failure_stops_before_streaming() {
        let store = Arc::new(RecordingStore::new());
        let lists = FakeLists::new();
        lists.fail(&list_ids().news_deny);
        let mut sub = driver(&store, lists, vec![empty_commit(1)]);

        assert!(matches!(sub.run().await, Err(IngestError::ListFetch { .. })));
        assert_eq!(sub.source.connected_with, None);
        assert_eq!(sub.status.report().list_refresh_failures, 1);
    }

    #[tokio::test]
    async fn connect_failure_is_fatal() {
        let store = Arc::new(RecordingStore::new());
        let mut sub = driver(&store, FakeLists::new(), Vec::new());
        sub.source.refuse_connect = true;
        assert!(matches!(sub.run().await, Err(IngestError::Transport(_))));
    }

    #[tokio::test]
    async fn refresh_and_purge_run_on_cadence() {
        let store = Arc::new(RecordingStore::new());
        let events = vec![empty_commit(9_999), empty_commit(10_000), empty_commit(10_001)];
        let mut sub = driver(&store, FakeLists::new(), events);
        assert!(sub.run().await.is_ok());

        assert_eq!(store.purges(), 1);
        assert_eq!(sub.lists.logins(), 1);
        // Startup refresh plus the cadence refresh, five lists each.
        assert_eq!(sub.lists.fetches(), 10);
        assert_eq!(sub.status.report().list_refreshes, 2);
    }

    #[tokio::test]
    async fn failed_cadence_refresh_keeps_streaming_on_old_snapshot() {
        let store = Arc::new(RecordingStore::new());
        let lists = FakeLists::new();
        // The startup refresh is served; every later fetch fails.
        lists.fail_after(5);
        let events = vec![empty_commit(10_000), commit(10_001, &[("after", "still here")])];
        let mut sub = driver(&store, lists, events);

        assert!(sub.run().await.is_ok());
        assert_eq!(store.rows(Category::Journalist).await.len(), 1);
        assert_eq!(store.purges(), 1);
        let report = sub.status.report();
        assert_eq!(report.list_refreshes, 1);
        assert_eq!(report.list_refresh_failures, 1);
        assert_eq!(report.list_sizes.journalists, 1);
    }

    #[tokio::test]
    async fn non_commit_events_are_ignored() {
        let store = Arc::new(RecordingStore::new());
        let events = vec![
            RepoEvent::Other {
                kind: "identity".to_string(),
                seq: Some(20),
            },
            empty_commit(21),
        ];
        let mut sub = driver(&store, FakeLists::new(), events);
        assert!(sub.run().await.is_ok());
        assert!(store.cursor_writes().is_empty());
        assert_eq!(sub.status.report().commits_processed, 1);
    }
}
