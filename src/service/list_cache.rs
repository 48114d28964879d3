//! Swappable snapshot of the moderation lists.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::ListIds;
use crate::domain::{ListSizes, ListSnapshot};
use crate::error::IngestError;
use crate::lists::ListService;

/// Holds the current [`ListSnapshot`] behind a reference that is replaced
/// whole on each successful refresh.
///
/// Readers clone the `Arc` and classify against it; a refresh in flight
/// never blocks them and never exposes a partially fetched snapshot.
#[derive(Debug)]
pub struct ListCache {
    ids: ListIds,
    snapshot: RwLock<Arc<ListSnapshot>>,
}

impl ListCache {
    /// Creates a cache with an empty snapshot.
    #[must_use]
    pub fn new(ids: ListIds) -> Self {
        Self {
            ids,
            snapshot: RwLock::new(Arc::new(ListSnapshot::default())),
        }
    }

    /// The most recently published snapshot.
    pub async fn snapshot(&self) -> Arc<ListSnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// Fetches all five lists and publishes them as one snapshot.
    ///
    /// # Errors
    ///
    /// Returns the first list fetch failure. The previous snapshot stays
    /// published.
    pub async fn refresh<L: ListService>(&self, lists: &L) -> Result<ListSizes, IngestError> {
        let (deny_news, deny_data, allow_news, allow_data, journalists) = tokio::try_join!(
            lists.list_members(&self.ids.news_deny),
            lists.list_members(&self.ids.data_deny),
            lists.list_members(&self.ids.news_allow),
            lists.list_members(&self.ids.data_allow),
            lists.list_members(&self.ids.journalists),
        )?;

        let snapshot = ListSnapshot {
            deny_news,
            deny_data,
            allow_news,
            allow_data,
            journalists,
        };
        let sizes = snapshot.sizes();
        *self.snapshot.write().await = Arc::new(snapshot);
        tracing::info!(?sizes, "list snapshot refreshed");
        Ok(sizes)
    }
}
