//! Journalist table retention.

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::IngestError;
use crate::persistence::RetentionStore;

/// Removes journalist rows older than a fixed window.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPurger {
    max_age: TimeDelta,
}

impl RetentionPurger {
    /// Purger keeping `hours` of journalist posts.
    #[must_use]
    pub fn new(hours: u32) -> Self {
        Self {
            max_age: TimeDelta::hours(i64::from(hours)),
        }
    }

    /// Rows indexed at or before this instant are purged.
    #[must_use]
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.max_age
    }

    /// Purges rows older than the window, relative to the current time.
    ///
    /// # Errors
    ///
    /// Propagates the store's failure.
    pub async fn purge<S: RetentionStore>(&self, store: &S) -> Result<u64, IngestError> {
        let cutoff = self.cutoff(Utc::now());
        let purged = store.purge_journalist_before(cutoff).await?;
        tracing::info!(purged, %cutoff, "retention purge complete");
        Ok(purged)
    }
}
