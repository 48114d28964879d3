//! Persistence layer: category tables, resumption cursor and retention.
//!
//! Three narrow traits cover what the pipeline needs from storage. Both
//! [`PostgresPersistence`] and [`MemoryPersistence`] implement all of them
//! with the same semantics: first write wins on URI, deletes span every
//! category table, and the cursor is a single overwritten row per service.

pub mod memory;
pub mod postgres;

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::domain::{Category, FeedRow};
use crate::error::IngestError;

pub use memory::MemoryPersistence;
pub use postgres::PostgresPersistence;

/// Batch writes to the category tables.
pub trait IngestWriter: Send + Sync {
    /// Inserts `rows` into the `category` table, skipping any whose URI is
    /// already stored. Returns the number of rows actually inserted. An
    /// empty slice performs no write.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Persistence`] on storage failure; no row of
    /// the batch is visible in that case.
    fn upsert(
        &self,
        category: Category,
        rows: &[FeedRow],
    ) -> impl Future<Output = Result<u64, IngestError>> + Send;

    /// Deletes every row whose URI is in `uris` from every category table.
    /// Absent URIs are ignored. Returns the number of rows removed. An empty
    /// slice performs no write.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Persistence`] on storage failure.
    fn remove(&self, uris: &[String]) -> impl Future<Output = Result<u64, IngestError>> + Send;
}

/// Durable resumption position per firehose service.
pub trait CursorStore: Send + Sync {
    /// Last stored sequence for `service`, or `None` on a cold start.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Persistence`] on storage failure.
    fn load_cursor(
        &self,
        service: &str,
    ) -> impl Future<Output = Result<Option<i64>, IngestError>> + Send;

    /// Creates or overwrites the cursor row for `service`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Persistence`] on storage failure.
    fn store_cursor(
        &self,
        service: &str,
        seq: i64,
    ) -> impl Future<Output = Result<(), IngestError>> + Send;
}

/// Age-based removal from the journalist table.
pub trait RetentionStore: Send + Sync {
    /// Deletes journalist rows indexed at or before `cutoff`. Returns the
    /// number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Persistence`] on storage failure.
    fn purge_journalist_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, IngestError>> + Send;
}
