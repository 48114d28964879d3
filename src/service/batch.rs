//! Per-commit write batch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::classifier::{classify, has_external_link};
use crate::domain::{Category, FeedRow, IngestStatus, ListSnapshot, OperationsByType};
use crate::error::IngestError;
use crate::persistence::IngestWriter;

/// Rows to write for one commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestBatch {
    /// URIs of deleted posts, removed from every category table.
    pub deletes: Vec<String>,
    /// Classified rows per category, in source order.
    pub rows: BTreeMap<Category, Vec<FeedRow>>,
}

impl IngestBatch {
    /// Returns `true` if the batch writes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.rows.values().all(Vec::is_empty)
    }

    /// Rows destined for `category`.
    #[must_use]
    pub fn rows(&self, category: Category) -> &[FeedRow] {
        self.rows.get(&category).map_or(&[], Vec::as_slice)
    }
}

/// Classifies the commit's post creates against `lists` and collects the
/// post deletes.
#[must_use]
pub fn build_batch(
    ops: &OperationsByType,
    lists: &ListSnapshot,
    indexed_at: DateTime<Utc>,
) -> IngestBatch {
    let mut batch = IngestBatch {
        deletes: ops.posts.delete_uris(),
        rows: BTreeMap::new(),
    };
    for post in &ops.posts.creates {
        let categories = classify(post, lists);
        if categories.is_empty() {
            continue;
        }
        let has_external = has_external_link(post);
        for category in categories {
            batch
                .rows
                .entry(category)
                .or_default()
                .push(FeedRow::from_create(post, indexed_at, has_external));
        }
    }
    batch
}

/// Writes `batch`: deletes first, then one insert per non-empty category.
///
/// # Errors
///
/// Returns the first storage failure; later writes of the batch are not
/// attempted.
pub async fn apply_batch<W: IngestWriter>(
    store: &W,
    batch: &IngestBatch,
    status: &IngestStatus,
) -> Result<(), IngestError> {
    if !batch.deletes.is_empty() {
        let removed = store.remove(&batch.deletes).await?;
        status.record_deleted(removed);
        tracing::debug!(uris = batch.deletes.len(), removed, "deleted posts");
    }
    for (category, rows) in &batch.rows {
        if rows.is_empty() {
            continue;
        }
        let written = store.upsert(*category, rows).await?;
        status.record_written(*category, written);
        tracing::debug!(%category, rows = ?rows, written, "created rows");
    }
    Ok(())
}
