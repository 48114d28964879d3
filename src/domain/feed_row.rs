//! Rows written to the category tables.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::operation::PostCreate;
use super::records::{reply_parent, reply_root};

/// One stored post reference.
///
/// The same shape is used for every category table; `has_external` is only
/// persisted by the journalist table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedRow {
    /// Primary key. At most one row per URI per table.
    pub uri: String,
    /// Record CID at the time of indexing.
    pub cid: String,
    /// Author DID.
    pub author: String,
    /// URI of the post this one replies to.
    pub reply_parent: Option<String>,
    /// URI of the thread root.
    pub reply_root: Option<String>,
    /// When the pipeline indexed the post.
    pub indexed_at: DateTime<Utc>,
    /// Whether the post links out (embedded card or inline URL).
    pub has_external: bool,
}

impl FeedRow {
    /// Maps a classified post creation to a row.
    #[must_use]
    pub fn from_create(create: &PostCreate, indexed_at: DateTime<Utc>, has_external: bool) -> Self {
        Self {
            uri: create.uri.clone(),
            cid: create.cid.clone(),
            author: create.author.clone(),
            reply_parent: reply_parent(&create.record).map(str::to_string),
            reply_root: reply_root(&create.record).map(str::to_string),
            indexed_at,
            has_external,
        }
    }
}
