//! Repository change events as delivered by the firehose.

use std::collections::HashMap;

use ipld_core::cid::Cid;

/// Raw record blocks shipped with a commit, keyed by content identifier.
#[derive(Debug, Clone, Default)]
pub struct BlockMap {
    blocks: HashMap<Cid, Vec<u8>>,
}

impl BlockMap {
    /// Creates an empty block map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a block. A later block with the same CID replaces the earlier one.
    pub fn insert(&mut self, cid: Cid, bytes: Vec<u8>) {
        self.blocks.insert(cid, bytes);
    }

    /// Returns the raw bytes for `cid`, or `None` if the commit did not
    /// carry that block.
    #[must_use]
    pub fn get(&self, cid: &Cid) -> Option<&[u8]> {
        self.blocks.get(cid).map(Vec::as_slice)
    }

    /// Number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if the map holds no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl FromIterator<(Cid, Vec<u8>)> for BlockMap {
    fn from_iter<I: IntoIterator<Item = (Cid, Vec<u8>)>>(iter: I) -> Self {
        Self {
            blocks: iter.into_iter().collect(),
        }
    }
}

/// Mutation kind of a single repo operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpAction {
    /// A new record was written.
    Create,
    /// An existing record was replaced.
    Update,
    /// A record was removed.
    Delete,
}

impl OpAction {
    /// Parses the wire name (`"create"`, `"update"`, `"delete"`).
    #[must_use]
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One record mutation inside a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoOp {
    /// What happened to the record.
    pub action: OpAction,
    /// `{collection}/{record key}`.
    pub path: String,
    /// CID of the new record block. Absent for deletes.
    pub cid: Option<Cid>,
}

impl RepoOp {
    /// Collection NSID, i.e. the first path segment.
    #[must_use]
    pub fn collection(&self) -> &str {
        self.path.split('/').next().unwrap_or_default()
    }
}

/// A `#commit` event: a batch of operations on one repository.
#[derive(Debug, Clone)]
pub struct Commit {
    /// Stream sequence number. Strictly increasing, possibly with gaps.
    pub seq: i64,
    /// DID of the repository (the author).
    pub repo: String,
    /// Operations in commit order.
    pub ops: Vec<RepoOp>,
    /// Record blocks referenced by `ops`.
    pub blocks: BlockMap,
}

impl Commit {
    /// Builds the `at://` URI of a record in this repository.
    #[must_use]
    pub fn record_uri(&self, path: &str) -> String {
        format!("at://{}/{path}", self.repo)
    }
}

/// An event pulled from the stream.
#[derive(Debug, Clone)]
pub enum RepoEvent {
    /// Repository commit carrying operations.
    Commit(Commit),
    /// Any other event kind (`#identity`, `#account`, `#info`, ...).
    /// Ignored by the pipeline.
    Other {
        /// Event type without the leading `#`.
        kind: String,
        /// Sequence number, when the event kind carries one.
        seq: Option<i64>,
    },
}

impl RepoEvent {
    /// Sequence number of the event, if any.
    #[must_use]
    pub fn seq(&self) -> Option<i64> {
        match self {
            Self::Commit(commit) => Some(commit.seq),
            Self::Other { seq, .. } => *seq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firehose::testing::cid_for;

    #[test]
    fn collection_is_first_path_segment() {
        let op = RepoOp {
            action: OpAction::Delete,
            path: "app.bsky.feed.post/3k2abc".to_string(),
            cid: None,
        };
        assert_eq!(op.collection(), "app.bsky.feed.post");
    }

    #[test]
    fn record_uri_joins_repo_and_path() {
        let commit = Commit {
            seq: 1,
            repo: "did:plc:alice".to_string(),
            ops: Vec::new(),
            blocks: BlockMap::new(),
        };
        assert_eq!(
            commit.record_uri("app.bsky.feed.post/3k2abc"),
            "at://did:plc:alice/app.bsky.feed.post/3k2abc"
        );
    }

    #[test]
    fn unknown_action_does_not_parse() {
        assert_eq!(OpAction::parse("create"), Some(OpAction::Create));
        assert_eq!(OpAction::parse("upsert"), None);
    }

    #[test]
    fn block_lookup_by_cid() {
        let blocks: BlockMap = [(cid_for(1), b"abc".to_vec())].into_iter().collect();
        assert_eq!(blocks.get(&cid_for(1)), Some(b"abc".as_slice()));
        assert!(blocks.get(&cid_for(9)).is_none());
        assert_eq!(blocks.len(), 1);
    }
}
