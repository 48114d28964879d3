//! Decoded operations, partitioned by collection.

use super::records::{FollowRecord, LikeRecord, PostRecord, RepostRecord};

/// A validated record creation.
#[derive(Debug, Clone)]
pub struct CreateOp<T> {
    /// `at://{repo}/{path}`.
    pub uri: String,
    /// Text form of the record CID.
    pub cid: String,
    /// DID of the repository that wrote the record.
    pub author: String,
    /// The decoded record.
    pub record: T,
}

/// A record deletion. Deletes carry no record body and are never validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOp {
    /// `at://{repo}/{path}` of the removed record.
    pub uri: String,
}

/// Creates and deletes for one collection, in source order.
#[derive(Debug, Clone)]
pub struct Operations<T> {
    /// Accepted creates.
    pub creates: Vec<CreateOp<T>>,
    /// Accepted deletes.
    pub deletes: Vec<DeleteOp>,
}

impl<T> Default for Operations<T> {
    fn default() -> Self {
        Self {
            creates: Vec::new(),
            deletes: Vec::new(),
        }
    }
}

impl<T> Operations<T> {
    /// Returns `true` if neither creates nor deletes were accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.deletes.is_empty()
    }

    /// URIs of all deletes, in source order.
    #[must_use]
    pub fn delete_uris(&self) -> Vec<String> {
        self.deletes.iter().map(|d| d.uri.clone()).collect()
    }
}

/// Output of the operation extractor for a single commit.
#[derive(Debug, Clone, Default)]
pub struct OperationsByType {
    /// `app.bsky.feed.post` operations.
    pub posts: Operations<PostRecord>,
    /// `app.bsky.feed.repost` operations.
    pub reposts: Operations<RepostRecord>,
    /// `app.bsky.feed.like` operations.
    pub likes: Operations<LikeRecord>,
    /// `app.bsky.graph.follow` operations.
    pub follows: Operations<FollowRecord>,
}

impl OperationsByType {
    /// Total number of accepted operations across collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.posts.creates.len()
            + self.posts.deletes.len()
            + self.reposts.creates.len()
            + self.reposts.deletes.len()
            + self.likes.creates.len()
            + self.likes.deletes.len()
            + self.follows.creates.len()
            + self.follows.deletes.len()
    }

    /// Returns `true` if no operation was accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
            && self.reposts.is_empty()
            && self.likes.is_empty()
            && self.follows.is_empty()
    }
}

/// A post creation as seen by the classifier.
pub type PostCreate = CreateOp<PostRecord>;
