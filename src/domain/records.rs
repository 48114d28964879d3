//! Record types for the ingested collections.
//!
//! Records are the generated `app.bsky.*` lexicon types from `atrium-api`.
//! [`IngestedRecord`] ties each one to its collection NSID and pulls it out
//! of a decoded [`KnownRecord`]; the free functions read the post fields the
//! classifier cares about.

use atrium_api::app::bsky::embed::{external, images};
use atrium_api::app::bsky::feed::post::RecordEmbedRefs;
use atrium_api::app::bsky::{feed, graph};
use atrium_api::record::KnownRecord;
use atrium_api::types::{Collection, Union};

pub use atrium_api::app::bsky::feed::like::Record as LikeRecord;
pub use atrium_api::app::bsky::feed::post::Record as PostRecord;
pub use atrium_api::app::bsky::feed::repost::Record as RepostRecord;
pub use atrium_api::app::bsky::graph::follow::Record as FollowRecord;

/// NSID of post records.
pub const POST_NSID: &str = feed::Post::NSID;
/// NSID of repost records.
pub const REPOST_NSID: &str = feed::Repost::NSID;
/// NSID of like records.
pub const LIKE_NSID: &str = feed::Like::NSID;
/// NSID of follow records.
pub const FOLLOW_NSID: &str = graph::Follow::NSID;

/// A record type the extractor partitions commits into.
pub trait IngestedRecord: Sized {
    /// Collection NSID of the record.
    const NSID: &'static str;

    /// Takes the typed record out of `record`, or `None` if it belongs to
    /// another collection.
    fn from_known(record: KnownRecord) -> Option<Self>;
}

impl IngestedRecord for PostRecord {
    const NSID: &'static str = POST_NSID;

    fn from_known(record: KnownRecord) -> Option<Self> {
        match record {
            KnownRecord::AppBskyFeedPost(post) => Some(*post),
            _ => None,
        }
    }
}

impl IngestedRecord for RepostRecord {
    const NSID: &'static str = REPOST_NSID;

    fn from_known(record: KnownRecord) -> Option<Self> {
        match record {
            KnownRecord::AppBskyFeedRepost(repost) => Some(*repost),
            _ => None,
        }
    }
}

impl IngestedRecord for LikeRecord {
    const NSID: &'static str = LIKE_NSID;

    fn from_known(record: KnownRecord) -> Option<Self> {
        match record {
            KnownRecord::AppBskyFeedLike(like) => Some(*like),
            _ => None,
        }
    }
}

impl IngestedRecord for FollowRecord {
    const NSID: &'static str = FOLLOW_NSID;

    fn from_known(record: KnownRecord) -> Option<Self> {
        match record {
            KnownRecord::AppBskyGraphFollow(follow) => Some(*follow),
            _ => None,
        }
    }
}

/// The link card of a post, if it embeds one.
#[must_use]
pub fn link_card(post: &PostRecord) -> Option<&external::External> {
    match &post.embed {
        Some(Union::Refs(RecordEmbedRefs::AppBskyEmbedExternalMain(main))) => Some(&main.external),
        _ => None,
    }
}

/// The images of a post; empty unless it embeds an image set.
#[must_use]
pub fn embedded_images(post: &PostRecord) -> &[images::Image] {
    match &post.embed {
        Some(Union::Refs(RecordEmbedRefs::AppBskyEmbedImagesMain(main))) => &main.images,
        _ => &[],
    }
}

/// URI of the post being replied to.
#[must_use]
pub fn reply_parent(post: &PostRecord) -> Option<&str> {
    post.reply.as_ref().map(|reply| reply.parent.uri.as_str())
}

/// URI of the thread root.
#[must_use]
pub fn reply_root(post: &PostRecord) -> Option<&str> {
    post.reply.as_ref().map(|reply| reply.root.uri.as_str())
}
