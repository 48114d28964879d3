//! Record schema validation.
//!
//! Decoding into the generated lexicon types already enforces field
//! presence and types. The validator adds the collection check and the
//! length limits the lexicons declare but the types do not carry.

use atrium_api::record::KnownRecord;
use unicode_segmentation::UnicodeSegmentation;

use crate::domain::records::{
    FOLLOW_NSID, LIKE_NSID, POST_NSID, PostRecord, REPOST_NSID, embedded_images,
};
use crate::error::IngestError;

/// Maximum post text length in bytes.
pub const MAX_POST_TEXT_BYTES: usize = 3000;
/// Maximum post text length in grapheme clusters.
pub const MAX_POST_TEXT_GRAPHEMES: usize = 300;
/// Maximum number of declared languages on a post.
pub const MAX_POST_LANGS: usize = 3;
/// Maximum number of images in an image embed.
pub const MAX_EMBED_IMAGES: usize = 4;

/// Confirms a decoded record conforms to its collection's schema.
pub trait SchemaValidator: Send + Sync {
    /// Validates `record` against `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Validation`] describing the first violation.
    fn validate(&self, collection: &str, record: &KnownRecord) -> Result<(), IngestError>;
}

/// Lexicon validator for the collections this pipeline ingests.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconValidator;

impl SchemaValidator for LexiconValidator {
    fn validate(&self, collection: &str, record: &KnownRecord) -> Result<(), IngestError> {
        match record {
            KnownRecord::AppBskyFeedPost(post) if collection == POST_NSID => check_post(post),
            KnownRecord::AppBskyFeedRepost(_) if collection == REPOST_NSID => Ok(()),
            KnownRecord::AppBskyFeedLike(_) if collection == LIKE_NSID => Ok(()),
            KnownRecord::AppBskyGraphFollow(_) if collection == FOLLOW_NSID => Ok(()),
            _ => Err(IngestError::Validation(format!(
                "record $type does not match collection {collection}"
            ))),
        }
    }
}

fn check_post(post: &PostRecord) -> Result<(), IngestError> {
    let bytes = post.text.len();
    if bytes > MAX_POST_TEXT_BYTES {
        return Err(IngestError::Validation(format!(
            "post text is {bytes} bytes, limit {MAX_POST_TEXT_BYTES}"
        )));
    }
    let graphemes = post.text.graphemes(true).count();
    if graphemes > MAX_POST_TEXT_GRAPHEMES {
        return Err(IngestError::Validation(format!(
            "post text is {graphemes} graphemes, limit {MAX_POST_TEXT_GRAPHEMES}"
        )));
    }
    let langs = post.langs.as_ref().map_or(0, Vec::len);
    if langs > MAX_POST_LANGS {
        return Err(IngestError::Validation(format!(
            "post declares {langs} languages, limit {MAX_POST_LANGS}"
        )));
    }
    let images = embedded_images(post).len();
    if images > MAX_EMBED_IMAGES {
        return Err(IngestError::Validation(format!(
            "post embeds {images} images, limit {MAX_EMBED_IMAGES}"
        )));
    }
    Ok(())
}
