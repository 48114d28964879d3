//! Category predicates.
//!
//! Each category is an independent `(Category, predicate)` pair; a post is
//! written to every category whose predicate holds. Predicates are total
//! and consult only the post and the list snapshot passed in.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::records::{embedded_images, link_card};
use crate::domain::{Category, ListSnapshot, ListTopic, PostCreate};

const NEWSPAPER: char = '📰';
const CHART_GLYPHS: [char; 3] = ['📈', '📉', '📊'];
const INLINE_LINK: &str = "https://";

#[allow(clippy::expect_used)]
static BREAKING_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^breaking:?\s").expect("breaking prefix regex should compile"));

#[allow(clippy::expect_used)]
static BREAKING_HASHTAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)#breaking(?:\s|$)").expect("breaking hashtag regex should compile")
});

type Predicate = fn(&PostCreate, &ListSnapshot) -> bool;

/// Category predicates in evaluation order.
pub const RULES: [(Category, Predicate); 3] = [
    (Category::Headline, is_headline),
    (Category::Chart, is_chart),
    (Category::Journalist, is_journalist_post),
];

/// Every category `post` belongs to, in [`RULES`] order.
#[must_use]
pub fn classify(post: &PostCreate, lists: &ListSnapshot) -> Vec<Category> {
    RULES
        .iter()
        .filter(|(_, matches)| matches(post, lists))
        .map(|(category, _)| *category)
        .collect()
}

/// Whether the post links out, either through a link card or an inline URL.
#[must_use]
pub fn has_external_link(post: &PostCreate) -> bool {
    link_card(&post.record).is_some() || post.record.text.contains(INLINE_LINK)
}

/// News headline: links out and is vouched for by the news allow list, a
/// newspaper glyph, or a "breaking" marker. The news deny list wins.
#[must_use]
pub fn is_headline(post: &PostCreate, lists: &ListSnapshot) -> bool {
    if lists.is_denied(ListTopic::News, &post.author) {
        return false;
    }
    let text = &post.record.text;
    has_external_link(post)
        && (lists.is_allowed(ListTopic::News, &post.author)
            || text.contains(NEWSPAPER)
            || BREAKING_PREFIX.is_match(text)
            || BREAKING_HASHTAG.is_match(text))
}

/// Chart post: a chart glyph plus visual media (a link card with a
/// thumbnail, or at least one image). The data deny list wins.
#[must_use]
pub fn is_chart(post: &PostCreate, lists: &ListSnapshot) -> bool {
    if lists.is_denied(ListTopic::Data, &post.author) {
        return false;
    }
    let has_glyph = post.record.text.contains(CHART_GLYPHS);
    let has_visual = match link_card(&post.record) {
        Some(card) => card.thumb.is_some(),
        None => !embedded_images(&post.record).is_empty(),
    };
    has_glyph && has_visual
}

/// Any post by a rostered journalist.
#[must_use]
pub fn is_journalist_post(post: &PostCreate, lists: &ListSnapshot) -> bool {
    lists.is_journalist(&post.author)
}
