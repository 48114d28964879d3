//! Feed categories and their storage tables.

use std::fmt;

use serde::Serialize;

/// A topical classification. Each category is stored in its own table and
/// a post may belong to several at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Linked news posts.
    Headline,
    /// Posts sharing a chart image or link card.
    Chart,
    /// Every post by a rostered journalist.
    Journalist,
}

impl Category {
    /// All categories in evaluation and write order.
    pub const ALL: [Self; 3] = [Self::Headline, Self::Chart, Self::Journalist];

    /// Table holding this category's rows.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Headline => "headline",
            Self::Chart => "chart",
            Self::Journalist => "journalist",
        }
    }

    /// Whether rows in this category expire after the retention window.
    #[must_use]
    pub const fn has_retention(self) -> bool {
        matches!(self, Self::Journalist)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}
