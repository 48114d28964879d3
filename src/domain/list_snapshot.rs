//! Immutable snapshot of the moderation lists.

use std::collections::HashSet;

use serde::Serialize;

/// Topic a deny or allow list applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListTopic {
    /// News lists, consulted for headlines.
    News,
    /// Data lists, consulted for charts.
    Data,
}

/// Member sets of every list the classifier consults.
///
/// Snapshots are never mutated after construction; a refresh builds a new
/// one and swaps it in whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSnapshot {
    /// Authors excluded from headlines.
    pub deny_news: HashSet<String>,
    /// Authors excluded from charts.
    pub deny_data: HashSet<String>,
    /// Authors whose linked posts qualify as headlines.
    pub allow_news: HashSet<String>,
    /// Data-journalism allow list.
    pub allow_data: HashSet<String>,
    /// Journalist roster.
    pub journalists: HashSet<String>,
}

/// Member counts of a snapshot, for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ListSizes {
    /// News deny list size.
    pub deny_news: usize,
    /// Data deny list size.
    pub deny_data: usize,
    /// News allow list size.
    pub allow_news: usize,
    /// Data allow list size.
    pub allow_data: usize,
    /// Journalist roster size.
    pub journalists: usize,
}

impl ListSnapshot {
    /// Returns `true` if `author` is on the deny list for `topic`.
    #[must_use]
    pub fn is_denied(&self, topic: ListTopic, author: &str) -> bool {
        match topic {
            ListTopic::News => self.deny_news.contains(author),
            ListTopic::Data => self.deny_data.contains(author),
        }
    }

    /// Returns `true` if `author` is on the allow list for `topic`.
    #[must_use]
    pub fn is_allowed(&self, topic: ListTopic, author: &str) -> bool {
        match topic {
            ListTopic::News => self.allow_news.contains(author),
            ListTopic::Data => self.allow_data.contains(author),
        }
    }

    /// Returns `true` if `author` is on the journalist roster.
    #[must_use]
    pub fn is_journalist(&self, author: &str) -> bool {
        self.journalists.contains(author)
    }

    /// Member counts per list.
    #[must_use]
    pub fn sizes(&self) -> ListSizes {
        ListSizes {
            deny_news: self.deny_news.len(),
            deny_data: self.deny_data.len(),
            allow_news: self.allow_news.len(),
            allow_data: self.allow_data.len(),
            journalists: self.journalists.len(),
        }
    }
}
