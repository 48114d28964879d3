//! In-memory persistence for dry runs and tests.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{CursorStore, IngestWriter, RetentionStore};
use crate::domain::{Category, FeedRow};
use crate::error::IngestError;

#[derive(Debug, Default)]
struct Table {
    rows: Vec<FeedRow>,
    uris: HashSet<String>,
}

impl Table {
    fn insert(&mut self, row: &FeedRow) -> bool {
        if !self.uris.insert(row.uri.clone()) {
            return false;
        }
        self.rows.push(row.clone());
        true
    }

    fn retain(&mut self, keep: impl Fn(&FeedRow) -> bool) -> u64 {
        let before = self.rows.len();
        self.rows.retain(|row| keep(row));
        self.uris = self.rows.iter().map(|row| row.uri.clone()).collect();
        (before - self.rows.len()) as u64
    }
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<Category, Table>,
    cursors: HashMap<String, i64>,
}

/// Process-local store with the same semantics as the Postgres tables.
/// Rows are kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    state: RwLock<State>,
}

impl MemoryPersistence {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of `category`, in insertion order.
    pub async fn rows(&self, category: Category) -> Vec<FeedRow> {
        self.state
            .read()
            .await
            .tables
            .get(&category)
            .map(|table| table.rows.clone())
            .unwrap_or_default()
    }
}

impl IngestWriter for MemoryPersistence {
    async fn upsert(&self, category: Category, rows: &[FeedRow]) -> Result<u64, IngestError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut state = self.state.write().await;
        let table = state.tables.entry(category).or_default();
        Ok(rows.iter().filter(|row| table.insert(row)).count() as u64)
    }

    async fn remove(&self, uris: &[String]) -> Result<u64, IngestError> {
        if uris.is_empty() {
            return Ok(0);
        }
        let doomed: HashSet<&str> = uris.iter().map(String::as_str).collect();
        let mut state = self.state.write().await;
        Ok(state
            .tables
            .values_mut()
            .map(|table| table.retain(|row| !doomed.contains(row.uri.as_str())))
            .sum())
    }
}

impl CursorStore for MemoryPersistence {
    async fn load_cursor(&self, service: &str) -> Result<Option<i64>, IngestError> {
        Ok(self.state.read().await.cursors.get(service).copied())
    }

    async fn store_cursor(&self, service: &str, seq: i64) -> Result<(), IngestError> {
        self.state
            .write()
            .await
            .cursors
            .insert(service.to_string(), seq);
        Ok(())
    }
}

impl RetentionStore for MemoryPersistence {
    async fn purge_journalist_before(&self, cutoff: DateTime<Utc>) -> Result<u64, IngestError> {
        let mut state = self.state.write().await;
        Ok(state
            .tables
            .get_mut(&Category::Journalist)
            .map_or(0, |table| table.retain(|row| row.indexed_at > cutoff)))
    }
}
