//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{CursorStore, IngestWriter, RetentionStore};
use crate::config::IngestConfig;
use crate::domain::{Category, FeedRow};
use crate::error::IngestError;

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool from `config` and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Persistence`] if the database is unreachable
    /// or a migration fails.
    pub async fn connect(config: &IngestConfig) -> Result<Self, IngestError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!(
            max_connections = config.database_max_connections,
            "database ready"
        );
        Ok(Self::new(pool))
    }
}

impl IngestWriter for PostgresPersistence {
    async fn upsert(&self, category: Category, rows: &[FeedRow]) -> Result<u64, IngestError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let journalist = category == Category::Journalist;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {} (uri, cid, author, reply_parent, reply_root, indexed_at",
            category.table_name()
        ));
        if journalist {
            query.push(", has_external");
        }
        query.push(") ");
        query.push_values(rows, |mut values, row| {
            values
                .push_bind(&row.uri)
                .push_bind(&row.cid)
                .push_bind(&row.author)
                .push_bind(&row.reply_parent)
                .push_bind(&row.reply_root)
                .push_bind(row.indexed_at);
            if journalist {
                values.push_bind(row.has_external);
            }
        });
        query.push(" ON CONFLICT (uri) DO NOTHING");

        let result = query
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| IngestError::Persistence(format!("upsert {category}: {e}")))?;
        Ok(result.rows_affected())
    }

    async fn remove(&self, uris: &[String]) -> Result<u64, IngestError> {
        if uris.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for category in Category::ALL {
            let sql = format!("DELETE FROM {} WHERE uri = ANY($1)", category.table_name());
            let result = sqlx::query(&sql)
                .bind(uris)
                .execute(&mut *tx)
                .await
                .map_err(|e| IngestError::Persistence(format!("delete from {category}: {e}")))?;
            removed += result.rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }
}

impl CursorStore for PostgresPersistence {
    async fn load_cursor(&self, service: &str) -> Result<Option<i64>, IngestError> {
        let cursor =
            sqlx::query_scalar::<_, i64>("SELECT cursor FROM sub_state WHERE service = $1")
                .bind(service)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| IngestError::Persistence(e.to_string()))?;
        Ok(cursor)
    }

    async fn store_cursor(&self, service: &str, seq: i64) -> Result<(), IngestError> {
        sqlx::query(
            "INSERT INTO sub_state (service, cursor) VALUES ($1, $2) \
             ON CONFLICT (service) DO UPDATE SET cursor = EXCLUDED.cursor",
        )
        .bind(service)
        .bind(seq)
        .execute(&self.pool)
        .await
        .map_err(|e| IngestError::Persistence(e.to_string()))?;
        Ok(())
    }
}

impl RetentionStore for PostgresPersistence {
    async fn purge_journalist_before(&self, cutoff: DateTime<Utc>) -> Result<u64, IngestError> {
        let result = sqlx::query("DELETE FROM journalist WHERE indexed_at <= $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| IngestError::Persistence(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
