//! `PostgreSQL` bucket store.
//!
//! # Overview
//!
//! Persistent [`BucketStore`] backed by a single `projection_buckets`
//! table with JSONB content. The conditional upsert maps onto two
//! statements:
//! - create: `INSERT ... ON CONFLICT DO NOTHING`; zero rows back means
//!   another writer created the bucket first
//! - replace: `UPDATE ... WHERE version = $n`; zero rows back means the
//!   version moved underneath us
//!
//! Both outcomes surface as `ProjectionError::Conflict`, which the engine
//! resolves by re-reading and retrying the merge. Row-level locking inside
//! Postgres serializes the statements themselves, so merges on one bucket
//! tuple are linearizable without any engine-side locking.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE projection_buckets (
//!     projection_name TEXT NOT NULL,
//!     period TEXT NOT NULL,
//!     key TEXT,
//!     start_date TIMESTAMPTZ NOT NULL,
//!     content JSONB NOT NULL,
//!     source_id TEXT,
//!     version BIGINT NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL
//! );
//! ```
//!
//! The identity tuple is enforced by a unique index over
//! `(projection_name, period, COALESCE(key, ''), start_date)` because
//! `key` is nullable, so the raw tuple cannot be a primary key.
//!
//! # Example
//!
//! ```ignore
//! let store = PostgresBucketStore::new_with_database_url(
//!     "postgres://localhost/projections",
//! ).await?;
//! store.migrate().await?;
//!
//! let engine = ProjectionEngine::new(registry, Arc::new(store));
//! ```

use chrono::{DateTime, Utc};
use rollup_core::error::{ProjectionError, Result};
use rollup_core::store::{BucketFilter, BucketStore, BucketWrite, KeyFilter};
use rollup_core::{Bucket, BucketKey, Period};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::future::Future;
use std::pin::Pin;

const BUCKET_COLUMNS: &str =
    "projection_name, period, key, start_date, content, source_id, version, updated_at";

/// PostgreSQL-backed bucket store.
///
/// Share an existing pool with [`PostgresBucketStore::new`], or point the
/// store at its own database with
/// [`PostgresBucketStore::new_with_database_url`] when projections live
/// apart from the rest of the system's storage.
#[derive(Clone)]
pub struct PostgresBucketStore {
    pool: PgPool,
}

impl PostgresBucketStore {
    /// Create a store using an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a store with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Storage`] if the connection fails.
    pub async fn new_with_database_url(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10) // Reasonable default for bucket reads and writes
            .connect(database_url)
            .await
            .map_err(|e| ProjectionError::Storage(format!("Failed to connect: {e}")))?;

        Ok(Self::new(pool))
    }

    /// Run the bucket-table migrations.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Storage`] if migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ProjectionError::Storage(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    ///
    /// Useful for custom queries or transactions.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl BucketStore for PostgresBucketStore {
    fn find(
        &self,
        key: &BucketKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bucket>>> + Send + '_>> {
        let key = key.clone();
        Box::pin(async move {
            let sql = format!(
                "SELECT {BUCKET_COLUMNS} FROM projection_buckets
                 WHERE projection_name = $1 AND period = $2
                   AND key IS NOT DISTINCT FROM $3 AND start_date = $4"
            );
            let row: Option<BucketRow> = sqlx::query_as(&sql)
                .bind(&key.projection_name)
                .bind(key.period.to_string())
                .bind(&key.key)
                .bind(key.start_date)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ProjectionError::Storage(format!("Failed to find bucket: {e}")))?;

            row.map(Bucket::try_from).transpose()
        })
    }

    fn upsert(
        &self,
        write: BucketWrite,
    ) -> Pin<Box<dyn Future<Output = Result<Bucket>> + Send + '_>> {
        Box::pin(async move {
            let row: Option<BucketRow> = match write.expected_version {
                None => {
                    let sql = format!(
                        "INSERT INTO projection_buckets ({BUCKET_COLUMNS})
                         VALUES ($1, $2, $3, $4, $5, $6, 1, now())
                         ON CONFLICT DO NOTHING
                         RETURNING {BUCKET_COLUMNS}"
                    );
                    sqlx::query_as(&sql)
                        .bind(&write.key.projection_name)
                        .bind(write.key.period.to_string())
                        .bind(&write.key.key)
                        .bind(write.key.start_date)
                        .bind(&write.content)
                        .bind(&write.source_id)
                        .fetch_optional(&self.pool)
                        .await
                }
                Some(expected) => {
                    // Versions count writes from 1; wrapping at i64 would
                    // take longer than the table will exist.
                    #[allow(clippy::cast_possible_wrap)]
                    let expected = expected as i64;

                    let sql = format!(
                        "UPDATE projection_buckets
                         SET content = $5, version = version + 1, updated_at = now()
                         WHERE projection_name = $1 AND period = $2
                           AND key IS NOT DISTINCT FROM $3 AND start_date = $4
                           AND version = $6
                         RETURNING {BUCKET_COLUMNS}"
                    );
                    sqlx::query_as(&sql)
                        .bind(&write.key.projection_name)
                        .bind(write.key.period.to_string())
                        .bind(&write.key.key)
                        .bind(write.key.start_date)
                        .bind(&write.content)
                        .bind(expected)
                        .fetch_optional(&self.pool)
                        .await
                }
            }
            .map_err(|e| ProjectionError::Storage(format!("Failed to upsert bucket: {e}")))?;

            // Zero rows back: the conditional write lost its race.
            row.map_or_else(
                || {
                    Err(ProjectionError::Conflict {
                        name: write.key.projection_name.clone(),
                        period: write.key.period.to_string(),
                        start_date: write.key.start_date,
                    })
                },
                Bucket::try_from,
            )
        })
    }

    fn query(
        &self,
        filter: &BucketFilter,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Bucket>>> + Send + '_>> {
        let filter = filter.clone();
        Box::pin(async move {
            let mut clauses = Vec::new();
            let mut next = 0;
            let mut placeholder = || {
                next += 1;
                next
            };

            if filter.projection_name.is_some() {
                clauses.push(format!("projection_name = ${}", placeholder()));
            }
            if filter.period.is_some() {
                clauses.push(format!("period = ${}", placeholder()));
            }
            match &filter.keys {
                KeyFilter::Any => {}
                KeyFilter::Unkeyed => clauses.push("key IS NULL".to_string()),
                KeyFilter::In(_) => clauses.push(format!("key = ANY(${})", placeholder())),
            }
            if filter.range.is_some() {
                clauses.push(format!("start_date >= ${}", placeholder()));
                clauses.push(format!("start_date < ${}", placeholder()));
            }

            let mut sql = format!("SELECT {BUCKET_COLUMNS} FROM projection_buckets");
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY start_date ASC, key ASC NULLS FIRST");

            let mut query = sqlx::query_as::<_, BucketRow>(&sql);
            if let Some(name) = &filter.projection_name {
                query = query.bind(name);
            }
            if let Some(period) = &filter.period {
                query = query.bind(period.to_string());
            }
            if let KeyFilter::In(keys) = &filter.keys {
                query = query.bind(keys);
            }
            if let Some((start, end)) = &filter.range {
                query = query.bind(start).bind(end);
            }

            let rows = query
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ProjectionError::Storage(format!("Failed to query buckets: {e}")))?;

            rows.into_iter().map(Bucket::try_from).collect()
        })
    }
}

/// Raw row shape; `period` and `version` need conversion before they
/// become a [`Bucket`].
#[derive(sqlx::FromRow)]
struct BucketRow {
    projection_name: String,
    period: String,
    key: Option<String>,
    start_date: DateTime<Utc>,
    content: serde_json::Value,
    source_id: Option<String>,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BucketRow> for Bucket {
    type Error = ProjectionError;

    fn try_from(row: BucketRow) -> Result<Self> {
        // Rows are only ever written through this store, so a period that
        // no longer parses means the table was tampered with.
        let period = Period::parse(&row.period).map_err(|e| {
            ProjectionError::Storage(format!("Corrupt period in stored bucket: {e}"))
        })?;

        #[allow(clippy::cast_sign_loss)] // Versions start at 1 and only grow
        let version = row.version as u64;

        Ok(Self {
            projection_name: row.projection_name,
            period,
            key: row.key,
            start_date: row.start_date,
            content: row.content,
            source_id: row.source_id,
            version,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    // Integration tests against a live Postgres belong to the host
    // deployment; these cover the row conversion boundary.

    #[test]
    fn row_conversion_parses_period_and_version() {
        let row = BucketRow {
            projection_name: "page-views".to_string(),
            period: "5 minutes".to_string(),
            key: None,
            start_date: "2026-03-01T10:05:00Z".parse().unwrap(),
            content: json!({ "count": 2 }),
            source_id: Some("site-1".to_string()),
            version: 2,
            updated_at: "2026-03-01T10:06:00Z".parse().unwrap(),
        };

        let bucket = Bucket::try_from(row).unwrap();
        assert_eq!(bucket.period, Period::parse("5 minutes").unwrap());
        assert_eq!(bucket.version, 2);
        assert_eq!(bucket.end_date(), "2026-03-01T10:09:59Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn row_conversion_rejects_corrupt_periods() {
        let row = BucketRow {
            projection_name: "page-views".to_string(),
            period: "sometimes".to_string(),
            key: None,
            start_date: "2026-03-01T10:05:00Z".parse().unwrap(),
            content: json!(null),
            source_id: None,
            version: 1,
            updated_at: "2026-03-01T10:06:00Z".parse().unwrap(),
        };

        assert!(matches!(
            Bucket::try_from(row),
            Err(ProjectionError::Storage(_))
        ));
    }
}
