//! Persistence for object records (SQLite via sqlx).
//!
//! The lifecycle coordinator is the only writer: it writes a record after an
//! upload is confirmed and removes it at the end of every delete. Stores that
//! overwrite objects in place upsert, so a re-save refreshes the existing row.

use crate::models::{NewObjectRecord, ObjectRecord, Visibility};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record `{0}` not found")]
    NotFound(Uuid),
    #[error("a record for key `{0}` already exists")]
    DuplicateKey(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RecordResult<T> = Result<T, RecordError>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, new: &NewObjectRecord) -> RecordResult<ObjectRecord>;

    /// Insert, or refresh the record already holding `new.key`. The existing
    /// row keeps its id.
    async fn upsert(&self, new: &NewObjectRecord) -> RecordResult<ObjectRecord>;

    async fn find(&self, id: Uuid) -> RecordResult<Option<ObjectRecord>>;

    /// Newest first, optionally filtered by visibility.
    async fn list(&self, visibility: Option<Visibility>) -> RecordResult<Vec<ObjectRecord>>;

    /// Remove a record. Removing a missing id is `NotFound`.
    async fn remove(&self, id: Uuid) -> RecordResult<()>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> RecordResult<()>;
}

#[derive(Clone)]
pub struct SqliteRecordStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl SqliteRecordStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create(&self, new: &NewObjectRecord) -> RecordResult<ObjectRecord> {
        let inserted = sqlx::query_as::<_, ObjectRecord>(
            r#"
            INSERT INTO objects (
                id, name, key, visibility, kind, category, content_type, size_bytes, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, name, key, visibility, kind, category, content_type, size_bytes, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.key)
        .bind(new.visibility)
        .bind(new.kind)
        .bind(new.category)
        .bind(&new.content_type)
        .bind(new.size_bytes)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await;

        match inserted {
            Ok(record) => {
                debug!(id = %record.id, key = %record.key, "created object record");
                Ok(record)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(RecordError::DuplicateKey(new.key.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn upsert(&self, new: &NewObjectRecord) -> RecordResult<ObjectRecord> {
        let record = sqlx::query_as::<_, ObjectRecord>(
            r#"
            INSERT INTO objects (
                id, name, key, visibility, kind, category, content_type, size_bytes, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                name = excluded.name,
                kind = excluded.kind,
                category = excluded.category,
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                created_at = excluded.created_at
            RETURNING id, name, key, visibility, kind, category, content_type, size_bytes, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.key)
        .bind(new.visibility)
        .bind(new.kind)
        .bind(new.category)
        .bind(&new.content_type)
        .bind(new.size_bytes)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;
        debug!(id = %record.id, key = %record.key, "upserted object record");
        Ok(record)
    }

    async fn find(&self, id: Uuid) -> RecordResult<Option<ObjectRecord>> {
        let record = sqlx::query_as::<_, ObjectRecord>(
            r#"
            SELECT id, name, key, visibility, kind, category, content_type, size_bytes, created_at
            FROM objects
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    async fn list(&self, visibility: Option<Visibility>) -> RecordResult<Vec<ObjectRecord>> {
        let records = match visibility {
            Some(visibility) => {
                sqlx::query_as::<_, ObjectRecord>(
                    r#"
                    SELECT id, name, key, visibility, kind, category, content_type, size_bytes, created_at
                    FROM objects
                    WHERE visibility = ?
                    ORDER BY created_at DESC, key ASC
                    "#,
                )
                .bind(visibility)
                .fetch_all(&*self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, ObjectRecord>(
                    r#"
                    SELECT id, name, key, visibility, kind, category, content_type, size_bytes, created_at
                    FROM objects
                    ORDER BY created_at DESC, key ASC
                    "#,
                )
                .fetch_all(&*self.db)
                .await?
            }
        };
        Ok(records)
    }

    async fn remove(&self, id: Uuid) -> RecordResult<()> {
        let result = sqlx::query("DELETE FROM objects WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RecordError::NotFound(id));
        }
        debug!(%id, "removed object record");
        Ok(())
    }

    async fn ping(&self) -> RecordResult<()> {
        let value = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        if value != 1 {
            return Err(RecordError::Sqlx(sqlx::Error::Protocol(format!(
                "unexpected result: {value}"
            ))));
        }
        Ok(())
    }
}

/// Schema applied by `--migrate`.
pub const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Execute each `;`-separated statement of `sql` in order.
pub async fn apply_schema(db: &SqlitePool, sql: &str) -> Result<usize, sqlx::Error> {
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    for stmt in statements.iter().copied() {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }
    Ok(statements.len())
}
