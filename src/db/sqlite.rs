use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use super::{Record, Repository};
use crate::error::Result;

/// Database manager for handling SQLite operations
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(database_url: &str) -> Result<Self> {
        let in_memory = database_url.contains(":memory:");
        let url = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite:{}", database_url)
        };

        let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

        // Every in-memory connection is its own database, so keep exactly one alive
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;

        // Initialize schema if needed
        let db = Self { pool };
        db.init_schema().await?;

        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS records (
                scope TEXT NOT NULL,
                kind TEXT NOT NULL,
                key TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (scope, kind, key)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS records_by_age ON records (scope, kind, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Repository for Database {
    async fn get<R: Record>(&self, scope: &str) -> Result<Vec<R>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT body FROM records
             WHERE scope = ? AND kind = ?
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(scope)
        .bind(R::KIND)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(body,)| serde_json::from_str(&body).map_err(Into::into))
            .collect()
    }

    async fn find<R: Record>(&self, scope: &str, key: &str) -> Result<Option<R>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT body FROM records WHERE scope = ? AND kind = ? AND key = ?",
        )
        .bind(scope)
        .bind(R::KIND)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((body,)) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    async fn append<R: Record>(&self, scope: &str, record: &R) -> Result<bool> {
        let body = serde_json::to_string(record)?;
        let now = Utc::now().timestamp_millis();

        let result = sqlx::query(
            "INSERT OR IGNORE INTO records (scope, kind, key, body, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(scope)
        .bind(R::KIND)
        .bind(record.key())
        .bind(body)
        .bind(record.created_at().timestamp_millis())
        .bind(now)
        .execute(&self.pool)
        .await?;

        let stored = result.rows_affected() > 0;
        if !stored {
            debug!("Skipped duplicate {} record {}", R::KIND, record.key());
        }
        Ok(stored)
    }

    async fn update<R: Record>(&self, scope: &str, record: &R) -> Result<()> {
        let body = serde_json::to_string(record)?;
        let now = Utc::now().timestamp_millis();

        sqlx::query(
            "INSERT INTO records (scope, kind, key, body, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (scope, kind, key) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at",
        )
        .bind(scope)
        .bind(R::KIND)
        .bind(record.key())
        .bind(body)
        .bind(record.created_at().timestamp_millis())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Initialize an in-memory database for testing
#[cfg(test)]
pub async fn init_test_db() -> Result<Database> {
    Database::new("sqlite::memory:").await
}
