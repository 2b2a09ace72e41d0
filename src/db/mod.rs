mod records;
mod sqlite;

pub use records::GLOBAL_SCOPE;
pub use sqlite::Database;

#[cfg(test)]
pub use sqlite::init_test_db;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// A JSON document stored in the local key-value store
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Record family, one per type
    const KIND: &'static str;

    /// Unique key within a scope; appends with an existing key are ignored
    fn key(&self) -> String;

    /// Orders `get` results, newest first
    fn created_at(&self) -> DateTime<Utc>;
}

/// Typed access to client-local state, scoped by wallet address
#[async_trait]
pub trait Repository: Send + Sync {
    /// All records of a kind in `scope`, newest first
    async fn get<R: Record>(&self, scope: &str) -> Result<Vec<R>>;

    /// Look up one record by key
    async fn find<R: Record>(&self, scope: &str, key: &str) -> Result<Option<R>>;

    /// Insert unless a record with the same key exists. Returns whether it was stored.
    async fn append<R: Record>(&self, scope: &str, record: &R) -> Result<bool>;

    /// Insert or replace the record with the same key
    async fn update<R: Record>(&self, scope: &str, record: &R) -> Result<()>;
}
