use futures::future::BoxFuture;
use serde_json::Value;
use sqlx::sqlite::SqlitePool;

use crate::store::{KeyValueStore, StoreError};

/// `KeyValueStore` over the `kv_store` table. Values are stored as JSON text.
#[derive(Clone)]
pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn read(&self, key: &str, default: Value) -> Result<Value, StoreError> {
        let row: Option<(String,)> = sqlx::query_as(r#"SELECT value FROM kv_store WHERE key = ?1"#)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some((raw,)) => Ok(serde_json::from_str(&raw)?),
            None => Ok(default),
        }
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&value)?;
        sqlx::query(
            r#"INSERT INTO kv_store (key, value, updated_at)
                VALUES (?1, ?2, CURRENT_TIMESTAMP)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl KeyValueStore for SqliteKvStore {
    fn get<'a>(&'a self, key: &'a str, default: Value) -> BoxFuture<'a, Result<Value, StoreError>> {
        Box::pin(self.read(key, default))
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.write(key, value))
    }
}
