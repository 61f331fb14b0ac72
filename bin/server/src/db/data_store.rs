//! Postgres-backed data store for data_store nodes.

use async_trait::async_trait;
use flowdeck_executor::{DataStore, DataStoreError};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};

fn storage(e: sqlx::Error) -> DataStoreError {
    DataStoreError::StorageFailed {
        reason: e.to_string(),
    }
}

/// Postgres `DataStore` implementation over a (scope, key) → JSONB table.
pub struct SqlDataStore {
    pool: PgPool,
}

impl SqlDataStore {
    /// Creates a new store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataStore for SqlDataStore {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<JsonValue>, DataStoreError> {
        let row = sqlx::query("SELECT value FROM data_store WHERE scope = $1 AND key = $2")
            .bind(scope)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        Ok(row.map(|r| r.get::<JsonValue, _>("value")))
    }

    async fn set(&self, scope: &str, key: &str, value: JsonValue) -> Result<(), DataStoreError> {
        sqlx::query(
            r#"
            INSERT INTO data_store (scope, key, value, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (scope, key) DO UPDATE
            SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(scope)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn delete(&self, scope: &str, key: &str) -> Result<bool, DataStoreError> {
        let result = sqlx::query("DELETE FROM data_store WHERE scope = $1 AND key = $2")
            .bind(scope)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn append(
        &self,
        scope: &str,
        key: &str,
        value: JsonValue,
    ) -> Result<usize, DataStoreError> {
        let current = self.get(scope, key).await?;
        let mut items = match current {
            None => Vec::new(),
            Some(JsonValue::Array(items)) => items,
            Some(_) => {
                return Err(DataStoreError::NotAnArray {
                    key: key.to_string(),
                });
            }
        };
        items.push(value);
        let length = items.len();
        self.set(scope, key, JsonValue::Array(items)).await?;
        Ok(length)
    }
}
