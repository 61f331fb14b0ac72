//! Connection repository.

use crate::db::decode_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowdeck_core::{ConnectionId, CredentialId};
use flowdeck_oauth::{Connection, ConnectionStatus, ConnectionStore, ConnectionStoreError};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for connection queries.
#[derive(FromRow)]
struct ConnectionRow {
    id: String,
    name: String,
    provider: String,
    status: String,
    error_message: Option<String>,
    credential_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl ConnectionRow {
    fn try_into_connection(self) -> Result<Connection, sqlx::Error> {
        let id = ConnectionId::from_str(&self.id)
            .map_err(|e| decode_error(&format!("invalid connection id '{}'", self.id), e))?;
        let credential_id = self
            .credential_id
            .as_deref()
            .map(CredentialId::from_str)
            .transpose()
            .map_err(|e| decode_error("invalid credential id", e))?;

        Ok(Connection {
            id,
            name: self.name,
            provider: self.provider,
            status: ConnectionStatus::from_str_value(&self.status),
            error_message: self.error_message,
            credential_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_used_at: self.last_used_at,
        })
    }
}

/// Repository for connection records.
#[derive(Clone)]
pub struct ConnectionRepository {
    pool: PgPool,
}

impl ConnectionRepository {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a connection.
    pub async fn insert(&self, connection: &Connection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO connections
                (id, name, provider, status, error_message, credential_id,
                 created_at, updated_at, last_used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(connection.id.to_string())
        .bind(&connection.name)
        .bind(&connection.provider)
        .bind(connection.status.as_str())
        .bind(&connection.error_message)
        .bind(connection.credential_id.map(|c| c.to_string()))
        .bind(connection.created_at)
        .bind(connection.updated_at)
        .bind(connection.last_used_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Updates a connection's mutable fields.
    pub async fn update(&self, connection: &Connection) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE connections
            SET name = $2, status = $3, error_message = $4, credential_id = $5,
                updated_at = $6, last_used_at = $7
            WHERE id = $1
            "#,
        )
        .bind(connection.id.to_string())
        .bind(&connection.name)
        .bind(connection.status.as_str())
        .bind(&connection.error_message)
        .bind(connection.credential_id.map(|c| c.to_string()))
        .bind(connection.updated_at)
        .bind(connection.last_used_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Finds a connection by ID.
    pub async fn find_by_id(&self, id: ConnectionId) -> Result<Option<Connection>, sqlx::Error> {
        let row: Option<ConnectionRow> = sqlx::query_as(
            r#"
            SELECT id, name, provider, status, error_message, credential_id,
                   created_at, updated_at, last_used_at
            FROM connections
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(r.try_into_connection()?)),
            None => Ok(None),
        }
    }

    /// Lists all connections, by name.
    pub async fn list(&self) -> Result<Vec<Connection>, sqlx::Error> {
        let rows: Vec<ConnectionRow> = sqlx::query_as(
            r#"
            SELECT id, name, provider, status, error_message, credential_id,
                   created_at, updated_at, last_used_at
            FROM connections
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(ConnectionRow::try_into_connection)
            .collect()
    }

    /// Deletes a connection. Returns false when it did not exist.
    pub async fn delete(&self, id: ConnectionId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM connections WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ConnectionStore for ConnectionRepository {
    async fn get(&self, id: ConnectionId) -> Result<Connection, ConnectionStoreError> {
        self.find_by_id(id)
            .await
            .map_err(|e| ConnectionStoreError::StorageFailed {
                reason: e.to_string(),
            })?
            .ok_or(ConnectionStoreError::NotFound { id })
    }
}
