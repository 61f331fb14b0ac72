//! Postgres credential vault, encrypted at rest.
//!
//! Secret material is serialized to JSON, sealed with AES-256-GCM, and
//! stored as base64 ciphertext + nonce columns. Metadata columns stay
//! queryable in the clear.

use crate::crypto::Crypto;
use crate::db::decode_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowdeck_core::{ConnectionId, CredentialId};
use flowdeck_integration::{
    Credential, CredentialData, CredentialError, CredentialKind, CredentialVault,
};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

fn kind_from_str(s: &str) -> CredentialKind {
    match s {
        "api_key" => CredentialKind::ApiKey,
        "basic_auth" => CredentialKind::BasicAuth,
        "bearer_token" => CredentialKind::BearerToken,
        _ => CredentialKind::Oauth2,
    }
}

/// Row type for credential metadata queries.
#[derive(FromRow)]
struct CredentialRow {
    id: String,
    connection_id: String,
    name: String,
    kind: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl CredentialRow {
    fn try_into_credential(self) -> Result<Credential, sqlx::Error> {
        let id = CredentialId::from_str(&self.id)
            .map_err(|e| decode_error(&format!("invalid credential id '{}'", self.id), e))?;
        let connection_id = ConnectionId::from_str(&self.connection_id).map_err(|e| {
            decode_error(
                &format!("invalid connection id '{}'", self.connection_id),
                e,
            )
        })?;

        Ok(Credential {
            id,
            connection_id,
            name: self.name,
            kind: kind_from_str(&self.kind),
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_used_at: self.last_used_at,
        })
    }
}

/// Row type for sealed secret queries.
#[derive(FromRow)]
struct SealedRow {
    data_encrypted: String,
    data_nonce: String,
}

/// Postgres-backed `CredentialVault`.
pub struct SqlCredentialVault {
    pool: PgPool,
    crypto: Crypto,
}

impl SqlCredentialVault {
    /// Creates a vault over the given pool and master key.
    pub fn new(pool: PgPool, crypto: Crypto) -> Self {
        Self { pool, crypto }
    }

    fn seal(&self, data: &CredentialData) -> Result<(String, String), CredentialError> {
        let plaintext =
            serde_json::to_vec(data).map_err(|e| CredentialError::InvalidFormat {
                reason: e.to_string(),
            })?;
        self.crypto
            .seal(&plaintext)
            .map_err(|e| CredentialError::EncryptionFailed {
                reason: e.to_string(),
            })
    }

    fn open(&self, sealed: &SealedRow) -> Result<CredentialData, CredentialError> {
        let plaintext = self
            .crypto
            .open(&sealed.data_encrypted, &sealed.data_nonce)
            .map_err(|e| CredentialError::DecryptionFailed {
                reason: e.to_string(),
            })?;
        serde_json::from_slice(&plaintext).map_err(|e| CredentialError::InvalidFormat {
            reason: e.to_string(),
        })
    }

    fn storage(e: sqlx::Error) -> CredentialError {
        CredentialError::StorageFailed {
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl CredentialVault for SqlCredentialVault {
    async fn store(
        &self,
        credential: Credential,
        data: CredentialData,
    ) -> Result<CredentialId, CredentialError> {
        let (ciphertext, nonce) = self.seal(&data)?;

        sqlx::query(
            r#"
            INSERT INTO credentials
                (id, connection_id, name, kind, data_encrypted, data_nonce,
                 created_at, updated_at, last_used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(credential.id.to_string())
        .bind(credential.connection_id.to_string())
        .bind(&credential.name)
        .bind(credential.kind.as_str())
        .bind(ciphertext)
        .bind(nonce)
        .bind(credential.created_at)
        .bind(credential.updated_at)
        .bind(credential.last_used_at)
        .execute(&self.pool)
        .await
        .map_err(Self::storage)?;

        Ok(credential.id)
    }

    async fn get_metadata(&self, id: CredentialId) -> Result<Credential, CredentialError> {
        let row: Option<CredentialRow> = sqlx::query_as(
            r#"
            SELECT id, connection_id, name, kind, created_at, updated_at, last_used_at
            FROM credentials
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::storage)?;

        row.ok_or(CredentialError::NotFound { id })?
            .try_into_credential()
            .map_err(Self::storage)
    }

    async fn get_data(&self, id: CredentialId) -> Result<CredentialData, CredentialError> {
        let row: Option<SealedRow> = sqlx::query_as(
            "SELECT data_encrypted, data_nonce FROM credentials WHERE id = $1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::storage)?;

        let sealed = row.ok_or(CredentialError::NotFound { id })?;
        self.open(&sealed)
    }

    async fn update_data(
        &self,
        id: CredentialId,
        data: CredentialData,
    ) -> Result<(), CredentialError> {
        let (ciphertext, nonce) = self.seal(&data)?;

        let result = sqlx::query(
            r#"
            UPDATE credentials
            SET data_encrypted = $2, data_nonce = $3, kind = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(ciphertext)
        .bind(nonce)
        .bind(data.kind().as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Self::storage)?;

        if result.rows_affected() == 0 {
            return Err(CredentialError::NotFound { id });
        }
        Ok(())
    }

    async fn touch(&self, id: CredentialId) -> Result<(), CredentialError> {
        sqlx::query("UPDATE credentials SET last_used_at = $2 WHERE id = $1")
            .bind(id.to_string())
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(Self::storage)?;
        Ok(())
    }

    async fn delete(&self, id: CredentialId) -> Result<(), CredentialError> {
        let result = sqlx::query("DELETE FROM credentials WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(Self::storage)?;

        if result.rows_affected() == 0 {
            return Err(CredentialError::NotFound { id });
        }
        Ok(())
    }

    async fn list_for_connection(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Vec<Credential>, CredentialError> {
        let rows: Vec<CredentialRow> = sqlx::query_as(
            r#"
            SELECT id, connection_id, name, kind, created_at, updated_at, last_used_at
            FROM credentials
            WHERE connection_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(connection_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(Self::storage)?;

        rows.into_iter()
            .map(|r| r.try_into_credential().map_err(Self::storage))
            .collect()
    }
}
