//! In-memory credential vault.
//!
//! Useful for tests and single-process deployments. Secret material is
//! held in process memory only; the production vault lives in the server
//! and encrypts at rest.

use crate::credential::{Credential, CredentialData, CredentialVault};
use crate::error::CredentialError;
use async_trait::async_trait;
use chrono::Utc;
use flowdeck_core::{ConnectionId, CredentialId};
use std::collections::HashMap;
use std::sync::Mutex;

/// An in-memory `CredentialVault` implementation.
#[derive(Default)]
pub struct InMemoryVault {
    entries: Mutex<HashMap<CredentialId, (Credential, CredentialData)>>,
}

impl InMemoryVault {
    /// Creates an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialVault for InMemoryVault {
    async fn store(
        &self,
        credential: Credential,
        data: CredentialData,
    ) -> Result<CredentialId, CredentialError> {
        let id = credential.id;
        self.entries
            .lock()
            .expect("vault lock")
            .insert(id, (credential, data));
        Ok(id)
    }

    async fn get_metadata(&self, id: CredentialId) -> Result<Credential, CredentialError> {
        self.entries
            .lock()
            .expect("vault lock")
            .get(&id)
            .map(|(credential, _)| credential.clone())
            .ok_or(CredentialError::NotFound { id })
    }

    async fn get_data(&self, id: CredentialId) -> Result<CredentialData, CredentialError> {
        self.entries
            .lock()
            .expect("vault lock")
            .get(&id)
            .map(|(_, data)| data.clone())
            .ok_or(CredentialError::NotFound { id })
    }

    async fn update_data(
        &self,
        id: CredentialId,
        data: CredentialData,
    ) -> Result<(), CredentialError> {
        let mut entries = self.entries.lock().expect("vault lock");
        let entry = entries.get_mut(&id).ok_or(CredentialError::NotFound { id })?;
        entry.0.mark_updated();
        entry.1 = data;
        Ok(())
    }

    async fn touch(&self, id: CredentialId) -> Result<(), CredentialError> {
        let mut entries = self.entries.lock().expect("vault lock");
        let entry = entries.get_mut(&id).ok_or(CredentialError::NotFound { id })?;
        entry.0.last_used_at = Some(Utc::now());
        Ok(())
    }

    async fn delete(&self, id: CredentialId) -> Result<(), CredentialError> {
        self.entries
            .lock()
            .expect("vault lock")
            .remove(&id)
            .map(|_| ())
            .ok_or(CredentialError::NotFound { id })
    }

    async fn list_for_connection(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Vec<Credential>, CredentialError> {
        Ok(self
            .entries
            .lock()
            .expect("vault lock")
            .values()
            .filter(|(credential, _)| credential.connection_id == connection_id)
            .map(|(credential, _)| credential.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialKind;

    fn sample() -> (Credential, CredentialData) {
        let credential = Credential::new(ConnectionId::new(), "Test", CredentialKind::ApiKey);
        (credential, CredentialData::api_key("key_123"))
    }

    #[tokio::test]
    async fn store_and_retrieve() {
        let vault = InMemoryVault::new();
        let (credential, data) = sample();
        let id = vault.store(credential, data).await.expect("store");

        let metadata = vault.get_metadata(id).await.expect("metadata");
        assert_eq!(metadata.name, "Test");

        let data = vault.get_data(id).await.expect("data");
        assert_eq!(data, CredentialData::api_key("key_123"));
    }

    #[tokio::test]
    async fn update_rotates_data() {
        let vault = InMemoryVault::new();
        let (credential, data) = sample();
        let id = vault.store(credential, data).await.expect("store");

        vault
            .update_data(id, CredentialData::api_key("key_456"))
            .await
            .expect("update");

        let data = vault.get_data(id).await.expect("data");
        assert_eq!(data, CredentialData::api_key("key_456"));
    }

    #[tokio::test]
    async fn missing_credential_errors() {
        let vault = InMemoryVault::new();
        let result = vault.get_data(CredentialId::new()).await;
        assert!(matches!(result, Err(CredentialError::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_for_connection_filters() {
        let vault = InMemoryVault::new();
        let connection = ConnectionId::new();
        let credential = Credential::new(connection, "Mine", CredentialKind::BearerToken);
        vault
            .store(
                credential,
                CredentialData::BearerToken {
                    token: "t".to_string(),
                },
            )
            .await
            .expect("store");
        let (other, other_data) = sample();
        vault.store(other, other_data).await.expect("store");

        let listed = vault.list_for_connection(connection).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Mine");
    }

    #[tokio::test]
    async fn touch_records_usage() {
        let vault = InMemoryVault::new();
        let (credential, data) = sample();
        let id = vault.store(credential, data).await.expect("store");

        vault.touch(id).await.expect("touch");
        let metadata = vault.get_metadata(id).await.expect("metadata");
        assert!(metadata.last_used_at.is_some());
    }
}
