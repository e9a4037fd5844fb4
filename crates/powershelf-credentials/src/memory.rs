use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use powershelf_types::{Credential, MacAddr};
use tracing::{debug, info};

use crate::{CredentialError, CredentialStore, Result};

/// Credential store backed by a process-local map.
///
/// Reads share the lock; `put`, `patch` and `delete` take it exclusively.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    entries: RwLock<HashMap<MacAddr, Credential>>,
}

impl InMemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn start(&self) -> Result<()> {
        info!("Starting in-memory credential store");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        info!("Stopping in-memory credential store");
        Ok(())
    }

    async fn get(&self, mac: MacAddr) -> Result<Credential> {
        self.entries
            .read()
            .get(&mac)
            .filter(|c| c.is_valid())
            .cloned()
            .ok_or(CredentialError::NotFound(mac))
    }

    async fn put(&self, mac: MacAddr, credential: &Credential) -> Result<()> {
        debug!(pmc = %mac, "storing credential");
        self.entries.write().insert(mac, credential.clone());
        Ok(())
    }

    async fn patch(&self, mac: MacAddr, credential: &Credential) -> Result<()> {
        let mut entries = self.entries.write();
        let existing = entries
            .get_mut(&mac)
            .ok_or(CredentialError::NotFound(mac))?;
        existing.patch(credential);
        Ok(())
    }

    async fn delete(&self, mac: MacAddr) -> Result<()> {
        self.entries.write().remove(&mac);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<MacAddr>> {
        let mut keys: Vec<MacAddr> = self.entries.read().keys().copied().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powershelf_errors::Classify;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn mac(last: u8) -> MacAddr {
        MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, last])
    }

    #[tokio::test]
    async fn get_after_put_returns_equal_credential() -> TestResult {
        let store = InMemoryCredentialStore::new();
        let cred = Credential::new("root", "0penBmc");
        store.put(mac(1), &cred).await?;
        assert_eq!(store.get(mac(1)).await?, cred);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_credential_reads_as_not_found() -> TestResult {
        let store = InMemoryCredentialStore::new();
        store.put(mac(1), &Credential::new("", "pw")).await?;
        let err = store.get(mac(1)).await.err().ok_or("expected NotFound")?;
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn patch_on_absent_key_does_not_insert() -> TestResult {
        let store = InMemoryCredentialStore::new();
        let err = store
            .patch(mac(1), &Credential::new("root", "pw"))
            .await
            .err()
            .ok_or("expected NotFound")?;
        assert!(err.is_not_found());
        assert!(store.keys().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn patch_merges_into_existing() -> TestResult {
        let store = InMemoryCredentialStore::new();
        store.put(mac(1), &Credential::new("root", "old")).await?;
        store.patch(mac(1), &Credential::new("", "new")).await?;
        assert_eq!(store.get(mac(1)).await?, Credential::new("root", "new"));
        Ok(())
    }

    #[tokio::test]
    async fn delete_is_idempotent() -> TestResult {
        let store = InMemoryCredentialStore::new();
        store.delete(mac(9)).await?;
        store.put(mac(9), &Credential::new("root", "pw")).await?;
        store.delete(mac(9)).await?;
        store.delete(mac(9)).await?;
        assert!(store.get(mac(9)).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn keys_lists_every_stored_address() -> TestResult {
        let store = InMemoryCredentialStore::new();
        store.start().await?;
        for last in [3, 1, 2] {
            store.put(mac(last), &Credential::new("root", "pw")).await?;
        }
        assert_eq!(store.keys().await?, vec![mac(1), mac(2), mac(3)]);
        store.stop().await?;
        Ok(())
    }
}
