//! Credential storage for PMC management endpoints
//!
//! Credentials are keyed by PMC hardware address and owned by a store that
//! is independent of the device registry. Callers resolve a credential right
//! before each device interaction and never cache it.
//!
//! # Architecture
//!
//! - [`CredentialStore`]: the async contract every backend implements
//! - [`InMemoryCredentialStore`]: process-local map behind a reader/writer lock
//! - [`VaultCredentialStore`]: HashiCorp Vault KV v2 over HTTP
//! - [`CredentialStoreConfig`]: backend selection and validation
//!
//! A stored credential with a blank user is reported as
//! [`CredentialError::NotFound`], never returned.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

mod config;
mod error;
mod memory;
mod vault;

use std::sync::Arc;

use async_trait::async_trait;
use powershelf_types::{Credential, MacAddr};

pub use config::{CredentialStoreConfig, VaultConfig};
pub use error::CredentialError;
pub use memory::InMemoryCredentialStore;
pub use vault::VaultCredentialStore;

/// Result alias for credential store operations.
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Key-value store of PMC credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Prepare the backend. Idempotent.
    async fn start(&self) -> Result<()>;

    /// Release backend resources. Idempotent.
    async fn stop(&self) -> Result<()>;

    /// Fetch the credential for `mac`. Absent and invalid entries are both
    /// [`CredentialError::NotFound`].
    async fn get(&self, mac: MacAddr) -> Result<Credential>;

    /// Store or replace the credential for `mac`.
    async fn put(&self, mac: MacAddr, credential: &Credential) -> Result<()>;

    /// Merge the non-empty fields of `credential` into the stored entry.
    /// Fails with [`CredentialError::NotFound`] without inserting when absent.
    async fn patch(&self, mac: MacAddr, credential: &Credential) -> Result<()>;

    /// Remove the credential for `mac`. Deleting an absent key succeeds.
    async fn delete(&self, mac: MacAddr) -> Result<()>;

    /// Every address with a stored credential.
    async fn keys(&self) -> Result<Vec<MacAddr>>;
}

/// Build the backend selected by `config`.
///
/// # Errors
///
/// Returns [`CredentialError::Config`] when the configuration is invalid or
/// the HTTP client cannot be constructed.
pub fn build(config: &CredentialStoreConfig) -> Result<Arc<dyn CredentialStore>> {
    config.validate()?;
    match config {
        CredentialStoreConfig::InMemory => {
            tracing::info!("Initializing credential store with in-memory datastore");
            Ok(Arc::new(InMemoryCredentialStore::new()))
        }
        CredentialStoreConfig::Vault(vault) => {
            tracing::info!(
                address = %vault.address,
                "Initializing credential store with Vault datastore"
            );
            Ok(Arc::new(VaultCredentialStore::new(vault)?))
        }
    }
}
