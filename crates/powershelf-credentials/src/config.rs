use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CredentialError;

/// Credential backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CredentialStoreConfig {
    /// HashiCorp Vault KV v2
    Vault(VaultConfig),
    /// Process-local map, lost on restart
    InMemory,
}

impl CredentialStoreConfig {
    /// Check that the selected backend has everything it needs.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Config`] naming the first missing field.
    pub fn validate(&self) -> Result<(), CredentialError> {
        match self {
            CredentialStoreConfig::Vault(vault) => vault.validate(),
            CredentialStoreConfig::InMemory => Ok(()),
        }
    }
}

/// Vault address and token. The token should be scoped to KV operations.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Base URL, e.g. `https://vault.vault.svc:8200`
    pub address: String,
    /// Client token sent as `X-Vault-Token`
    pub token: String,
}

impl VaultConfig {
    /// Construct from explicit values.
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: token.into(),
        }
    }

    /// Read `VAULT_ADDR` and `VAULT_TOKEN`. Unset variables become empty and
    /// fail [`VaultConfig::validate`].
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("VAULT_ADDR").unwrap_or_default(),
            std::env::var("VAULT_TOKEN").unwrap_or_default(),
        )
    }

    /// # Errors
    ///
    /// Returns [`CredentialError::Config`] when address or token is blank.
    pub fn validate(&self) -> Result<(), CredentialError> {
        if self.address.trim().is_empty() {
            return Err(CredentialError::config("invalid vault address specified"));
        }
        if self.token.trim().is_empty() {
            return Err(CredentialError::config("invalid vault token specified"));
        }
        Ok(())
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("address", &self.address)
            .field("token", &"********")
            .finish()
    }
}

impl fmt::Display for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vault Address: {}; Vault Token: ********", self.address)
    }
}
