use powershelf_errors::{Classify, ErrorCategory};
use powershelf_types::MacAddr;

/// Credential store errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// No usable credential is stored for the address
    #[error("credential not found for {0}")]
    NotFound(MacAddr),

    /// Refused to store a credential with a blank user
    #[error("refusing to store invalid credential for {0}")]
    Invalid(MacAddr),

    /// Backend configuration is missing or malformed
    #[error("credential store configuration error: {0}")]
    Config(String),

    /// Transport failure talking to the secret manager
    #[error("secret manager request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Secret manager answered with an error status
    #[error("secret manager returned {status}: {body}")]
    Backend {
        /// HTTP status code
        status: u16,
        /// Response body, as returned
        body: String,
    },

    /// Secret manager response did not have the expected shape
    #[error("unexpected secret manager response: {0}")]
    Decode(String),
}

impl CredentialError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        CredentialError::Config(msg.into())
    }

    /// Create a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        CredentialError::Decode(msg.into())
    }
}

impl Classify for CredentialError {
    fn category(&self) -> ErrorCategory {
        match self {
            CredentialError::NotFound(_) => ErrorCategory::NotFound,
            CredentialError::Invalid(_) => ErrorCategory::Input,
            CredentialError::Config(_) => ErrorCategory::Config,
            CredentialError::Http(_)
            | CredentialError::Backend { .. }
            | CredentialError::Decode(_) => ErrorCategory::Store,
        }
    }
}
