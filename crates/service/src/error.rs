//! Service error types

use std::path::PathBuf;

use powershelf_credentials::CredentialError;
use powershelf_db::DbError;
use powershelf_errors::{Classify, ErrorCategory};
use powershelf_firmware::FirmwareError;

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        /// File that was opened
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON or YAML for this schema
    #[error("failed to parse config file {}: {reason}", .path.display())]
    Parse {
        /// File that was parsed
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// An environment override could not be parsed
    #[error("invalid value {value:?} for {var}")]
    Env {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
    },

    /// A setting is out of range or missing
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The database section is invalid
    #[error(transparent)]
    Db(#[from] DbError),

    /// The credential backend section is invalid
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl ConfigError {
    /// Create an [`ConfigError::Invalid`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::Invalid(msg.into())
    }
}

impl Classify for ConfigError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Config
    }
}

/// Errors surfaced by the service facade and the daemon.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Startup configuration problem
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Firmware, registry, credential or device failure
    #[error(transparent)]
    Firmware(#[from] FirmwareError),

    /// Credential backend could not be built
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Database pool or migration failure
    #[error(transparent)]
    Db(#[from] DbError),

    /// The gRPC listener failed
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Binding the listen socket failed
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: std::net::SocketAddr,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
}

impl Classify for ServiceError {
    fn category(&self) -> ErrorCategory {
        match self {
            ServiceError::Config(e) => e.category(),
            ServiceError::Firmware(e) => e.category(),
            ServiceError::Credential(e) => e.category(),
            ServiceError::Db(e) => e.category(),
            ServiceError::Transport(_) | ServiceError::Bind { .. } => ErrorCategory::Other,
        }
    }
}
