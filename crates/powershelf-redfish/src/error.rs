use powershelf_errors::{Classify, ErrorCategory};

/// Redfish errors.
#[derive(Debug, thiserror::Error)]
pub enum RedfishError {
    /// Transport failure: connect, TLS, timeout, body read
    #[error("redfish request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The PMC answered with an error status
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        /// Request method
        method: String,
        /// Request URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// An expected resource is missing from the service
    #[error("could not find {0}")]
    MissingResource(String),

    /// A response did not match the schema
    #[error("unexpected redfish payload from {url}: {reason}")]
    Decode {
        /// Request URL
        url: String,
        /// Parse failure
        reason: String,
    },

    /// The client could not be constructed
    #[error("redfish client setup failed: {0}")]
    Setup(String),
}

impl Classify for RedfishError {
    fn category(&self) -> ErrorCategory {
        match self {
            RedfishError::Setup(_) => ErrorCategory::Config,
            _ => ErrorCategory::Device,
        }
    }
}
