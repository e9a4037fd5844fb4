//! Input validation error types.
//!
//! Raised when a caller hands us something we can reject without touching a
//! device or a store: malformed MAC or IP addresses, version strings that do
//! not parse, vendor names we have no updater for.

use crate::common::{Classify, ErrorCategory};

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Value is required but missing
    #[error("Required field '{0}' is missing")]
    Required(String),

    /// Invalid format
    #[error("Invalid format for field '{field}': '{value}'")]
    InvalidFormat {
        /// Field name
        field: String,
        /// The offending input
        value: String,
    },

    /// Value out of range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Field name
        field: String,
        /// The invalid value
        value: String,
        /// Minimum allowed value
        min: String,
        /// Maximum allowed value
        max: String,
    },

    /// Value is well formed but not supported by this deployment
    #[error("Unsupported {field}: {value}")]
    Unsupported {
        /// Field name
        field: String,
        /// The unsupported value
        value: String,
    },
}

impl ValidationError {
    /// Create a required field error.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required(field.into())
    }

    /// Create an invalid format error.
    pub fn invalid_format(field: impl Into<String>, value: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create an out of range error.
    pub fn out_of_range(
        field: impl Into<String>,
        value: impl ToString,
        min: impl ToString,
        max: impl ToString,
    ) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// Create an unsupported value error.
    pub fn unsupported(field: impl Into<String>, value: impl Into<String>) -> Self {
        ValidationError::Unsupported {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Name of the field that failed validation.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required(field) => field,
            ValidationError::InvalidFormat { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::Unsupported { field, .. } => field,
        }
    }
}

impl Classify for ValidationError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Input
    }
}
