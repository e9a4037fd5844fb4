//! Error classification used across all power shelf manager crates.
//!
//! Front ends never match on concrete error enums from other crates. They ask
//! for the [`ErrorCategory`] through [`Classify`] and decide what to do from
//! there: which gRPC status to return, which exit code to use, whether a
//! failure during reconciliation is worth retrying on the next cycle.

use core::fmt;

/// Error category for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    /// Malformed input: bad version strings, unknown vendors, unknown components
    Input = 0,
    /// The addressed entity does not exist (device, credential, update record)
    NotFound = 1,
    /// The request collides with existing state (duplicate registration, in-flight upgrade)
    Conflict = 2,
    /// A device protocol call failed or timed out
    Device = 3,
    /// A durable store call failed or timed out
    Store = 4,
    /// Missing or invalid configuration
    Config = 5,
    /// Anything else
    Other = 255,
}

impl ErrorCategory {
    /// Whether a retry on a later reconciliation cycle may succeed.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorCategory::Device)
    }

    /// Stable lowercase name, used in structured output.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Input => "input",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Device => "device",
            ErrorCategory::Store => "store",
            ErrorCategory::Config => "config",
            ErrorCategory::Other => "other",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a concrete error onto an [`ErrorCategory`].
pub trait Classify {
    /// The category of this error.
    fn category(&self) -> ErrorCategory;

    /// Shorthand for `self.category() == ErrorCategory::NotFound`.
    fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }
}

impl Classify for std::io::Error {
    fn category(&self) -> ErrorCategory {
        match self.kind() {
            std::io::ErrorKind::NotFound => ErrorCategory::NotFound,
            std::io::ErrorKind::InvalidInput | std::io::ErrorKind::InvalidData => {
                ErrorCategory::Input
            }
            _ => ErrorCategory::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Input.to_string(), "input");
        assert_eq!(ErrorCategory::NotFound.to_string(), "not_found");
        assert_eq!(ErrorCategory::Device.to_string(), "device");
    }

    #[test]
    fn test_only_device_errors_are_transient() {
        assert!(ErrorCategory::Device.is_transient());
        assert!(!ErrorCategory::Store.is_transient());
        assert!(!ErrorCategory::Input.is_transient());
        assert!(!ErrorCategory::NotFound.is_transient());
    }

    #[test]
    fn test_io_error_classification() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(err.is_not_found());

        let err = std::io::Error::other("boom");
        assert_eq!(err.category(), ErrorCategory::Other);
    }
}
