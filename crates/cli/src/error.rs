//! Error types for psmctl

use powershelf_errors::{Classify, ErrorCategory};
use powershelf_firmware::FirmwareError;
use powershelf_service::{ConfigError, ServiceError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CliError::Validation(msg.into())
    }
}

impl From<FirmwareError> for CliError {
    fn from(err: FirmwareError) -> Self {
        CliError::Service(err.into())
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Service(err.into())
    }
}

impl Classify for CliError {
    fn category(&self) -> ErrorCategory {
        match self {
            CliError::Validation(_) => ErrorCategory::Input,
            CliError::Service(e) => e.category(),
            CliError::Json(_) => ErrorCategory::Other,
        }
    }
}

/// Process exit code for a failure of `category`.
pub fn exit_code(category: ErrorCategory) -> u8 {
    match category {
        ErrorCategory::NotFound => 2,
        ErrorCategory::Conflict => 3,
        ErrorCategory::Input => 4,
        ErrorCategory::Device => 5,
        _ => 1,
    }
}

/// Category of the first classified error in `err`'s chain.
pub fn category_of(err: &anyhow::Error) -> ErrorCategory {
    err.chain()
        .find_map(|cause| {
            cause
                .downcast_ref::<CliError>()
                .map(Classify::category)
                .or_else(|| cause.downcast_ref::<ServiceError>().map(Classify::category))
        })
        .unwrap_or(ErrorCategory::Other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(ErrorCategory::Input), 4);
        assert_eq!(exit_code(ErrorCategory::NotFound), 2);
        assert_eq!(exit_code(ErrorCategory::Device), 5);
        assert_eq!(exit_code(ErrorCategory::Conflict), 3);
        assert_eq!(exit_code(ErrorCategory::Store), 1);
    }

    #[test]
    fn test_category_survives_context() {
        let err: anyhow::Result<()> = Err(CliError::validation("--ip is required"))
            .context("can_upgrade failed");
        let err = err.err().map(|e| category_of(&e));
        assert_eq!(err, Some(ErrorCategory::Input));

        let err = anyhow::Error::from(ServiceError::from(FirmwareError::RecordNotFound(9)));
        assert_eq!(category_of(&err), ErrorCategory::NotFound);
    }
}
