use powershelf_db::DbError;
use powershelf_errors::{Classify, ErrorCategory, ValidationError};
use powershelf_types::MacAddr;

/// Device registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The hardware address or the IP is already taken
    #[error("PMC already registered: {0}")]
    AlreadyRegistered(String),

    /// No registration for this hardware address
    #[error("PMC ({0}) is not registered")]
    NotFound(MacAddr),

    /// The registration itself is malformed
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Durable store failure
    #[error(transparent)]
    Db(#[from] DbError),

    /// A stored row could not be decoded
    #[error("corrupt registry row: {0}")]
    Decode(String),
}

impl RegistryError {
    /// Create a duplicate registration error.
    pub fn already_registered(what: impl Into<String>) -> Self {
        RegistryError::AlreadyRegistered(what.into())
    }
}

impl From<tokio_postgres::Error> for RegistryError {
    fn from(err: tokio_postgres::Error) -> Self {
        if powershelf_db::is_unique_violation(&err) {
            let detail = err
                .as_db_error()
                .and_then(|db| db.detail())
                .unwrap_or("unique constraint violated")
                .to_string();
            return RegistryError::AlreadyRegistered(detail);
        }
        RegistryError::Db(DbError::Query(err))
    }
}

impl Classify for RegistryError {
    fn category(&self) -> ErrorCategory {
        match self {
            RegistryError::AlreadyRegistered(_) => ErrorCategory::Conflict,
            RegistryError::NotFound(_) => ErrorCategory::NotFound,
            RegistryError::Invalid(e) => e.category(),
            RegistryError::Db(e) => e.category(),
            RegistryError::Decode(_) => ErrorCategory::Store,
        }
    }
}
