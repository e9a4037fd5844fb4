use powershelf_errors::{Classify, ErrorCategory, ValidationError};
use tokio_postgres::error::SqlState;

/// Database errors.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Invalid or missing connection settings
    #[error("database configuration error: {0}")]
    Config(String),

    /// A connection setting failed field validation
    #[error("database configuration error: {0}")]
    Invalid(#[from] ValidationError),

    /// TLS setup failed (unreadable CA file, bad certificate)
    #[error("database TLS setup failed: {0}")]
    Tls(#[from] openssl::error::ErrorStack),

    /// The pool could not be constructed
    #[error("failed to build connection pool: {0}")]
    Build(#[from] deadpool_postgres::BuildError),

    /// No connection could be checked out
    #[error("failed to get database connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A statement failed
    #[error("database query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Schema migration could not be applied
    #[error("migration {id} ({name}) failed: {reason}")]
    Migration {
        /// Migration id (timestamp prefix)
        id: String,
        /// Migration name
        name: String,
        /// What went wrong
        reason: String,
    },
}

impl DbError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        DbError::Config(msg.into())
    }

    pub(crate) fn migration(
        id: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DbError::Migration {
            id: id.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl Classify for DbError {
    fn category(&self) -> ErrorCategory {
        match self {
            DbError::Config(_)
            | DbError::Invalid(_)
            | DbError::Tls(_)
            | DbError::Build(_)
            | DbError::Migration { .. } => ErrorCategory::Config,
            DbError::Pool(_) | DbError::Query(_) => ErrorCategory::Store,
        }
    }
}

/// Whether `err` is a unique constraint violation.
pub fn is_unique_violation(err: &tokio_postgres::Error) -> bool {
    err.code() == Some(&SqlState::UNIQUE_VIOLATION)
}
