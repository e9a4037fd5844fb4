//! Postgres access for the power shelf manager
//!
//! # Architecture
//!
//! - [`DbConfig`]: connection parameters, validation and environment loading
//! - [`Database`]: a `deadpool-postgres` pool, plain or TLS via OpenSSL
//! - [`migrations`]: embedded `ID_NAME.up.sql` / `ID_NAME.down.sql` files
//!   applied under a table lock with hash verification
//!
//! Backends in other crates (device registry, firmware update records) borrow
//! pooled clients from a shared [`Database`].

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

mod config;
mod error;
pub mod migrations;
mod pool;

pub use config::{DbConfig, TEST_POSTGRES_ENV};
pub use error::{DbError, is_unique_violation};
pub use pool::Database;

pub use deadpool_postgres::{Object as PooledClient, Pool};
pub use tokio_postgres::{Row, error::SqlState};

/// Result alias for database operations.
pub type Result<T> = std::result::Result<T, DbError>;
