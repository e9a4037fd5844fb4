//! Power shelf manager service
//!
//! Wires the registry, credential store, record store and firmware manager
//! together according to a [`ServiceConfig`], runs the reconciliation loop,
//! and serves the `powershelf.v1.PowershelfManager` gRPC API.
//!
//! # Architecture
//!
//! - [`config`]: file and environment configuration
//! - [`manager`]: [`PowershelfManager`], the facade every front end calls
//! - [`proto`]: generated wire types and domain conversions
//! - [`grpc`]: the gRPC service implementation
//! - [`daemon`]: startup, serving and orderly shutdown
//! - [`observability`]: `tracing` subscriber setup
//! - [`error`]: error types

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod daemon;
pub mod error;
pub mod grpc;
pub mod manager;
pub mod observability;
pub mod proto;

pub use config::{DataStoreType, ServiceConfig};
pub use daemon::ServiceDaemon;
pub use error::{ConfigError, ServiceError};
pub use grpc::PowershelfGrpc;
pub use manager::PowershelfManager;
pub use observability::{LoggingConfig, init_logging};
