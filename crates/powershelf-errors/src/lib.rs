//! Shared error taxonomy for the power shelf manager
//!
//! Every crate in the workspace defines its own error enum. This crate gives
//! them a common vocabulary so that front ends (the gRPC service and the CLI)
//! can react to a failure without knowing which crate produced it.
//!
//! # Architecture
//!
//! - [`common`]: [`ErrorCategory`] and the [`Classify`] trait
//! - [`validation`]: Input validation errors shared by all crates
//!
//! # Example
//!
//! ```
//! use powershelf_errors::prelude::*;
//!
//! fn parse_port(value: &str) -> Result<u16, ValidationError> {
//!     value
//!         .parse()
//!         .map_err(|_| ValidationError::invalid_format("port", value))
//! }
//!
//! let err = parse_port("http").unwrap_err();
//! assert_eq!(err.category(), ErrorCategory::Input);
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod common;
pub mod prelude;
pub mod validation;

pub use common::{Classify, ErrorCategory};
pub use validation::ValidationError;
