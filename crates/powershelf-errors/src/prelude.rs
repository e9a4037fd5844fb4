//! Prelude module for convenient error handling imports.
//!
//! ```
//! use powershelf_errors::prelude::*;
//!
//! let err = ValidationError::required("pmc_mac_address");
//! assert!(!err.category().is_transient());
//! ```

pub use crate::{
    common::{Classify, ErrorCategory},
    validation::ValidationError,
};
