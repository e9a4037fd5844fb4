//! Shared test utilities for the power shelf manager.
//!
//! # Modules
//!
//! - [`artifacts`] - Temporary firmware artifact trees laid out like the real one
//! - [`fake_pmc`] - An in-process PMC standing in for the Redfish service
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! powershelf-test-helpers = { workspace = true }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

pub mod artifacts;
pub mod fake_pmc;

pub use artifacts::ArtifactTree;
pub use fake_pmc::{FakeConnector, FakePmc, FakePmcClient, liteon_access, power_supply};
