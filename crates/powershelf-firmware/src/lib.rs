//! Firmware upgrades for power shelf PMCs
//!
//! Upgrades take minutes and the devices have no way to push completion, so
//! callers never wait for one. A legal request is recorded as `Queued` and a
//! periodic reconciliation loop drives it to `Completed` or `Failed`.
//!
//! # Architecture
//!
//! - [`version`]: `major.minor.patch` versions and artifact file names
//! - [`repository`]: per-vendor upgrade graph built from an [`ArtifactResolver`]
//! - [`rule`]: per-vendor policy on which edges a device may take
//! - [`updater`]: repository plus rule, and the image push itself
//! - [`store`]: durable record of every attempt, in memory or in Postgres
//! - [`pmc`]: registry and credential lookups plus bounded device sessions
//! - [`inventory`]: periodic Redfish snapshots of every registered shelf
//! - [`manager`]: legality checks, enqueueing and the reconciliation step
//! - [`runner`]: the wait/run loop that calls the manager periodically
//! - [`error`]: error types
//!
//! At most one non-terminal record exists per PMC and component. The
//! in-memory store checks and inserts under one lock; the Postgres store
//! relies on a partial unique index.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod error;
pub mod inventory;
pub mod manager;
pub mod pmc;
pub mod prelude;
pub mod record;
pub mod repository;
pub mod rule;
pub mod runner;
pub mod store;
pub mod updater;
pub mod version;

pub use error::FirmwareError;
pub use inventory::{InventoryManager, PowerShelf};
pub use manager::{FirmwareManager, FirmwareTimeouts};
pub use pmc::PmcManager;
pub use record::{FirmwareState, FirmwareUpdate};
pub use repository::{ArtifactResolver, DirectoryResolver, FirmwareRepository, FirmwareUpgrade};
pub use runner::{Runner, RunnerStatus};
pub use store::{FirmwareUpdateStore, InMemoryFirmwareUpdateStore, PostgresFirmwareUpdateStore};
pub use updater::FirmwareUpdater;
pub use version::FirmwareVersion;

/// Result alias for firmware operations.
pub type Result<T> = std::result::Result<T, FirmwareError>;
