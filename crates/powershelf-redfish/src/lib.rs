//! Redfish access to power shelf PMCs
//!
//! # Architecture
//!
//! - [`PmcClient`]: the operations the manager needs from a connected PMC
//! - [`PmcConnector`]: opens a [`PmcClient`] for a registration plus credential
//! - [`RedfishClient`] / [`HttpPmcConnector`]: HTTPS implementation with basic
//!   auth
//! - [`model`]: the slices of the Redfish schema this crate reads
//!
//! Everything above the connector only sees the traits, so tests and
//! alternative transports plug in without touching the upgrade logic.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

mod client;
mod error;
pub mod model;

use async_trait::async_trait;
use powershelf_types::PmcAccess;

pub use client::{HttpPmcConnector, RedfishClient, endpoint_for};
pub use error::RedfishError;
pub use model::{Chassis, Manager, PowerState, PowerSupply, ResetType, Sensor};

/// Result alias for Redfish operations.
pub type Result<T> = std::result::Result<T, RedfishError>;

/// Operations on one connected PMC.
#[async_trait]
pub trait PmcClient: Send + Sync {
    /// The PMC's own manager resource (`Id == "bmc"`).
    async fn query_manager(&self) -> Result<Manager>;

    /// The shelf chassis resource (`Id == "powershelf"`).
    async fn query_chassis(&self) -> Result<Chassis>;

    /// Power supplies of the shelf, each carrying the sensors that name it.
    async fn query_power_supplies(&self) -> Result<Vec<PowerSupply>>;

    /// Firmware version string reported by the manager.
    async fn firmware_version(&self) -> Result<String> {
        Ok(self.query_manager().await?.firmware_version)
    }

    /// Set the push apply time to immediate and upload `image`.
    async fn update_firmware(&self, image: Vec<u8>) -> Result<()>;

    /// Power the shelf on.
    async fn power_on(&self) -> Result<()>;

    /// Force the shelf off.
    async fn power_off(&self) -> Result<()>;

    /// Restart the PMC itself.
    async fn reset_pmc(&self, kind: ResetType) -> Result<()>;
}

/// Opens sessions to PMCs.
#[async_trait]
pub trait PmcConnector: Send + Sync {
    /// Connect to the PMC described by `access`.
    async fn connect(&self, access: &PmcAccess) -> Result<Box<dyn PmcClient>>;
}
