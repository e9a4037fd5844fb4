//! Registry of onboarded PMCs
//!
//! Maps a PMC hardware address to its registered IP and vendor. Both the
//! hardware address and the IP are unique across the fleet, and both
//! uniqueness checks are enforced where the data lives so a concurrent pair
//! of registrations cannot both succeed.
//!
//! # Architecture
//!
//! - [`DeviceRegistry`]: the async contract
//! - [`InMemoryDeviceRegistry`]: one reader/writer lock covers check and insert
//! - [`PostgresDeviceRegistry`]: relies on the `pmc` table's primary key and
//!   `UNIQUE (ip_address)` constraint

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

mod error;
mod memory;
mod postgres;

use std::net::IpAddr;

use async_trait::async_trait;
use powershelf_types::{MacAddr, Pmc};

pub use error::RegistryError;
pub use memory::InMemoryDeviceRegistry;
pub use postgres::PostgresDeviceRegistry;

/// Result alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Lookup and onboarding of PMCs by hardware address.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Prepare the backend. Idempotent.
    async fn start(&self) -> Result<()>;

    /// Release backend resources. Idempotent.
    async fn stop(&self) -> Result<()>;

    /// Add a PMC. Fails with [`RegistryError::AlreadyRegistered`] if either
    /// its hardware address or its IP is taken; the existing entry is left
    /// untouched.
    async fn register_device(&self, pmc: &Pmc) -> Result<()>;

    /// Whether `mac` has been registered.
    async fn is_registered(&self, mac: MacAddr) -> Result<bool>;

    /// The registration for `mac`, or [`RegistryError::NotFound`].
    async fn get_device(&self, mac: MacAddr) -> Result<Pmc>;

    /// Every registration, ordered by hardware address.
    async fn get_all_devices(&self) -> Result<Vec<Pmc>>;

    /// Move a registered PMC to a new IP, e.g. after a DHCP change.
    async fn update_address(&self, mac: MacAddr, ip: IpAddr) -> Result<()>;
}

fn validate(pmc: &Pmc) -> Result<()> {
    if !pmc.vendor.is_supported() {
        return Err(powershelf_errors::ValidationError::unsupported(
            "vendor",
            pmc.vendor.code().to_string(),
        )
        .into());
    }
    Ok(())
}
