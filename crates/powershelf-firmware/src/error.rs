//! Error types for firmware upgrade operations

use std::path::PathBuf;
use std::time::Duration;

use powershelf_credentials::CredentialError;
use powershelf_db::DbError;
use powershelf_errors::{Classify, ErrorCategory, ValidationError};
use powershelf_redfish::RedfishError;
use powershelf_registry::RegistryError;
use powershelf_types::{Component, MacAddr, Vendor};
use thiserror::Error;

use crate::FirmwareVersion;

/// Errors that can occur while planning, enqueueing or reconciling upgrades
#[derive(Error, Debug)]
pub enum FirmwareError {
    /// Malformed input (version string, vendor, component)
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// No updater is registered for the vendor
    #[error("could not find a firmware updater for {0}")]
    NoUpdater(Vendor),

    /// Upgrades are only implemented for some components
    #[error("firmware upgrades are not supported for component {0}")]
    UnsupportedComponent(Component),

    /// A non-terminal upgrade already exists for the PMC and component
    #[error("an upgrade of {component} on {pmc} is already in progress")]
    InFlight {
        /// PMC hardware address
        pmc: MacAddr,
        /// Component being upgraded
        component: Component,
    },

    /// The repository has no legal upgrade for this version pair
    #[error("cannot update {component} for {pmc} from {from} to {to}")]
    NotUpgradable {
        /// PMC hardware address
        pmc: MacAddr,
        /// Component being upgraded
        component: Component,
        /// Version reported by the device
        from: FirmwareVersion,
        /// Requested version
        to: FirmwareVersion,
    },

    /// The vendor repository has no edge from the live version to the target
    #[error("{vendor} does not support updating from {from} to {to}")]
    NoUpgradePath {
        /// Device vendor
        vendor: Vendor,
        /// Version reported by the device
        from: FirmwareVersion,
        /// Requested version
        to: FirmwareVersion,
    },

    /// No record exists for the PMC and component
    #[error("no firmware update found for {component} on {pmc}")]
    NoUpdateRecord {
        /// PMC hardware address
        pmc: MacAddr,
        /// Component queried
        component: Component,
    },

    /// A record id vanished between read and write
    #[error("firmware update record {0} does not exist")]
    RecordNotFound(i64),

    /// A firmware artifact could not be listed or read
    #[error("firmware artifact {}: {source}", .path.display())]
    Artifact {
        /// Artifact location
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Device registry failure
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Credential store failure
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Device protocol failure
    #[error(transparent)]
    Device(#[from] RedfishError),

    /// Durable store failure
    #[error(transparent)]
    Store(#[from] DbError),

    /// A device call did not finish in time
    #[error("device operation timed out after {0:?}")]
    DeviceTimeout(Duration),

    /// A store call did not finish in time
    #[error("store operation timed out after {0:?}")]
    StoreTimeout(Duration),

    /// A stored row could not be decoded
    #[error("corrupt firmware update row: {0}")]
    Decode(String),
}

impl FirmwareError {
    /// Create an artifact I/O error.
    pub fn artifact(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FirmwareError::Artifact {
            path: path.into(),
            source,
        }
    }

    /// Create a malformed version error.
    pub fn invalid_version(value: impl Into<String>) -> Self {
        FirmwareError::Invalid(ValidationError::invalid_format("version", value))
    }
}

impl From<tokio_postgres::Error> for FirmwareError {
    fn from(err: tokio_postgres::Error) -> Self {
        FirmwareError::Store(DbError::Query(err))
    }
}

impl Classify for FirmwareError {
    fn category(&self) -> ErrorCategory {
        match self {
            FirmwareError::Invalid(e) => e.category(),
            FirmwareError::NoUpdater(_)
            | FirmwareError::UnsupportedComponent(_)
            | FirmwareError::NotUpgradable { .. }
            | FirmwareError::NoUpgradePath { .. } => ErrorCategory::Input,
            FirmwareError::InFlight { .. } => ErrorCategory::Conflict,
            FirmwareError::NoUpdateRecord { .. } | FirmwareError::RecordNotFound(_) => {
                ErrorCategory::NotFound
            }
            FirmwareError::Artifact { .. } => ErrorCategory::Other,
            FirmwareError::Registry(e) => e.category(),
            FirmwareError::Credential(e) => e.category(),
            FirmwareError::Device(e) => e.category(),
            FirmwareError::Store(e) => e.category(),
            FirmwareError::DeviceTimeout(_) => ErrorCategory::Device,
            FirmwareError::StoreTimeout(_) | FirmwareError::Decode(_) => ErrorCategory::Store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let mac = MacAddr::new([0, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(
            FirmwareError::invalid_version("x.y").category(),
            ErrorCategory::Input
        );
        assert_eq!(
            FirmwareError::InFlight {
                pmc: mac,
                component: Component::Pmc
            }
            .category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            FirmwareError::NoUpdateRecord {
                pmc: mac,
                component: Component::Pmc
            }
            .category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            FirmwareError::DeviceTimeout(Duration::from_secs(60)).category(),
            ErrorCategory::Device
        );
        assert_eq!(
            FirmwareError::Registry(RegistryError::NotFound(mac)).category(),
            ErrorCategory::NotFound
        );
    }

    #[test]
    fn test_not_upgradable_message() {
        let err = FirmwareError::NotUpgradable {
            pmc: MacAddr::new([0, 0x11, 0x22, 0x33, 0x44, 0x55]),
            component: Component::Pmc,
            from: FirmwareVersion::new(1, 2, 0),
            to: FirmwareVersion::new(9, 9, 9),
        };
        assert_eq!(
            err.to_string(),
            "cannot update PMC for 00:11:22:33:44:55 from 1.2.0 to 9.9.9"
        );
    }
}
