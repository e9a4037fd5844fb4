//! Convenience re-exports for common firmware types

pub use crate::error::FirmwareError;
pub use crate::inventory::{InventoryManager, PowerShelf};
pub use crate::manager::{FirmwareManager, FirmwareTimeouts};
pub use crate::pmc::PmcManager;
pub use crate::record::{FirmwareState, FirmwareUpdate};
pub use crate::repository::{
    ArtifactResolver, DirectoryResolver, FirmwareRepository, FirmwareUpgrade,
};
pub use crate::rule::{DirectUpgradeRule, UpgradeRule};
pub use crate::runner::{IntervalWaiter, Runner, RunnerStatus, Task, Waiter};
pub use crate::store::{
    FirmwareUpdateStore, InMemoryFirmwareUpdateStore, PostgresFirmwareUpdateStore,
};
pub use crate::updater::FirmwareUpdater;
pub use crate::version::FirmwareVersion;
