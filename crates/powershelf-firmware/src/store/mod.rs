//! Durable log of firmware upgrade attempts
//!
//! The store is the only synchronization point between callers that enqueue
//! upgrades and the reconciliation loop that advances them. Both backends
//! reject a second non-terminal record for the same PMC and component.

mod memory;
mod postgres;

use async_trait::async_trait;
use powershelf_types::{Component, MacAddr};

pub use memory::InMemoryFirmwareUpdateStore;
pub use postgres::PostgresFirmwareUpdateStore;

use crate::{FirmwareState, FirmwareUpdate, FirmwareVersion, Result};

/// Storage for [`FirmwareUpdate`] records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FirmwareUpdateStore: Send + Sync {
    /// Insert a `Queued` record.
    ///
    /// Fails with [`crate::FirmwareError::InFlight`] when a non-terminal
    /// record already exists for `mac` and `component`.
    async fn create(
        &self,
        mac: MacAddr,
        component: Component,
        version_from: FirmwareVersion,
        version_to: FirmwareVersion,
    ) -> Result<FirmwareUpdate>;

    /// Most recently created record for `mac` and `component`.
    async fn latest(&self, mac: MacAddr, component: Component) -> Result<Option<FirmwareUpdate>>;

    /// Every non-terminal record, newest first.
    async fn pending(&self) -> Result<Vec<FirmwareUpdate>>;

    /// Every record for `mac` and `component`, newest first.
    async fn history(&self, mac: MacAddr, component: Component) -> Result<Vec<FirmwareUpdate>>;

    /// Record a new state and error message. The transition time moves only
    /// when the state differs from the stored one; `updated_at` always moves.
    async fn set_state(&self, id: i64, state: FirmwareState, error: Option<String>) -> Result<()>;

    /// Refresh `updated_at` without touching anything else.
    async fn touch(&self, id: i64) -> Result<()>;
}
