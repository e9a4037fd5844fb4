//! Power shelf inventory
//!
//! [`InventoryManager`] is a [`Task`]: each cycle it walks the registry and
//! snapshots every shelf over Redfish (the PMC's manager resource, the shelf
//! chassis and its power supplies). Reads are answered from the last
//! snapshot, so a caller never waits on a device.
//!
//! A shelf that cannot be reached keeps its previous snapshot. One that has
//! never been reached is listed with its registration only.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use powershelf_redfish::{Chassis, Manager, PowerSupply};
use powershelf_types::{MacAddr, Pmc, PmcAccess};
use tracing::{debug, error, warn};

use crate::pmc::PmcManager;
use crate::runner::Task;
use crate::Result;

/// Default pause between inventory cycles.
pub const DEFAULT_INVENTORY_INTERVAL: Duration = Duration::from_secs(60);

/// What is known about one shelf.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerShelf {
    pub pmc: Pmc,
    pub manager: Option<Manager>,
    pub chassis: Option<Chassis>,
    pub power_supplies: Vec<PowerSupply>,
    /// When the device last answered; `None` if it never has.
    pub collected_at: Option<DateTime<Utc>>,
}

impl PowerShelf {
    /// A shelf known only from its registration.
    pub fn registered(pmc: Pmc) -> Self {
        Self {
            pmc,
            manager: None,
            chassis: None,
            power_supplies: Vec::new(),
            collected_at: None,
        }
    }

    pub fn mac(&self) -> MacAddr {
        self.pmc.mac
    }
}

/// Periodic collector and cache of [`PowerShelf`] snapshots.
pub struct InventoryManager {
    pmcs: PmcManager,
    device_timeout: Duration,
    shelves: RwLock<BTreeMap<MacAddr, PowerShelf>>,
}

impl InventoryManager {
    pub fn new(pmcs: PmcManager, device_timeout: Duration) -> Self {
        Self {
            pmcs,
            device_timeout,
            shelves: RwLock::new(BTreeMap::new()),
        }
    }

    /// Query one shelf now, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Connection and protocol failures, or
    /// [`crate::FirmwareError::DeviceTimeout`].
    pub async fn query(&self, access: &PmcAccess) -> Result<PowerShelf> {
        let pmc = access.pmc;
        self.pmcs
            .transaction(access, self.device_timeout, |client| async move {
                let manager = client.query_manager().await?;
                let chassis = client.query_chassis().await?;
                let power_supplies = client.query_power_supplies().await?;
                Ok(PowerShelf {
                    pmc,
                    manager: Some(manager),
                    chassis: Some(chassis),
                    power_supplies,
                    collected_at: Some(Utc::now()),
                })
            })
            .await
    }

    /// One pass over the registry. Shelves no longer registered are
    /// dropped. Returns how many shelves answered.
    ///
    /// # Errors
    ///
    /// Only a registry listing failure; per-shelf failures are logged.
    pub async fn collect(&self) -> Result<usize> {
        let pmcs = self.pmcs.registry().get_all_devices().await?;
        let mut next = BTreeMap::new();
        let mut refreshed = 0usize;
        for pmc in pmcs {
            let queried = match self.pmcs.get_pmc(pmc.mac).await {
                Ok(access) => self.query(&access).await,
                Err(e) => Err(e),
            };
            let shelf = match queried {
                Ok(shelf) => {
                    refreshed = refreshed.saturating_add(1);
                    shelf
                }
                Err(e) => {
                    warn!(pmc = %pmc.mac, error = %e, "inventory query failed");
                    self.previous(pmc)
                }
            };
            next.insert(pmc.mac, shelf);
        }
        let total = next.len();
        *self.shelves.write() = next;
        debug!(refreshed, total, "inventory collected");
        Ok(refreshed)
    }

    /// Last snapshot for `pmc` under its current registration.
    fn previous(&self, pmc: Pmc) -> PowerShelf {
        match self.shelves.read().get(&pmc.mac) {
            Some(shelf) => PowerShelf {
                pmc,
                ..shelf.clone()
            },
            None => PowerShelf::registered(pmc),
        }
    }

    /// Snapshots for `macs`, in request order. Unknown MACs are skipped.
    pub fn get_powershelves(&self, macs: &[MacAddr]) -> Vec<PowerShelf> {
        let shelves = self.shelves.read();
        macs.iter()
            .filter_map(|mac| shelves.get(mac).cloned())
            .collect()
    }

    /// Every snapshot, ordered by MAC.
    pub fn get_all_powershelves(&self) -> Vec<PowerShelf> {
        self.shelves.read().values().cloned().collect()
    }
}

#[async_trait]
impl Task for InventoryManager {
    async fn run(&self) {
        if let Err(e) = self.collect().await {
            error!(error = %e, "inventory cycle failed");
        }
    }
}
