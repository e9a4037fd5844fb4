//! Top-level power shelf manager
//!
//! Owns the backends selected by [`ServiceConfig`] and the firmware manager
//! built over them, and exposes the operations the gRPC front end and the
//! CLI call. Addresses arrive as MAC strings and are parsed here.

use std::sync::Arc;

use powershelf_credentials::CredentialStore;
use powershelf_db::Database;
use powershelf_firmware::runner::IntervalWaiter;
use powershelf_firmware::{
    DirectoryResolver, FirmwareError, FirmwareManager, FirmwareUpdate, FirmwareUpdateStore,
    FirmwareUpdater, FirmwareUpgrade, InMemoryFirmwareUpdateStore, InventoryManager, PmcManager,
    PostgresFirmwareUpdateStore, PowerShelf, Runner,
};
use powershelf_redfish::{HttpPmcConnector, PmcConnector};
use powershelf_registry::{DeviceRegistry, InMemoryDeviceRegistry, PostgresDeviceRegistry};
use powershelf_types::{Component, MacAddr, PmcAccess, Vendor};
use tracing::{info, warn};

use crate::config::{DataStoreType, ServiceConfig};
use crate::error::ServiceError;

/// Result alias for facade operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Tag of the background reconciliation runner.
pub const RECONCILER_TAG: &str = "firmware-reconciler";

/// Tag of the background inventory runner.
pub const INVENTORY_TAG: &str = "inventory-collector";

/// Registration, inventory, firmware and power operations over the
/// configured backends.
pub struct PowershelfManager {
    firmware: Arc<FirmwareManager>,
    inventory: Arc<InventoryManager>,
    db: Option<Database>,
}

impl PowershelfManager {
    /// Build every backend `config` selects and load the firmware
    /// repositories from its artifact root.
    ///
    /// # Errors
    ///
    /// Invalid configuration, an unbuildable pool or credential client, and
    /// artifact directories that cannot be read.
    pub async fn new(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        let credentials = powershelf_credentials::build(&config.credential_store())?;

        let (registry, store, db): (Arc<dyn DeviceRegistry>, Arc<dyn FirmwareUpdateStore>, _) =
            match config.datastore {
                DataStoreType::Persistent => {
                    let db = Database::connect(&config.db)?;
                    (
                        Arc::new(PostgresDeviceRegistry::new(db.clone())),
                        Arc::new(PostgresFirmwareUpdateStore::new(db.clone())),
                        Some(db),
                    )
                }
                DataStoreType::InMemory => (
                    Arc::new(InMemoryDeviceRegistry::new()),
                    Arc::new(InMemoryFirmwareUpdateStore::new()),
                    None,
                ),
            };

        let timeouts = config.timeouts();
        let connector = Arc::new(HttpPmcConnector::new(timeouts.device));
        let resolver = Arc::new(DirectoryResolver::new(config.firmware_root.clone()));
        let mut updaters = Vec::new();
        for vendor in Vendor::supported() {
            updaters.push(FirmwareUpdater::load(vendor, resolver.clone()).await?);
        }

        let pmcs = PmcManager::new(registry, credentials, connector)
            .with_device_timeout(timeouts.device);
        let inventory = InventoryManager::new(pmcs.clone(), timeouts.device);
        let firmware = FirmwareManager::new(pmcs, store, updaters, timeouts, config.dry_run);
        info!(datastore = %config.datastore, "powershelf manager initialized");
        Ok(Self {
            firmware: Arc::new(firmware),
            inventory: Arc::new(inventory),
            db,
        })
    }

    /// Assemble from already-built parts. No database is attached, so
    /// [`PowershelfManager::migrate`] is a no-op.
    pub fn from_parts(
        registry: Arc<dyn DeviceRegistry>,
        credentials: Arc<dyn CredentialStore>,
        connector: Arc<dyn PmcConnector>,
        store: Arc<dyn FirmwareUpdateStore>,
        updaters: Vec<FirmwareUpdater>,
        config: &ServiceConfig,
    ) -> Self {
        let timeouts = config.timeouts();
        let pmcs = PmcManager::new(registry, credentials, connector)
            .with_device_timeout(timeouts.device);
        Self {
            inventory: Arc::new(InventoryManager::new(pmcs.clone(), timeouts.device)),
            firmware: Arc::new(FirmwareManager::new(
                pmcs,
                store,
                updaters,
                timeouts,
                config.dry_run,
            )),
            db: None,
        }
    }

    /// The firmware manager behind this facade.
    pub fn firmware(&self) -> &Arc<FirmwareManager> {
        &self.firmware
    }

    /// The inventory collector behind this facade.
    pub fn inventory(&self) -> &Arc<InventoryManager> {
        &self.inventory
    }

    /// Apply pending schema migrations. Returns how many ran.
    ///
    /// # Errors
    ///
    /// Connection and migration failures, including changed hashes.
    pub async fn migrate(&self) -> Result<usize> {
        match &self.db {
            Some(db) => {
                db.ping().await?;
                Ok(db.migrate().await?)
            }
            None => Ok(0),
        }
    }

    /// Start the registry and credential store.
    ///
    /// # Errors
    ///
    /// The first backend failure.
    pub async fn start(&self) -> Result<()> {
        self.firmware.pmcs().start().await?;
        Ok(())
    }

    /// Stop the registry and credential store.
    ///
    /// # Errors
    ///
    /// The first backend failure.
    pub async fn stop(&self) -> Result<()> {
        self.firmware.pmcs().stop().await?;
        Ok(())
    }

    /// Run reconciliation every `interval` until the returned runner is stopped.
    pub fn spawn_reconciler(&self, interval: std::time::Duration) -> Runner {
        Runner::spawn(
            RECONCILER_TAG,
            Arc::new(IntervalWaiter::new(interval)),
            self.firmware.clone(),
        )
    }

    /// Refresh the inventory every `interval` until the returned runner is
    /// stopped.
    pub fn spawn_inventory(&self, interval: std::time::Duration) -> Runner {
        Runner::spawn(
            INVENTORY_TAG,
            Arc::new(IntervalWaiter::new(interval)),
            self.inventory.clone(),
        )
    }

    /// Onboard a PMC and store its credential.
    ///
    /// # Errors
    ///
    /// Conflicts on MAC or IP, and backend failures.
    pub async fn register_pmc(&self, access: &PmcAccess) -> Result<()> {
        self.firmware.pmcs().register(access).await?;
        Ok(())
    }

    /// Registration and credential for `mac`.
    ///
    /// # Errors
    ///
    /// Malformed `mac`, or not-found from either store.
    pub async fn get_pmc(&self, mac: &str) -> Result<PmcAccess> {
        Ok(self.firmware.pmcs().get_pmc(parse_mac(mac)?).await?)
    }

    /// Last inventory snapshots for `macs`, or for every registered shelf
    /// when `macs` is empty.
    ///
    /// # Errors
    ///
    /// The first malformed MAC.
    pub fn get_powershelves(&self, macs: &[String]) -> Result<Vec<PowerShelf>> {
        if macs.is_empty() {
            return Ok(self.inventory.get_all_powershelves());
        }
        let macs = macs
            .iter()
            .map(String::as_str)
            .map(parse_mac)
            .collect::<Result<Vec<_>>>()?;
        Ok(self.inventory.get_powershelves(&macs))
    }

    /// Upgrade edges offered for the PMC's vendor.
    ///
    /// # Errors
    ///
    /// Lookup failures and unsupported vendors.
    pub async fn list_available_firmware(&self, mac: &str) -> Result<Vec<FirmwareUpgrade>> {
        let access = self.get_pmc(mac).await?;
        Ok(self.firmware.list_available_firmware(&access.pmc)?)
    }

    /// # Errors
    ///
    /// Lookup failures, malformed targets, and live query failures.
    pub async fn can_update_firmware(
        &self,
        mac: &str,
        component: Component,
        target: &str,
    ) -> Result<bool> {
        let access = self.get_pmc(mac).await?;
        Ok(self.firmware.can_update(&access, component, target).await?)
    }

    /// Queue an upgrade of `component` on the PMC to `target`.
    ///
    /// # Errors
    ///
    /// Lookup failures, illegal or in-flight upgrades, and store failures.
    pub async fn upgrade_firmware(
        &self,
        mac: &str,
        component: Component,
        target: &str,
    ) -> Result<FirmwareUpdate> {
        let access = self.get_pmc(mac).await?;
        Ok(self.firmware.upgrade(&access, component, target).await?)
    }

    /// Latest upgrade record for the PMC and component.
    ///
    /// # Errors
    ///
    /// Malformed `mac`, no record, and store failures.
    pub async fn get_firmware_update_status(
        &self,
        mac: &str,
        component: Component,
    ) -> Result<FirmwareUpdate> {
        Ok(self
            .firmware
            .get_firmware_update(parse_mac(mac)?, component)
            .await?)
    }

    /// # Errors
    ///
    /// Artifact failures while sizing images.
    pub async fn firmware_summary(&self) -> Result<String> {
        Ok(self.firmware.summary().await?)
    }

    pub fn set_dry_run(&self, dry_run: bool) {
        self.firmware.set_dry_run(dry_run);
    }

    pub fn dry_run(&self) -> bool {
        self.firmware.dry_run()
    }

    /// # Errors
    ///
    /// Lookup, connection and protocol failures.
    pub async fn power_on(&self, mac: &str) -> Result<()> {
        self.firmware.pmcs().power_on(parse_mac(mac)?).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Lookup, connection and protocol failures.
    pub async fn power_off(&self, mac: &str) -> Result<()> {
        self.firmware.pmcs().power_off(parse_mac(mac)?).await?;
        Ok(())
    }

    /// Stop every runner, then the backends. Failures are logged.
    pub async fn shutdown(&self, runners: impl IntoIterator<Item = Runner>) {
        for runner in runners {
            runner.stop().await;
        }
        if let Err(e) = self.stop().await {
            warn!(error = %e, "failed to stop backends cleanly");
        }
    }
}

fn parse_mac(mac: &str) -> Result<MacAddr> {
    mac.parse::<MacAddr>()
        .map_err(|e| ServiceError::Firmware(FirmwareError::Invalid(e)))
}
