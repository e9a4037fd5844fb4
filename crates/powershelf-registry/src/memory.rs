use std::collections::BTreeMap;
use std::net::IpAddr;

use async_trait::async_trait;
use parking_lot::RwLock;
use powershelf_types::{MacAddr, Pmc};
use tracing::info;

use crate::{DeviceRegistry, RegistryError, Result, validate};

/// Registry backed by a process-local map.
#[derive(Default)]
pub struct InMemoryDeviceRegistry {
    devices: RwLock<BTreeMap<MacAddr, Pmc>>,
}

impl InMemoryDeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceRegistry for InMemoryDeviceRegistry {
    async fn start(&self) -> Result<()> {
        info!("Starting in-memory device registry");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        info!("Stopping in-memory device registry");
        Ok(())
    }

    async fn register_device(&self, pmc: &Pmc) -> Result<()> {
        validate(pmc)?;
        let mut devices = self.devices.write();
        if devices.contains_key(&pmc.mac) {
            return Err(RegistryError::already_registered(format!("mac {}", pmc.mac)));
        }
        if devices.values().any(|d| d.ip == pmc.ip) {
            return Err(RegistryError::already_registered(format!("ip {}", pmc.ip)));
        }
        devices.insert(pmc.mac, *pmc);
        info!(pmc = %pmc.mac, ip = %pmc.ip, vendor = %pmc.vendor, "registered PMC");
        Ok(())
    }

    async fn is_registered(&self, mac: MacAddr) -> Result<bool> {
        Ok(self.devices.read().contains_key(&mac))
    }

    async fn get_device(&self, mac: MacAddr) -> Result<Pmc> {
        self.devices
            .read()
            .get(&mac)
            .copied()
            .ok_or(RegistryError::NotFound(mac))
    }

    async fn get_all_devices(&self) -> Result<Vec<Pmc>> {
        Ok(self.devices.read().values().copied().collect())
    }

    async fn update_address(&self, mac: MacAddr, ip: IpAddr) -> Result<()> {
        let mut devices = self.devices.write();
        if devices.values().any(|d| d.ip == ip && d.mac != mac) {
            return Err(RegistryError::already_registered(format!("ip {ip}")));
        }
        let device = devices.get_mut(&mac).ok_or(RegistryError::NotFound(mac))?;
        device.ip = ip;
        Ok(())
    }
}
