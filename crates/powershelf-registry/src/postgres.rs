use std::net::IpAddr;

use async_trait::async_trait;
use powershelf_db::{Database, Row};
use powershelf_types::{MacAddr, Pmc, Vendor};
use tracing::{info, warn};

use crate::{DeviceRegistry, RegistryError, Result, validate};

const SELECT_ONE: &str = "SELECT mac_address::text, host(ip_address), vendor FROM pmc \
     WHERE mac_address = $1::text::macaddr";
const SELECT_ALL: &str =
    "SELECT mac_address::text, host(ip_address), vendor FROM pmc ORDER BY mac_address";

/// Registry stored in the `pmc` table.
///
/// Addresses are stored as `MACADDR` and `INET`, so Postgres enforces both
/// format and uniqueness.
#[derive(Clone)]
pub struct PostgresDeviceRegistry {
    db: Database,
}

impl PostgresDeviceRegistry {
    /// Use an already migrated database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn decode(row: &Row) -> Result<Pmc> {
    let mac: String = row.try_get(0).map_err(RegistryError::from)?;
    let ip: String = row.try_get(1).map_err(RegistryError::from)?;
    let vendor: i32 = row.try_get(2).map_err(RegistryError::from)?;
    Ok(Pmc::new(
        mac.parse()
            .map_err(|e| RegistryError::Decode(format!("mac_address {mac:?}: {e}")))?,
        ip.parse()
            .map_err(|e| RegistryError::Decode(format!("ip_address {ip:?}: {e}")))?,
        Vendor::from_code(vendor),
    ))
}

#[async_trait]
impl DeviceRegistry for PostgresDeviceRegistry {
    async fn start(&self) -> Result<()> {
        info!("Starting Postgres device registry");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        info!("Stopping Postgres device registry");
        Ok(())
    }

    async fn register_device(&self, pmc: &Pmc) -> Result<()> {
        validate(pmc)?;
        let client = self.db.client().await?;
        client
            .execute(
                "INSERT INTO pmc (mac_address, ip_address, vendor) \
                 VALUES ($1::text::macaddr, $2::text::inet, $3)",
                &[&pmc.mac.to_string(), &pmc.ip.to_string(), &pmc.vendor.code()],
            )
            .await
            .map_err(|e| {
                warn!(pmc = %pmc.mac, error = %e, "failed to create pmc entry");
                RegistryError::from(e)
            })?;
        info!(pmc = %pmc.mac, ip = %pmc.ip, vendor = %pmc.vendor, "registered PMC");
        Ok(())
    }

    async fn is_registered(&self, mac: MacAddr) -> Result<bool> {
        let client = self.db.client().await?;
        let row = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM pmc WHERE mac_address = $1::text::macaddr)",
                &[&mac.to_string()],
            )
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn get_device(&self, mac: MacAddr) -> Result<Pmc> {
        let client = self.db.client().await?;
        let row = client
            .query_opt(SELECT_ONE, &[&mac.to_string()])
            .await?
            .ok_or(RegistryError::NotFound(mac))?;
        decode(&row)
    }

    async fn get_all_devices(&self) -> Result<Vec<Pmc>> {
        let client = self.db.client().await?;
        let rows = client.query(SELECT_ALL, &[]).await?;
        rows.iter().map(decode).collect()
    }

    async fn update_address(&self, mac: MacAddr, ip: IpAddr) -> Result<()> {
        let client = self.db.client().await?;
        let updated = client
            .execute(
                "UPDATE pmc SET ip_address = $2::text::inet, updated_at = NOW() \
                 WHERE mac_address = $1::text::macaddr",
                &[&mac.to_string(), &ip.to_string()],
            )
            .await?;
        if updated == 0 {
            return Err(RegistryError::NotFound(mac));
        }
        Ok(())
    }
}
