//! In-process PMC.
//!
//! [`FakePmc`] is a handle on shared device state. Its [`FakeConnector`]
//! hands out [`FakePmcClient`] sessions that read and write that state, so
//! a test can flip the running version between reconcile cycles and see
//! what was uploaded.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use powershelf_errors::ValidationError;
use powershelf_redfish::model::{Location, PartLocation, Status};
use powershelf_redfish::{
    Chassis, Manager, PmcClient, PmcConnector, PowerState, PowerSupply, RedfishError, ResetType,
    Result as RedfishResult,
};
use powershelf_types::{Credential, Pmc, PmcAccess, Vendor};

#[derive(Debug, Default)]
struct State {
    version: String,
    power_supplies: Vec<PowerSupply>,
    uploads: Vec<Vec<u8>>,
    powered: Option<bool>,
    resets: Vec<ResetType>,
    connects: usize,
    delay: Duration,
    fail_queries: bool,
    fail_uploads: bool,
}

/// Shared handle on one fake device.
#[derive(Debug, Clone, Default)]
pub struct FakePmc {
    state: Arc<Mutex<State>>,
}

impl FakePmc {
    /// A device reporting `version` from its manager resource.
    pub fn new(version: &str) -> Self {
        let pmc = Self::default();
        pmc.set_version(version);
        pmc
    }

    pub fn client(&self) -> FakePmcClient {
        FakePmcClient { pmc: self.clone() }
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector { pmc: self.clone() }
    }

    pub fn set_version(&self, version: &str) {
        self.state.lock().version = version.to_string();
    }

    /// Replace the power supplies the shelf reports.
    pub fn set_power_supplies(&self, supplies: Vec<PowerSupply>) {
        self.state.lock().power_supplies = supplies;
    }

    /// Every image uploaded so far, oldest first.
    pub fn uploads(&self) -> Vec<Vec<u8>> {
        self.state.lock().uploads.clone()
    }

    /// `None` until a power action arrives.
    pub fn powered(&self) -> Option<bool> {
        self.state.lock().powered
    }

    pub fn resets(&self) -> Vec<ResetType> {
        self.state.lock().resets.clone()
    }

    /// Sessions opened through the connector.
    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    /// Sleep before answering every call.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = delay;
    }

    /// Make resource queries answer 503.
    pub fn fail_queries(&self, fail: bool) {
        self.state.lock().fail_queries = fail;
    }

    /// Make uploads answer 500.
    pub fn fail_uploads(&self, fail: bool) {
        self.state.lock().fail_uploads = fail;
    }

    async fn pause(&self) {
        let delay = self.state.lock().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn unavailable(method: &str, path: &str, status: u16) -> RedfishError {
    RedfishError::Status {
        method: method.to_string(),
        url: format!("https://fake-pmc{path}"),
        status,
        body: "injected failure".to_string(),
    }
}

/// One session on a [`FakePmc`].
#[derive(Debug, Clone)]
pub struct FakePmcClient {
    pmc: FakePmc,
}

#[async_trait]
impl PmcClient for FakePmcClient {
    async fn query_manager(&self) -> RedfishResult<Manager> {
        self.pmc.pause().await;
        let state = self.pmc.state.lock();
        if state.fail_queries {
            return Err(unavailable("GET", "/redfish/v1/Managers/bmc", 503));
        }
        Ok(Manager {
            id: "bmc".to_string(),
            firmware_version: state.version.clone(),
            manufacturer: Some("LITEON".to_string()),
            model: None,
            serial_number: Some("PMC-0001".to_string()),
            part_number: None,
        })
    }

    async fn query_chassis(&self) -> RedfishResult<Chassis> {
        self.pmc.pause().await;
        let state = self.pmc.state.lock();
        if state.fail_queries {
            return Err(unavailable("GET", "/redfish/v1/Chassis/powershelf", 503));
        }
        Ok(Chassis {
            id: "powershelf".to_string(),
            power_state: state
                .powered
                .map(|on| if on { PowerState::On } else { PowerState::Off }),
            manufacturer: Some("LITEON".to_string()),
            model: None,
            serial_number: None,
            part_number: None,
        })
    }

    async fn query_power_supplies(&self) -> RedfishResult<Vec<PowerSupply>> {
        self.pmc.pause().await;
        let state = self.pmc.state.lock();
        if state.fail_queries {
            return Err(unavailable(
                "GET",
                "/redfish/v1/Chassis/powershelf/PowerSubsystem/PowerSupplies",
                503,
            ));
        }
        Ok(state.power_supplies.clone())
    }

    async fn update_firmware(&self, image: Vec<u8>) -> RedfishResult<()> {
        self.pmc.pause().await;
        let mut state = self.pmc.state.lock();
        if state.fail_uploads {
            return Err(unavailable("POST", "/redfish/v1/UpdateService", 500));
        }
        state.uploads.push(image);
        Ok(())
    }

    async fn power_on(&self) -> RedfishResult<()> {
        self.pmc.pause().await;
        self.pmc.state.lock().powered = Some(true);
        Ok(())
    }

    async fn power_off(&self) -> RedfishResult<()> {
        self.pmc.pause().await;
        self.pmc.state.lock().powered = Some(false);
        Ok(())
    }

    async fn reset_pmc(&self, kind: ResetType) -> RedfishResult<()> {
        self.pmc.pause().await;
        self.pmc.state.lock().resets.push(kind);
        Ok(())
    }
}

/// Connector that always reaches the same [`FakePmc`], whatever the address.
#[derive(Debug, Clone)]
pub struct FakeConnector {
    pmc: FakePmc,
}

#[async_trait]
impl PmcConnector for FakeConnector {
    async fn connect(&self, _access: &PmcAccess) -> RedfishResult<Box<dyn PmcClient>> {
        self.pmc.state.lock().connects += 1;
        Ok(Box::new(self.pmc.client()))
    }
}

/// An enabled, healthy supply in slot `index` running `firmware`.
pub fn power_supply(index: u32, firmware: &str) -> PowerSupply {
    PowerSupply {
        odata_id: format!("/redfish/v1/Chassis/powershelf/PowerSubsystem/PowerSupplies/PSU{index}"),
        id: format!("PSU{index}"),
        name: format!("Power Supply {index}"),
        power_capacity_watts: Some(5500.0),
        firmware_version: Some(firmware.to_string()),
        manufacturer: Some("LITEON".to_string()),
        model: Some("PS-2551-9L".to_string()),
        serial_number: Some(format!("PSU-SN-{index:04}")),
        part_number: None,
        hot_pluggable: Some(true),
        location: Some(Location {
            part_location: Some(PartLocation {
                service_label: Some(format!("PSU {index}")),
                location_ordinal_value: Some(index),
                location_type: Some("Bay".to_string()),
            }),
        }),
        status: Some(Status {
            state: Some("Enabled".to_string()),
            health: Some("OK".to_string()),
        }),
        sensors: Vec::new(),
    }
}

/// A Liteon PMC at `mac`/`ip` with the factory login.
///
/// # Errors
///
/// Malformed `mac` or `ip`.
pub fn liteon_access(mac: &str, ip: &str) -> Result<PmcAccess, ValidationError> {
    let mac = mac.parse()?;
    let ip = ip
        .parse()
        .map_err(|_addr| ValidationError::invalid_format("ip_address", ip))?;
    Ok(PmcAccess::new(
        Pmc::new(mac, ip, Vendor::Liteon),
        Credential::new("root", "0penBmc"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[tokio::test]
    async fn test_reports_current_version() -> TestResult {
        let pmc = FakePmc::new("1.2.0");
        let client = pmc.client();
        assert_eq!(client.firmware_version().await?, "1.2.0");

        pmc.set_version("1.3.0");
        assert_eq!(client.firmware_version().await?, "1.3.0");
        Ok(())
    }

    #[tokio::test]
    async fn test_injected_failures() -> TestResult {
        let pmc = FakePmc::new("1.2.0");
        let client = pmc.client();
        pmc.fail_queries(true);
        pmc.fail_uploads(true);

        assert!(matches!(
            client.query_manager().await,
            Err(RedfishError::Status { status: 503, .. })
        ));
        assert!(client.update_firmware(vec![1, 2, 3]).await.is_err());
        assert!(client.query_power_supplies().await.is_err());
        assert!(pmc.uploads().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_reports_configured_power_supplies() -> TestResult {
        let pmc = FakePmc::new("1.2.0");
        let client = pmc.client();
        assert!(client.query_power_supplies().await?.is_empty());

        pmc.set_power_supplies(vec![power_supply(0, "1.0.4"), power_supply(1, "1.0.5")]);
        let ids: Vec<String> = client
            .query_power_supplies()
            .await?
            .into_iter()
            .map(|psu| psu.id)
            .collect();
        assert_eq!(ids, ["PSU0", "PSU1"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_connector_counts_sessions() -> TestResult {
        let pmc = FakePmc::new("1.2.0");
        let access = liteon_access("00:11:22:33:44:55", "10.0.0.5")?;
        let client = pmc.connector().connect(&access).await?;
        client.power_off().await?;

        assert_eq!(pmc.connects(), 1);
        assert_eq!(pmc.powered(), Some(false));
        Ok(())
    }

    #[test]
    fn test_liteon_access_rejects_bad_ip() {
        assert!(liteon_access("00:11:22:33:44:55", "10.0.0").is_err());
    }
}
