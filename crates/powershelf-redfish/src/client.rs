use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use powershelf_types::{Credential, PmcAccess};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use crate::model::{Chassis, Collection, Manager, PowerSupply, ResetType, Sensor, attach_sensors};
use crate::{PmcClient, PmcConnector, RedfishError, Result};

const SERVICE_ROOT: &str = "/redfish/v1";
const MANAGERS: &str = "/redfish/v1/Managers";
const CHASSIS: &str = "/redfish/v1/Chassis";
const POWER_SUPPLIES: &str = "/redfish/v1/Chassis/powershelf/PowerSubsystem/PowerSupplies";
const SENSORS: &str = "/redfish/v1/Chassis/powershelf/Sensors";
const UPDATE_SERVICE: &str = "/redfish/v1/UpdateService";
const CHASSIS_ON: &str = "/redfish/v1/Chassis/powershelf/Actions/Chassis.On";
const CHASSIS_FORCE_OFF: &str = "/redfish/v1/Chassis/powershelf/Actions/Chassis.ForceOff";
const MANAGER_RESET: &str = "/redfish/v1/Managers/bmc/Actions/Manager.Reset";

const PMC_MANAGER_ID: &str = "bmc";
const POWERSHELF_CHASSIS_ID: &str = "powershelf";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Management endpoint for a PMC at `ip`.
///
/// Loopback is assumed to be a port-forwarded PMC on `8443`.
pub fn endpoint_for(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) if v4.is_loopback() => format!("https://{v4}:8443"),
        IpAddr::V4(v4) => format!("https://{v4}"),
        IpAddr::V6(v6) => format!("https://[{v6}]"),
    }
}

/// Redfish client for one PMC, authenticating every request with basic auth.
pub struct RedfishClient {
    http: Client,
    endpoint: String,
    credential: Credential,
}

impl RedfishClient {
    /// Build a client for `endpoint` (scheme, host and optional port).
    ///
    /// PMCs ship self-signed certificates, so verification is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`RedfishError::Setup`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        credential: Credential,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| RedfishError::Setup(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            credential,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .basic_auth(&self.credential.user, Some(self.credential.password()))
    }

    async fn send(&self, method: Method, path: &str, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RedfishError::Status {
            method: method.to_string(),
            url: self.url(path),
            status: status.as_u16(),
            body,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .send(Method::GET, path, self.request(Method::GET, path))
            .await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| RedfishError::Decode {
            url: self.url(path),
            reason: e.to_string(),
        })
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        debug!(endpoint = %self.endpoint, path, "redfish POST");
        self.send(Method::POST, path, self.request(Method::POST, path).json(body))
            .await?;
        Ok(())
    }

    async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        debug!(endpoint = %self.endpoint, path, "redfish PATCH");
        self.send(Method::PATCH, path, self.request(Method::PATCH, path).json(body))
            .await?;
        Ok(())
    }

    /// Fetch the service root, proving reachability and credentials.
    ///
    /// # Errors
    ///
    /// Transport failures or a non-success status.
    pub async fn ping(&self) -> Result<()> {
        self.get::<serde_json::Value>(SERVICE_ROOT).await.map(|_| ())
    }

    /// Every member of `collection`, fetched in listed order.
    async fn members<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let listed: Collection = self.get(collection).await?;
        let mut out = Vec::with_capacity(listed.members.len());
        for member in listed.members {
            out.push(self.get(&member.odata_id).await?);
        }
        Ok(out)
    }

    /// Chassis sensors. A service without a sensor collection has none.
    ///
    /// # Errors
    ///
    /// Transport failures or a non-success status other than 404.
    pub async fn query_sensors(&self) -> Result<Vec<Sensor>> {
        match self.members(SENSORS).await {
            Err(RedfishError::Status { status: 404, .. }) => Ok(Vec::new()),
            other => other,
        }
    }

    async fn find_member<T, F>(&self, collection: &str, what: &str, matches: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let members: Collection = self.get(collection).await?;
        for member in members.members {
            let resource: T = self.get(&member.odata_id).await?;
            if matches(&resource) {
                return Ok(resource);
            }
        }
        Err(RedfishError::MissingResource(what.to_string()))
    }

    /// `PATCH` the update service so pushed images apply immediately.
    ///
    /// # Errors
    ///
    /// Transport failures or a non-success status.
    pub async fn set_push_apply_time_immediate(&self) -> Result<()> {
        self.patch(
            UPDATE_SERVICE,
            &json!({
                "HttpPushUriOptions": {
                    "HttpPushUriApplyTime": { "ApplyTime": "Immediate" }
                }
            }),
        )
        .await
    }

    /// `POST` a firmware image to the update service.
    ///
    /// # Errors
    ///
    /// Transport failures or a non-success status.
    pub async fn upload_firmware(&self, image: Vec<u8>) -> Result<()> {
        let size = image.len();
        let request = self
            .request(Method::POST, UPDATE_SERVICE)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image);
        self.send(Method::POST, UPDATE_SERVICE, request).await?;
        info!(endpoint = %self.endpoint, bytes = size, "uploaded firmware image");
        Ok(())
    }
}

#[async_trait]
impl PmcClient for RedfishClient {
    async fn query_manager(&self) -> Result<Manager> {
        self.find_member(MANAGERS, "the pmc manager", |m: &Manager| {
            m.id == PMC_MANAGER_ID
        })
        .await
    }

    async fn query_chassis(&self) -> Result<Chassis> {
        self.find_member(CHASSIS, "a powershelf chassis subsystem", |c: &Chassis| {
            c.id == POWERSHELF_CHASSIS_ID
        })
        .await
    }

    async fn query_power_supplies(&self) -> Result<Vec<PowerSupply>> {
        let mut supplies: Vec<PowerSupply> = self.members(POWER_SUPPLIES).await?;
        attach_sensors(&mut supplies, self.query_sensors().await?);
        debug!(endpoint = %self.endpoint, count = supplies.len(), "queried power supplies");
        Ok(supplies)
    }

    async fn update_firmware(&self, image: Vec<u8>) -> Result<()> {
        self.set_push_apply_time_immediate().await?;
        self.upload_firmware(image).await
    }

    async fn power_on(&self) -> Result<()> {
        self.post(CHASSIS_ON, &json!({ "OnType": "On" })).await
    }

    async fn power_off(&self) -> Result<()> {
        self.post(CHASSIS_FORCE_OFF, &json!({ "ForceOffType": "ForceOff" }))
            .await
    }

    async fn reset_pmc(&self, kind: ResetType) -> Result<()> {
        self.post(MANAGER_RESET, &json!({ "ResetType": kind })).await
    }
}

/// Connects to PMCs over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpPmcConnector {
    timeout: Duration,
    endpoint_override: Option<String>,
}

impl Default for HttpPmcConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl HttpPmcConnector {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            endpoint_override: None,
        }
    }

    /// Send every connection to `endpoint` regardless of the PMC's IP.
    /// Used against simulators and tunnels.
    pub fn with_endpoint_override(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    fn endpoint(&self, access: &PmcAccess) -> String {
        self.endpoint_override
            .clone()
            .unwrap_or_else(|| endpoint_for(access.pmc.ip))
    }
}

#[async_trait]
impl PmcConnector for HttpPmcConnector {
    async fn connect(&self, access: &PmcAccess) -> Result<Box<dyn PmcClient>> {
        let client = RedfishClient::new(
            self.endpoint(access),
            access.credential.clone(),
            self.timeout,
        )?;
        client.ping().await?;
        debug!(pmc = %access.mac(), endpoint = %client.endpoint(), "connected to PMC");
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_uses_forwarded_port() -> std::result::Result<(), std::net::AddrParseError> {
        assert_eq!(endpoint_for("127.0.0.1".parse()?), "https://127.0.0.1:8443");
        assert_eq!(endpoint_for("10.1.2.3".parse()?), "https://10.1.2.3");
        assert_eq!(endpoint_for("fd00::1".parse()?), "https://[fd00::1]");
        Ok(())
    }
}
