//! PMC session manager
//!
//! Joins the device registry with the credential store and opens bounded
//! protocol sessions. Nothing is cached: every call resolves the current
//! address and credential, since either may rotate between polls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use powershelf_credentials::CredentialStore;
use powershelf_redfish::{PmcClient, PmcConnector};
use powershelf_registry::DeviceRegistry;
use powershelf_types::{MacAddr, PmcAccess};
use tracing::info;

use crate::{FirmwareError, Result};

/// Default bound on one device transaction.
pub const DEFAULT_DEVICE_TIMEOUT: Duration = Duration::from_secs(60);

/// Registry, credentials and protocol access for onboarded PMCs.
#[derive(Clone)]
pub struct PmcManager {
    registry: Arc<dyn DeviceRegistry>,
    credentials: Arc<dyn CredentialStore>,
    connector: Arc<dyn PmcConnector>,
    device_timeout: Duration,
}

impl PmcManager {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        credentials: Arc<dyn CredentialStore>,
        connector: Arc<dyn PmcConnector>,
    ) -> Self {
        Self {
            registry,
            credentials,
            connector,
            device_timeout: DEFAULT_DEVICE_TIMEOUT,
        }
    }

    /// Bound used by [`PmcManager::power_on`] and [`PmcManager::power_off`].
    #[must_use]
    pub fn with_device_timeout(mut self, timeout: Duration) -> Self {
        self.device_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<dyn DeviceRegistry> {
        &self.registry
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Start the registry, then the credential store.
    ///
    /// # Errors
    ///
    /// The first backend failure.
    pub async fn start(&self) -> Result<()> {
        self.registry.start().await?;
        self.credentials.start().await?;
        Ok(())
    }

    /// Stop the registry, then the credential store.
    ///
    /// # Errors
    ///
    /// The first backend failure.
    pub async fn stop(&self) -> Result<()> {
        self.registry.stop().await?;
        self.credentials.stop().await?;
        Ok(())
    }

    /// Register the PMC, then store its credential.
    ///
    /// # Errors
    ///
    /// Registry conflicts and credential store failures.
    pub async fn register(&self, access: &PmcAccess) -> Result<()> {
        self.registry.register_device(&access.pmc).await?;
        self.credentials
            .put(access.mac(), &access.credential)
            .await?;
        info!(pmc = %access.mac(), ip = %access.pmc.ip, "registered PMC with credentials");
        Ok(())
    }

    /// Current registration and credential for `mac`.
    ///
    /// # Errors
    ///
    /// Not-found from either store, or backend failures.
    pub async fn get_pmc(&self, mac: MacAddr) -> Result<PmcAccess> {
        let pmc = self.registry.get_device(mac).await?;
        let credential = self.credentials.get(mac).await?;
        Ok(PmcAccess::new(pmc, credential))
    }

    /// Every registered PMC with its credential.
    ///
    /// # Errors
    ///
    /// Fails if any registered PMC has no usable credential.
    pub async fn get_all_pmcs(&self) -> Result<Vec<PmcAccess>> {
        let pmcs = self.registry.get_all_devices().await?;
        let mut out = Vec::with_capacity(pmcs.len());
        for pmc in pmcs {
            let credential = self.credentials.get(pmc.mac).await?;
            out.push(PmcAccess::new(pmc, credential));
        }
        Ok(out)
    }

    /// Connect to `access` and run `op`, all within `limit`.
    ///
    /// # Errors
    ///
    /// [`FirmwareError::DeviceTimeout`] when `limit` elapses; otherwise
    /// whatever connecting or `op` returns.
    pub async fn transaction<T, F, Fut>(
        &self,
        access: &PmcAccess,
        limit: Duration,
        op: F,
    ) -> Result<T>
    where
        F: FnOnce(Box<dyn PmcClient>) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let run = async {
            let client = self.connector.connect(access).await?;
            op(client).await
        };
        tokio::time::timeout(limit, run)
            .await
            .map_err(|_elapsed| FirmwareError::DeviceTimeout(limit))?
    }

    /// Turn the shelf behind `mac` on.
    ///
    /// # Errors
    ///
    /// Lookup, connection and protocol failures.
    pub async fn power_on(&self, mac: MacAddr) -> Result<()> {
        let access = self.get_pmc(mac).await?;
        self.transaction(&access, self.device_timeout, |client| async move {
            client.power_on().await?;
            Ok(())
        })
        .await?;
        info!(pmc = %mac, "powered on");
        Ok(())
    }

    /// Turn the shelf behind `mac` off.
    ///
    /// # Errors
    ///
    /// Lookup, connection and protocol failures.
    pub async fn power_off(&self, mac: MacAddr) -> Result<()> {
        let access = self.get_pmc(mac).await?;
        self.transaction(&access, self.device_timeout, |client| async move {
            client.power_off().await?;
            Ok(())
        })
        .await?;
        info!(pmc = %mac, "powered off");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powershelf_credentials::InMemoryCredentialStore;
    use powershelf_errors::Classify;
    use powershelf_registry::InMemoryDeviceRegistry;
    use powershelf_test_helpers::{FakePmc, liteon_access};

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn manager(pmc: &FakePmc) -> PmcManager {
        PmcManager::new(
            Arc::new(InMemoryDeviceRegistry::new()),
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(pmc.connector()),
        )
    }

    #[tokio::test]
    async fn test_register_then_resolve() -> TestResult {
        let fake = FakePmc::new("1.2.0");
        let pmcs = manager(&fake);
        let access = liteon_access("00:11:22:33:44:55", "10.0.0.5")?;

        pmcs.register(&access).await?;
        assert_eq!(pmcs.get_pmc(access.mac()).await?, access);
        assert_eq!(pmcs.get_all_pmcs().await?, vec![access]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_pmc_is_not_found() -> TestResult {
        let fake = FakePmc::new("1.2.0");
        let pmcs = manager(&fake);
        let err = pmcs
            .get_pmc("00:11:22:33:44:66".parse()?)
            .await
            .err()
            .ok_or("expected an error")?;
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn test_power_actions_reach_device() -> TestResult {
        let fake = FakePmc::new("1.2.0");
        let pmcs = manager(&fake);
        let access = liteon_access("00:11:22:33:44:55", "10.0.0.5")?;
        pmcs.register(&access).await?;

        pmcs.power_off(access.mac()).await?;
        assert_eq!(fake.powered(), Some(false));
        pmcs.power_on(access.mac()).await?;
        assert_eq!(fake.powered(), Some(true));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_transaction_times_out() -> TestResult {
        let fake = FakePmc::new("1.2.0");
        fake.set_delay(Duration::from_secs(120));
        let pmcs = manager(&fake);
        let access = liteon_access("00:11:22:33:44:55", "10.0.0.5")?;

        let result = pmcs
            .transaction(&access, Duration::from_secs(60), |client| async move {
                Ok(client.firmware_version().await?)
            })
            .await;
        assert!(matches!(result, Err(FirmwareError::DeviceTimeout(_))));
        Ok(())
    }
}
