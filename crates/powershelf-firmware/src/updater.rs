//! Per-vendor firmware updater: repository plus upgrade rule.

use std::sync::Arc;

use powershelf_redfish::PmcClient;
use powershelf_types::Vendor;
use tracing::info;

use crate::repository::{ArtifactResolver, FirmwareRepository, FirmwareUpgrade};
use crate::rule::{UpgradeRule, rule_for};
use crate::{FirmwareError, FirmwareVersion, Result};

/// Decides and performs upgrades for one vendor's PMCs.
pub struct FirmwareUpdater {
    repo: FirmwareRepository,
    rule: Box<dyn UpgradeRule>,
}

impl FirmwareUpdater {
    /// Pair a repository with a rule.
    pub fn new(repo: FirmwareRepository, rule: Box<dyn UpgradeRule>) -> Self {
        Self { repo, rule }
    }

    /// Load `vendor`'s repository from `resolver` with the vendor's rule.
    ///
    /// # Errors
    ///
    /// [`FirmwareError::NoUpdater`] for vendors without a rule; resolver
    /// failures otherwise.
    pub async fn load(vendor: Vendor, resolver: Arc<dyn ArtifactResolver>) -> Result<Self> {
        let rule = rule_for(vendor).ok_or(FirmwareError::NoUpdater(vendor))?;
        let repo = FirmwareRepository::load(vendor, resolver).await?;
        Ok(Self::new(repo, rule))
    }

    pub fn vendor(&self) -> Vendor {
        self.repo.vendor()
    }

    pub fn repository(&self) -> &FirmwareRepository {
        &self.repo
    }

    /// Every upgrade edge the repository offers.
    pub fn upgrades(&self) -> &[FirmwareUpgrade] {
        self.repo.upgrades()
    }

    /// The edge that takes `current` to `target`, if the repository covers
    /// `current` and the rule allows it.
    pub fn select_upgrade(
        &self,
        current: FirmwareVersion,
        target: FirmwareVersion,
    ) -> Option<&FirmwareUpgrade> {
        if !self.repo.supports_upgrade_from(current) {
            return None;
        }
        self.repo
            .upgrades()
            .iter()
            .find(|upgrade| upgrade.to == target && self.rule.is_allowed(current, upgrade))
    }

    /// Whether `current` may be upgraded to `target`.
    pub fn can_update(&self, current: FirmwareVersion, target: FirmwareVersion) -> bool {
        self.select_upgrade(current, target).is_some()
    }

    /// Version the device reports right now.
    ///
    /// # Errors
    ///
    /// Device failures, or [`FirmwareError::Invalid`] for an unparseable
    /// version string.
    pub async fn current_version(&self, client: &dyn PmcClient) -> Result<FirmwareVersion> {
        let raw = client.firmware_version().await?;
        Ok(raw.parse()?)
    }

    /// Re-validate against the live version and push the image for `target`.
    ///
    /// In dry-run mode the image is read but not uploaded.
    ///
    /// # Errors
    ///
    /// [`FirmwareError::NoUpgradePath`] when no edge applies,
    /// artifact read failures, and device failures.
    pub async fn upgrade(
        &self,
        client: &dyn PmcClient,
        target: FirmwareVersion,
        dry_run: bool,
    ) -> Result<()> {
        let current = self.current_version(client).await?;
        let upgrade =
            self.select_upgrade(current, target)
                .ok_or(FirmwareError::NoUpgradePath {
                    vendor: self.vendor(),
                    from: current,
                    to: target,
                })?;

        let image = self.repo.read_artifact(upgrade).await?;
        info!(
            vendor = %self.vendor(),
            from = %upgrade.from,
            to = %upgrade.to,
            location = %upgrade.location,
            dry_run,
            "Upgrading firmware"
        );

        if dry_run {
            info!(size = image.len(), "Dry run: skipping firmware upload");
            return Ok(());
        }
        client.update_firmware(image).await?;
        Ok(())
    }

    /// Repository and rule report.
    ///
    /// # Errors
    ///
    /// See [`FirmwareRepository::summary`].
    pub async fn summary(&self) -> Result<String> {
        let vendor = self.vendor();
        let repo_summary = self.repo.summary().await?;
        Ok(format!(
            "{vendor} Firmware Repo Summary:\n{repo_summary}\n\
             {vendor} Firmware Upgrade Rule Summary:\n{}\n",
            self.rule.summary()
        ))
    }
}
