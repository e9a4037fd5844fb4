//! Firmware manager
//!
//! Entry point for legality checks and enqueueing, and owner of the
//! reconciliation step that advances accepted upgrades:
//!
//! - `Queued`: push the image (re-validated against the live version);
//!   success moves to `Verifying`, failure to `Failed`.
//! - `Verifying`: read the live version. Target reached means `Completed`,
//!   still the source version means keep waiting, anything else `Failed`.
//!   A device that cannot be reached is mid-reboot more often than not and
//!   keeps its state.
//! - A record that has not changed state for longer than the no-progress
//!   timeout is failed regardless.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use powershelf_types::{Component, MacAddr, Pmc, PmcAccess, Vendor};
use tracing::{debug, error, info, warn};

use crate::runner::Task;
use crate::store::FirmwareUpdateStore;
use crate::{
    FirmwareError, FirmwareState, FirmwareUpdate, FirmwareUpdater, FirmwareUpgrade,
    FirmwareVersion, PmcManager, Result,
};

/// Time bounds applied by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareTimeouts {
    /// One reconciliation step against a device
    pub device: Duration,
    /// One store call
    pub store: Duration,
    /// Live version query during an interactive legality check
    pub query: Duration,
    /// How long a record may sit in one state before it is failed
    pub no_progress: Duration,
}

impl Default for FirmwareTimeouts {
    fn default() -> Self {
        Self {
            device: Duration::from_secs(60),
            store: Duration::from_secs(30),
            query: Duration::from_secs(30),
            no_progress: Duration::from_secs(3600),
        }
    }
}

enum Legality {
    InFlight(FirmwareUpdate),
    Allowed {
        current: FirmwareVersion,
        target: FirmwareVersion,
    },
    Refused {
        current: FirmwareVersion,
        target: FirmwareVersion,
    },
}

/// Outcome of one reconciliation step before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    next: FirmwareState,
    error: Option<String>,
}

impl Step {
    fn to(next: FirmwareState) -> Self {
        Self { next, error: None }
    }

    fn with_error(next: FirmwareState, error: impl Into<String>) -> Self {
        Self {
            next,
            error: Some(error.into()),
        }
    }
}

/// Plans, enqueues and reconciles PMC firmware upgrades.
pub struct FirmwareManager {
    pmcs: PmcManager,
    store: Arc<dyn FirmwareUpdateStore>,
    updaters: Vec<FirmwareUpdater>,
    timeouts: FirmwareTimeouts,
    dry_run: AtomicBool,
}

impl FirmwareManager {
    /// Build a manager over one updater per supported vendor.
    pub fn new(
        pmcs: PmcManager,
        store: Arc<dyn FirmwareUpdateStore>,
        mut updaters: Vec<FirmwareUpdater>,
        timeouts: FirmwareTimeouts,
        dry_run: bool,
    ) -> Self {
        updaters.sort_by_key(FirmwareUpdater::vendor);
        Self {
            pmcs,
            store,
            updaters,
            timeouts,
            dry_run: AtomicBool::new(dry_run),
        }
    }

    pub fn pmcs(&self) -> &PmcManager {
        &self.pmcs
    }

    pub fn timeouts(&self) -> FirmwareTimeouts {
        self.timeouts
    }

    /// When enabled, upgrades read their image but do not upload it.
    pub fn set_dry_run(&self, dry_run: bool) {
        let previous = self.dry_run.swap(dry_run, Ordering::SeqCst);
        if previous != dry_run {
            info!(dry_run, "firmware manager dry run changed");
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run.load(Ordering::SeqCst)
    }

    fn updater(&self, vendor: Vendor) -> Result<&FirmwareUpdater> {
        self.updaters
            .iter()
            .find(|u| u.vendor() == vendor)
            .ok_or(FirmwareError::NoUpdater(vendor))
    }

    async fn with_store_timeout<T>(
        &self,
        call: impl std::future::Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        tokio::time::timeout(self.timeouts.store, call)
            .await
            .map_err(|_elapsed| FirmwareError::StoreTimeout(self.timeouts.store))?
    }

    async fn live_version(
        &self,
        access: &PmcAccess,
        updater: &FirmwareUpdater,
        limit: Duration,
    ) -> Result<FirmwareVersion> {
        self.pmcs
            .transaction(access, limit, |client| async move {
                updater.current_version(client.as_ref()).await
            })
            .await
    }

    async fn legality(
        &self,
        access: &PmcAccess,
        component: Component,
        target: &str,
    ) -> Result<Legality> {
        if component != Component::Pmc {
            return Err(FirmwareError::UnsupportedComponent(component));
        }

        let latest = self
            .with_store_timeout(self.store.latest(access.mac(), component))
            .await?;
        if let Some(record) = latest.filter(|r| !r.is_terminal()) {
            return Ok(Legality::InFlight(record));
        }

        let updater = self.updater(access.pmc.vendor)?;
        let target: FirmwareVersion = target.parse()?;
        let current = self
            .live_version(access, updater, self.timeouts.query)
            .await?;

        if updater.can_update(current, target) {
            Ok(Legality::Allowed { current, target })
        } else {
            Ok(Legality::Refused { current, target })
        }
    }

    /// Whether `component` on `access` may be upgraded to `target` now.
    ///
    /// `false` while an upgrade is in flight or when the repository has no
    /// legal edge. Malformed input and device failures are errors.
    ///
    /// # Errors
    ///
    /// Input errors, store failures, and live version query failures.
    pub async fn can_update(
        &self,
        access: &PmcAccess,
        component: Component,
        target: &str,
    ) -> Result<bool> {
        match self.legality(access, component, target).await? {
            Legality::Allowed { .. } => Ok(true),
            Legality::InFlight(record) => {
                debug!(
                    pmc = %access.mac(),
                    component = %component,
                    state = %record.state,
                    "upgrade already in flight"
                );
                Ok(false)
            }
            Legality::Refused { current, target } => {
                debug!(
                    pmc = %access.mac(),
                    component = %component,
                    %current,
                    %target,
                    "no legal upgrade"
                );
                Ok(false)
            }
        }
    }

    /// Re-check legality and record a `Queued` upgrade. Returns as soon as
    /// the record is stored; the reconciliation loop does the rest.
    ///
    /// # Errors
    ///
    /// [`FirmwareError::InFlight`] or [`FirmwareError::NotUpgradable`] when
    /// the upgrade is not allowed, plus everything [`Self::can_update`]
    /// can return.
    pub async fn upgrade(
        &self,
        access: &PmcAccess,
        component: Component,
        target: &str,
    ) -> Result<FirmwareUpdate> {
        let mac = access.mac();
        let (current, target) = match self.legality(access, component, target).await? {
            Legality::Allowed { current, target } => (current, target),
            Legality::InFlight(_) => {
                return Err(FirmwareError::InFlight {
                    pmc: mac,
                    component,
                });
            }
            Legality::Refused { current, target } => {
                return Err(FirmwareError::NotUpgradable {
                    pmc: mac,
                    component,
                    from: current,
                    to: target,
                });
            }
        };

        let record = self
            .with_store_timeout(self.store.create(mac, component, current, target))
            .await?;
        info!(
            pmc = %mac,
            component = %component,
            from = %current,
            to = %target,
            id = record.id,
            "queued firmware upgrade"
        );
        Ok(record)
    }

    /// Latest record for `mac` and `component`.
    ///
    /// # Errors
    ///
    /// [`FirmwareError::NoUpdateRecord`] when none exists.
    pub async fn get_firmware_update(
        &self,
        mac: MacAddr,
        component: Component,
    ) -> Result<FirmwareUpdate> {
        self.with_store_timeout(self.store.latest(mac, component))
            .await?
            .ok_or(FirmwareError::NoUpdateRecord {
                pmc: mac,
                component,
            })
    }

    /// Every record for `mac` and `component`, newest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn history(
        &self,
        mac: MacAddr,
        component: Component,
    ) -> Result<Vec<FirmwareUpdate>> {
        self.with_store_timeout(self.store.history(mac, component))
            .await
    }

    /// Upgrade edges offered for `pmc`'s vendor.
    ///
    /// # Errors
    ///
    /// [`FirmwareError::NoUpdater`] for unsupported vendors.
    pub fn list_available_firmware(&self, pmc: &Pmc) -> Result<Vec<FirmwareUpgrade>> {
        Ok(self.updater(pmc.vendor)?.upgrades().to_vec())
    }

    /// Repository and rule report for every vendor.
    ///
    /// # Errors
    ///
    /// Artifact failures while sizing images.
    pub async fn summary(&self) -> Result<String> {
        let mut out = String::from("Firmware Manager Summary:\n");
        for updater in &self.updaters {
            out.push_str(&updater.summary().await?);
        }
        Ok(out)
    }

    /// Run one reconciliation cycle over every non-terminal record.
    ///
    /// # Errors
    ///
    /// Only a failure to list pending records; per-record problems are
    /// logged and left for the next cycle.
    pub async fn reconcile(&self) -> Result<usize> {
        let started = Instant::now();
        let pending = self.with_store_timeout(self.store.pending()).await?;
        let count = pending.len();
        for record in pending {
            self.reconcile_one(record, Utc::now()).await;
        }
        info!(
            records = count,
            elapsed_ms = started.elapsed().as_millis(),
            "firmware reconciliation cycle finished"
        );
        Ok(count)
    }

    async fn reconcile_one(&self, record: FirmwareUpdate, now: DateTime<Utc>) {
        let step = match self.with_store_timeout(self.pmcs.get_pmc(record.mac)).await {
            Ok(access) if record.component == Component::Pmc => {
                self.advance_pmc(&access, &record).await
            }
            Ok(_) => Step::with_error(
                FirmwareState::Failed,
                FirmwareError::UnsupportedComponent(record.component).to_string(),
            ),
            Err(e) => Step::with_error(record.state, format!("cannot resolve PMC: {e}")),
        };
        let step = self.apply_no_progress_timeout(&record, step, now);

        if let Some(reason) = &step.error {
            debug!(
                pmc = %record.mac,
                id = record.id,
                state = %record.state,
                next = %step.next,
                reason = %reason,
                "firmware update step"
            );
        }

        if step.next == record.state {
            if let Err(e) = self.with_store_timeout(self.store.touch(record.id)).await {
                error!(
                    pmc = %record.mac,
                    id = record.id,
                    error = %e,
                    "failed to refresh firmware update"
                );
            }
            return;
        }

        if !record.state.can_transition_to(step.next) {
            warn!(
                pmc = %record.mac,
                id = record.id,
                from = %record.state,
                to = %step.next,
                "refusing illegal firmware update transition"
            );
            return;
        }

        match self
            .with_store_timeout(self.store.set_state(record.id, step.next, step.error))
            .await
        {
            Ok(()) => {
                info!(
                    pmc = %record.mac,
                    component = %record.component,
                    id = record.id,
                    from = %record.state,
                    to = %step.next,
                    "firmware update transitioned"
                );
            }
            Err(e) => {
                error!(
                    pmc = %record.mac,
                    id = record.id,
                    error = %e,
                    "failed to persist firmware update state"
                );
            }
        }
    }

    async fn advance_pmc(&self, access: &PmcAccess, record: &FirmwareUpdate) -> Step {
        let updater = match self.updater(access.pmc.vendor) {
            Ok(updater) => updater,
            Err(e) => return Step::with_error(FirmwareState::Failed, e.to_string()),
        };

        match record.state {
            FirmwareState::Queued => {
                let target = record.version_to;
                let dry_run = self.dry_run();
                let pushed = self
                    .pmcs
                    .transaction(access, self.timeouts.device, |client| async move {
                        updater.upgrade(client.as_ref(), target, dry_run).await
                    })
                    .await;
                match pushed {
                    Ok(()) => Step::to(FirmwareState::Verifying),
                    Err(e) => Step::with_error(
                        FirmwareState::Failed,
                        format!("failed to initiate firmware upgrade: {e}"),
                    ),
                }
            }
            FirmwareState::Verifying => match self
                .live_version(access, updater, self.timeouts.device)
                .await
            {
                Ok(version) if version == record.version_to => Step::to(FirmwareState::Completed),
                Ok(version) if version == record.version_from => Step::with_error(
                    FirmwareState::Verifying,
                    format!("waiting for the upgrade to {} to complete", record.version_to),
                ),
                Ok(version) => Step::with_error(
                    FirmwareState::Failed,
                    format!(
                        "found unexpected version {version} (expected {} or {})",
                        record.version_from, record.version_to
                    ),
                ),
                Err(e) => Step::with_error(
                    FirmwareState::Verifying,
                    format!("failed to query firmware version: {e}"),
                ),
            },
            state => Step::with_error(
                FirmwareState::Failed,
                format!("unexpected state {state} for a pending update"),
            ),
        }
    }

    fn apply_no_progress_timeout(
        &self,
        record: &FirmwareUpdate,
        step: Step,
        now: DateTime<Utc>,
    ) -> Step {
        if step.next != record.state {
            return step;
        }
        let limit = TimeDelta::from_std(self.timeouts.no_progress)
            .unwrap_or(TimeDelta::MAX);
        let stalled = now.signed_duration_since(record.last_transition_time);
        if stalled <= limit {
            return step;
        }
        warn!(
            pmc = %record.mac,
            id = record.id,
            state = %record.state,
            "firmware update made no progress, failing it"
        );
        let waited = self.timeouts.no_progress;
        let reason = match step.error {
            Some(e) => format!("timed out after {waited:?} in {}: {e}", record.state),
            None => format!("timed out after {waited:?} in {}", record.state),
        };
        Step::with_error(FirmwareState::Failed, reason)
    }
}

#[async_trait]
impl Task for FirmwareManager {
    async fn run(&self) {
        if let Err(e) = self.reconcile().await {
            error!(error = %e, "firmware reconciliation cycle failed");
        }
    }
}
