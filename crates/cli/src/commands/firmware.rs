//! `psmctl fw`: repository summary, legality check and upgrade for one PMC
//!
//! Runs the firmware manager in-process against the PMC given on the command
//! line; no daemon is involved. With the in-memory datastore an upgrade is
//! also driven through one reconciliation cycle so the image push (or its
//! dry-run stand-in) happens before the command exits. With the persistent
//! datastore the upgrade is only queued and left to `psmd`.

use anyhow::{Context, Result};
use powershelf_service::{DataStoreType, PowershelfManager, ServiceConfig};
use powershelf_types::{Component, Credential, MacAddr, Pmc, PmcAccess, Vendor};
use tracing::{debug, info, warn};

use crate::commands::{FwAction, FwArgs};
use crate::error::CliError;
use crate::output;

/// Execute `fw`.
pub async fn execute(args: &FwArgs, json: bool) -> Result<()> {
    let config = service_config(args)?;
    let psm = PowershelfManager::new(&config)
        .await
        .map_err(CliError::from)
        .context("failed to initialize power shelf manager")?;
    psm.start().await.map_err(CliError::from)?;

    let result = run(&psm, &config, args, json).await;
    if let Err(e) = psm.stop().await {
        warn!(error = %e, "failed to stop backends");
    }
    result
}

async fn run(
    psm: &PowershelfManager,
    config: &ServiceConfig,
    args: &FwArgs,
    json: bool,
) -> Result<()> {
    match args.action {
        FwAction::Summary => {
            let summary = psm.firmware_summary().await.map_err(CliError::from)?;
            output::print_summary(&summary, json)
        }
        FwAction::CanUpgrade => {
            let (access, target) = target_pmc(args)?;
            let allowed = psm
                .firmware()
                .can_update(&access, Component::Pmc, target)
                .await
                .map_err(CliError::from)?;
            output::print_can_upgrade(&access, target, allowed, json)
        }
        FwAction::Upgrade => {
            let (access, target) = target_pmc(args)?;
            info!(
                pmc = %access.mac(),
                ip = %access.pmc.ip,
                vendor = %access.pmc.vendor,
                %target,
                dry_run = args.dry,
                "upgrading PMC firmware"
            );
            let drive = config.datastore == DataStoreType::InMemory;
            if drive {
                psm.register_pmc(&access).await.map_err(CliError::from)?;
            }

            let mut record = psm
                .firmware()
                .upgrade(&access, Component::Pmc, target)
                .await
                .map_err(CliError::from)?;
            if drive {
                let processed = psm.firmware().reconcile().await.map_err(CliError::from)?;
                debug!(processed, "ran one reconciliation cycle");
                record = psm
                    .firmware()
                    .get_firmware_update(access.mac(), Component::Pmc)
                    .await
                    .map_err(CliError::from)?;
            }
            output::print_update(&record, args.dry, json)
        }
    }
}

fn service_config(args: &FwArgs) -> Result<ServiceConfig> {
    let mut config = if args.datastore == crate::commands::DataStoreArg::Persistent {
        ServiceConfig::from_env().map_err(CliError::from)?
    } else {
        ServiceConfig::default()
    };
    config.datastore = args.datastore.into();
    config.firmware_root = args.firmware_dir.clone();
    config.dry_run = args.dry;
    Ok(config)
}

/// The PMC and target version named by the flags.
fn target_pmc(args: &FwArgs) -> Result<(PmcAccess, &str), CliError> {
    let vendor: Vendor = args
        .vendor
        .parse()
        .map_err(|e| CliError::validation(format!("{e}")))?;
    if !vendor.is_supported() {
        return Err(CliError::validation(format!("unsupported vendor: {}", args.vendor)));
    }
    let ip = args
        .ip
        .ok_or_else(|| CliError::validation("--ip is required"))?;
    let mac: MacAddr = args
        .mac
        .as_deref()
        .ok_or_else(|| CliError::validation("--mac is required"))?
        .parse()
        .map_err(|e| CliError::validation(format!("{e}")))?;
    let target = args
        .target
        .as_deref()
        .ok_or_else(|| CliError::validation("--version is required"))?;
    let credential = Credential::new(args.user.clone(), args.pass.clone());
    if !credential.is_valid() {
        return Err(CliError::validation("--user and --pass must be non-empty"));
    }
    Ok((PmcAccess::new(Pmc::new(mac, ip, vendor), credential), target))
}
