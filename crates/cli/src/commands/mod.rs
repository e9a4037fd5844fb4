//! Command implementations for psmctl

pub mod firmware;

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use powershelf_service::DataStoreType;

/// What `fw` should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum FwAction {
    /// Print every vendor's repository and rule
    Summary,
    /// Report whether the PMC may be upgraded to --version
    CanUpgrade,
    /// Queue an upgrade to --version
    Upgrade,
}

/// Backend selection accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum DataStoreArg {
    InMemory,
    Persistent,
}

impl From<DataStoreArg> for DataStoreType {
    fn from(arg: DataStoreArg) -> Self {
        match arg {
            DataStoreArg::InMemory => DataStoreType::InMemory,
            DataStoreArg::Persistent => DataStoreType::Persistent,
        }
    }
}

#[derive(Debug, Args)]
pub struct FwArgs {
    /// Action to perform
    #[arg(short, long, value_enum)]
    pub action: FwAction,

    /// PMC vendor, e.g. liteon
    #[arg(long, default_value = "liteon")]
    pub vendor: String,

    /// PMC IP address
    #[arg(short, long)]
    pub ip: Option<IpAddr>,

    /// PMC MAC address; identifies the upgrade record
    #[arg(short, long)]
    pub mac: Option<String>,

    /// PMC username
    #[arg(short, long, default_value = "root")]
    pub user: String,

    /// PMC password
    #[arg(
        short,
        long,
        env = "PSMCTL_PMC_PASSWORD",
        default_value = "0penBmc",
        hide_env_values = true
    )]
    pub pass: String,

    /// Target firmware version
    #[arg(long = "version", value_name = "VERSION")]
    pub target: Option<String>,

    /// Read the image but skip the upload. Pass `--dry false` to upgrade for real.
    #[arg(short, long, default_value_t = true, action = clap::ArgAction::Set)]
    pub dry: bool,

    /// Where registrations and upgrade records live
    #[arg(long, value_enum, default_value = "in_memory")]
    pub datastore: DataStoreArg,

    /// Firmware artifact root holding `<vendor>/pmc/`
    #[arg(long, env = "PSM_FIRMWARE_ROOT", default_value = "firmware")]
    pub firmware_dir: PathBuf,
}
