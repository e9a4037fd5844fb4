//! Service configuration
//!
//! Read from a JSON or YAML file when one is given, otherwise built from
//! defaults overlaid with environment variables. Either way the result is
//! validated before any backend is constructed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use powershelf_credentials::{CredentialStoreConfig, VaultConfig};
use powershelf_db::DbConfig;
use powershelf_firmware::FirmwareTimeouts;
use powershelf_firmware::inventory::DEFAULT_INVENTORY_INTERVAL;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

/// Default gRPC listen port.
pub const DEFAULT_PORT: u16 = 50051;

/// Default firmware artifact root, relative to the working directory.
pub const DEFAULT_FIRMWARE_ROOT: &str = "firmware";

/// Which backends hold registrations, credentials and update records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataStoreType {
    /// Vault for credentials, Postgres for everything else
    Persistent,
    /// Process-local maps, lost on restart
    #[default]
    InMemory,
}

impl DataStoreType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataStoreType::Persistent => "persistent",
            DataStoreType::InMemory => "in_memory",
        }
    }
}

impl fmt::Display for DataStoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataStoreType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "persistent" => Ok(DataStoreType::Persistent),
            "in_memory" | "inmemory" | "memory" => Ok(DataStoreType::InMemory),
            other => Err(ConfigError::invalid(format!(
                "unsupported datastore type {other:?}"
            ))),
        }
    }
}

/// Daemon settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// gRPC listen port
    pub port: u16,
    /// Backend selection
    pub datastore: DataStoreType,
    /// Postgres settings, used when persistent
    pub db: DbConfig,
    /// Vault settings, used when persistent
    pub vault: VaultConfig,
    /// Root holding `<vendor>/pmc/` artifact directories
    pub firmware_root: PathBuf,
    /// Pause between reconciliation cycles
    pub reconcile_interval_secs: u64,
    /// Pause between inventory cycles
    pub inventory_interval_secs: u64,
    /// Bound on one device step during reconciliation
    pub device_timeout_secs: u64,
    /// Bound on one record store call
    pub store_timeout_secs: u64,
    /// Bound on the live version query of a legality check
    pub query_timeout_secs: u64,
    /// Time a record may sit in one state before it is failed
    pub no_progress_timeout_secs: u64,
    /// Start with firmware uploads disabled
    pub dry_run: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let timeouts = FirmwareTimeouts::default();
        Self {
            port: DEFAULT_PORT,
            datastore: DataStoreType::default(),
            db: DbConfig::default(),
            vault: VaultConfig::default(),
            firmware_root: PathBuf::from(DEFAULT_FIRMWARE_ROOT),
            reconcile_interval_secs: powershelf_firmware::runner::DEFAULT_INTERVAL.as_secs(),
            inventory_interval_secs: DEFAULT_INVENTORY_INTERVAL.as_secs(),
            device_timeout_secs: timeouts.device.as_secs(),
            store_timeout_secs: timeouts.store.as_secs(),
            query_timeout_secs: timeouts.query.as_secs(),
            no_progress_timeout_secs: timeouts.no_progress.as_secs(),
            dry_run: false,
        }
    }
}

impl ServiceConfig {
    /// Load `path` if given, otherwise defaults plus environment, then validate.
    ///
    /// # Errors
    ///
    /// Unreadable or malformed files, bad environment values, and anything
    /// [`ServiceConfig::validate`] rejects.
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load_from_path(path).await?,
            None => Self::from_env()?,
        };
        config.validate()?;
        info!(
            datastore = %config.datastore,
            port = config.port,
            firmware_root = %config.firmware_root.display(),
            dry_run = config.dry_run,
            "loaded service configuration"
        );
        Ok(config)
    }

    /// Parse a config file. `.yaml` and `.yml` files are YAML, anything
    /// else JSON. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Read and parse failures.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let parse_error = |reason: String| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        };
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        let config = if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?
        } else {
            serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?
        };
        debug!(path = %path.display(), "parsed config file");
        Ok(config)
    }

    /// Defaults overlaid with the process environment: `PSM_*` service
    /// variables plus the `DB_*`/`PGPORT` and `VAULT_*` backend variables.
    ///
    /// # Errors
    ///
    /// Unparseable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.db = DbConfig::from_env()?;
        config.vault = VaultConfig::from_env();
        Ok(config)
    }

    /// Defaults overlaid with `PSM_*` values from `lookup`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Env`] for unparseable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &'static str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get("PSM_PORT") {
            config.port = parse_env("PSM_PORT", &raw)?;
        }
        if let Some(raw) = get("PSM_DATASTORE") {
            config.datastore = raw.parse().map_err(|_bad| ConfigError::Env {
                var: "PSM_DATASTORE",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = get("PSM_FIRMWARE_ROOT") {
            config.firmware_root = PathBuf::from(raw);
        }
        if let Some(raw) = get("PSM_RECONCILE_INTERVAL_SECS") {
            config.reconcile_interval_secs = parse_env("PSM_RECONCILE_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = get("PSM_INVENTORY_INTERVAL_SECS") {
            config.inventory_interval_secs = parse_env("PSM_INVENTORY_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = get("PSM_DRY_RUN") {
            config.dry_run = parse_env("PSM_DRY_RUN", &raw)?;
        }
        Ok(config)
    }

    /// # Errors
    ///
    /// The first invalid setting. Backend sections are only checked for the
    /// selected datastore.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::invalid("port must be non-zero"));
        }
        if self.firmware_root.as_os_str().is_empty() {
            return Err(ConfigError::invalid("firmware root is required"));
        }
        for (name, secs) in [
            ("reconcile_interval_secs", self.reconcile_interval_secs),
            ("inventory_interval_secs", self.inventory_interval_secs),
            ("device_timeout_secs", self.device_timeout_secs),
            ("store_timeout_secs", self.store_timeout_secs),
            ("query_timeout_secs", self.query_timeout_secs),
            ("no_progress_timeout_secs", self.no_progress_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::invalid(format!("{name} must be non-zero")));
            }
        }
        if self.datastore == DataStoreType::Persistent {
            self.db.validate()?;
            self.vault.validate()?;
        }
        Ok(())
    }

    /// Credential backend for the selected datastore.
    pub fn credential_store(&self) -> CredentialStoreConfig {
        match self.datastore {
            DataStoreType::Persistent => CredentialStoreConfig::Vault(self.vault.clone()),
            DataStoreType::InMemory => CredentialStoreConfig::InMemory,
        }
    }

    pub fn timeouts(&self) -> FirmwareTimeouts {
        FirmwareTimeouts {
            device: Duration::from_secs(self.device_timeout_secs),
            store: Duration::from_secs(self.store_timeout_secs),
            query: Duration::from_secs(self.query_timeout_secs),
            no_progress: Duration::from_secs(self.no_progress_timeout_secs),
        }
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn inventory_interval(&self) -> Duration {
        Duration::from_secs(self.inventory_interval_secs)
    }
}

fn parse_env<T: FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_bad| ConfigError::Env {
        var,
        value: raw.to_string(),
    })
}
