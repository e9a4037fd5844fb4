//! Vendor firmware repositories
//!
//! A repository is the upgrade graph for one vendor: every artifact whose
//! file name encodes a `from -> to` pair becomes one [`FirmwareUpgrade`]
//! edge. Artifact storage sits behind [`ArtifactResolver`] so deployments
//! can serve images from somewhere other than a local directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use powershelf_types::Vendor;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::version::parse_artifact_name;
use crate::{FirmwareError, FirmwareVersion, Result};

/// Directory under a vendor's artifact root that holds PMC images.
pub const PMC_ARTIFACT_DIR: &str = "pmc";

/// One entry in a vendor's artifact namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    /// File name, used to derive the upgrade edge
    pub name: String,
    /// Resolver-specific location passed back to [`ArtifactResolver::read`]
    pub location: String,
    /// Size in bytes
    pub size: u64,
    /// Directories are listed so callers can skip them explicitly
    pub is_dir: bool,
}

/// Source of firmware artifacts.
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    /// Entries in the PMC artifact namespace of `vendor`.
    async fn list(&self, vendor: Vendor) -> Result<Vec<ArtifactEntry>>;

    /// Current size of the artifact at `location`.
    async fn size(&self, location: &str) -> Result<u64>;

    /// Contents of the artifact at `location`.
    async fn read(&self, location: &str) -> Result<Vec<u8>>;
}

/// Serves artifacts from `<root>/<vendor>/pmc/`.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    /// Resolve artifacts under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory scanned for `vendor`.
    pub fn vendor_dir(&self, vendor: Vendor) -> PathBuf {
        self.root.join(vendor.artifact_dir()).join(PMC_ARTIFACT_DIR)
    }
}

#[async_trait]
impl ArtifactResolver for DirectoryResolver {
    async fn list(&self, vendor: Vendor) -> Result<Vec<ArtifactEntry>> {
        let dir = self.vendor_dir(vendor);
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(vendor = %vendor, dir = %dir.display(), "no firmware artifact directory");
                return Ok(Vec::new());
            }
            Err(e) => return Err(FirmwareError::artifact(dir, e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| FirmwareError::artifact(&dir, e))?
        {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable artifact");
                    continue;
                }
            };
            entries.push(ArtifactEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                location: path.to_string_lossy().into_owned(),
                size: metadata.len(),
                is_dir: metadata.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn size(&self, location: &str) -> Result<u64> {
        tokio::fs::metadata(location)
            .await
            .map(|m| m.len())
            .map_err(|e| FirmwareError::artifact(location, e))
    }

    async fn read(&self, location: &str) -> Result<Vec<u8>> {
        tokio::fs::read(location)
            .await
            .map_err(|e| FirmwareError::artifact(location, e))
    }
}

/// One single-step upgrade available in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareUpgrade {
    /// Version the image must be applied on
    pub from: FirmwareVersion,
    /// Version after the image is applied
    pub to: FirmwareVersion,
    /// Where the image lives
    pub location: String,
}

/// Upgrade graph for one vendor.
#[derive(Clone)]
pub struct FirmwareRepository {
    vendor: Vendor,
    upgrades: Vec<FirmwareUpgrade>,
    min_starting_version: FirmwareVersion,
    max_starting_version: FirmwareVersion,
    resolver: Arc<dyn ArtifactResolver>,
}

impl core::fmt::Debug for FirmwareRepository {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FirmwareRepository")
            .field("vendor", &self.vendor)
            .field("upgrades", &self.upgrades)
            .field("min_starting_version", &self.min_starting_version)
            .field("max_starting_version", &self.max_starting_version)
            .finish_non_exhaustive()
    }
}

impl FirmwareRepository {
    /// Scan `vendor`'s namespace in `resolver`.
    ///
    /// Directories, empty files and names that do not encode an upgrade are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Propagates listing failures from the resolver.
    pub async fn load(vendor: Vendor, resolver: Arc<dyn ArtifactResolver>) -> Result<Self> {
        let entries = resolver.list(vendor).await?;
        let mut repo = Self {
            vendor,
            upgrades: Vec::new(),
            min_starting_version: FirmwareVersion::default(),
            max_starting_version: FirmwareVersion::default(),
            resolver,
        };

        for entry in entries {
            if entry.is_dir {
                continue;
            }
            if entry.size == 0 {
                warn!(vendor = %vendor, artifact = %entry.name, "skipping empty firmware artifact");
                continue;
            }
            let Some((from, to)) = parse_artifact_name(&entry.name) else {
                debug!(vendor = %vendor, artifact = %entry.name, "not a firmware upgrade image");
                continue;
            };
            repo.add(FirmwareUpgrade {
                from,
                to,
                location: entry.location,
            });
        }

        info!(
            vendor = %vendor,
            upgrades = repo.upgrades.len(),
            min = %repo.min_starting_version,
            max = %repo.max_starting_version,
            "loaded firmware repository"
        );
        Ok(repo)
    }

    fn add(&mut self, upgrade: FirmwareUpgrade) {
        if self.upgrades.is_empty() {
            self.min_starting_version = upgrade.from;
            self.max_starting_version = upgrade.from;
        } else {
            self.min_starting_version = self.min_starting_version.min(upgrade.from);
            self.max_starting_version = self.max_starting_version.max(upgrade.from);
        }
        self.upgrades.push(upgrade);
    }

    /// Vendor this repository serves.
    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// Every upgrade edge, in artifact listing order.
    pub fn upgrades(&self) -> &[FirmwareUpgrade] {
        &self.upgrades
    }

    /// Lowest starting version across all edges.
    pub fn min_starting_version(&self) -> FirmwareVersion {
        self.min_starting_version
    }

    /// Highest starting version across all edges.
    pub fn max_starting_version(&self) -> FirmwareVersion {
        self.max_starting_version
    }

    /// Whether `version` lies within the starting range of the catalog.
    ///
    /// This is a range check only; it does not require an edge that starts
    /// at exactly `version`.
    pub fn supports_upgrade_from(&self, version: FirmwareVersion) -> bool {
        !self.upgrades.is_empty()
            && self.min_starting_version <= version
            && version <= self.max_starting_version
    }

    /// Contents of the image for `upgrade`.
    ///
    /// # Errors
    ///
    /// Returns [`FirmwareError::Artifact`] if the image cannot be read.
    pub async fn read_artifact(&self, upgrade: &FirmwareUpgrade) -> Result<Vec<u8>> {
        self.resolver.read(&upgrade.location).await
    }

    /// Size of the image for `upgrade`.
    ///
    /// # Errors
    ///
    /// Returns [`FirmwareError::Artifact`] if the image cannot be inspected.
    pub async fn artifact_size(&self, upgrade: &FirmwareUpgrade) -> Result<u64> {
        self.resolver.size(&upgrade.location).await
    }

    /// Human-readable report of the bounds and every edge.
    ///
    /// # Errors
    ///
    /// Fails if an artifact disappeared since the repository was loaded.
    pub async fn summary(&self) -> Result<String> {
        let mut out = format!(
            "Firmware Repo supports upgrading powershelves starting at PMC fw version \
             between {} to {} (inclusive)\n",
            self.min_starting_version, self.max_starting_version
        );
        for (i, upgrade) in self.upgrades.iter().enumerate() {
            let size = self.artifact_size(upgrade).await?;
            out.push_str(&format!(
                "FW Upgrade {i}: {} from {} to {} (size: {})\n",
                display_name(&upgrade.location),
                upgrade.from,
                upgrade.to,
                human_readable_size(size)
            ));
        }
        Ok(out)
    }
}

fn display_name(location: &str) -> &str {
    Path::new(location)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(location)
}

/// Format a byte count with binary units, e.g. `512 B` or `1.5 KiB`.
pub fn human_readable_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0usize;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp + 1 < PREFIXES.len() {
        div = div.saturating_mul(UNIT);
        exp = exp.saturating_add(1);
        n /= UNIT;
    }
    let prefix = PREFIXES.get(exp).copied().unwrap_or('E');
    let value = bytes as f64 / div as f64;
    format!("{value:.1} {prefix}iB")
}
