//! Temporary firmware artifact trees.
//!
//! Files land at `<root>/<vendor>/pmc/cm14mp1r-r<from>_to_r<to>.tar`, the
//! same layout the repository scanner reads in production.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use powershelf_types::Vendor;
use tempfile::TempDir;

/// A firmware root in a temporary directory, removed on drop.
#[derive(Debug)]
pub struct ArtifactTree {
    dir: TempDir,
}

impl ArtifactTree {
    /// Empty root with no vendor directories.
    pub fn empty() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// A Liteon tree with one image per `(from, to)` edge.
    pub fn liteon(edges: &[(&str, &str)]) -> io::Result<Self> {
        let tree = Self::empty()?;
        for (from, to) in edges {
            tree.write_file(
                Vendor::Liteon,
                &format!("cm14mp1r-r{from}_to_r{to}.tar"),
                &Self::image_bytes(from, to),
            )?;
        }
        Ok(tree)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// `<root>/<vendor>/pmc`
    pub fn pmc_dir(&self, vendor: Vendor) -> PathBuf {
        self.root().join(vendor.artifact_dir()).join("pmc")
    }

    /// Write `bytes` to `name` in the vendor's PMC directory.
    pub fn write_file(&self, vendor: Vendor, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let dir = self.pmc_dir(vendor);
        fs::create_dir_all(&dir)?;
        let path = dir.join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Remove `name` from the vendor's PMC directory.
    pub fn remove_file(&self, vendor: Vendor, name: &str) -> io::Result<()> {
        fs::remove_file(self.pmc_dir(vendor).join(name))
    }

    /// Content written for the `from -> to` image.
    pub fn image_bytes(from: &str, to: &str) -> Vec<u8> {
        format!("firmware image {from} -> {to}").into_bytes()
    }
}
