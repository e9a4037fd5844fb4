//! Repository bounds and legality over generated artifact listings.

use std::sync::Arc;

use async_trait::async_trait;
use powershelf_firmware::repository::ArtifactEntry;
use powershelf_firmware::version::artifact_name;
use powershelf_firmware::{
    ArtifactResolver, FirmwareError, FirmwareRepository, FirmwareUpdater, FirmwareVersion,
};
use powershelf_types::Vendor;
use proptest::prelude::*;

/// Listing fixed at construction; reads are never expected.
struct StaticResolver(Vec<ArtifactEntry>);

#[async_trait]
impl ArtifactResolver for StaticResolver {
    async fn list(&self, _vendor: Vendor) -> powershelf_firmware::Result<Vec<ArtifactEntry>> {
        Ok(self.0.clone())
    }

    async fn size(&self, location: &str) -> powershelf_firmware::Result<u64> {
        self.0
            .iter()
            .find(|e| e.location == location)
            .map(|e| e.size)
            .ok_or(FirmwareError::Decode(format!("no artifact at {location}")))
    }

    async fn read(&self, location: &str) -> powershelf_firmware::Result<Vec<u8>> {
        Err(FirmwareError::Decode(format!("unexpected read of {location}")))
    }
}

fn file(name: String, size: u64) -> ArtifactEntry {
    ArtifactEntry {
        location: format!("mem://{name}"),
        name,
        size,
        is_dir: false,
    }
}

fn load(entries: Vec<ArtifactEntry>) -> Result<FirmwareRepository, TestCaseError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| TestCaseError::fail(e.to_string()))?;
    rt.block_on(FirmwareRepository::load(
        Vendor::Liteon,
        Arc::new(StaticResolver(entries)),
    ))
    .map_err(|e| TestCaseError::fail(e.to_string()))
}

fn version() -> impl Strategy<Value = FirmwareVersion> {
    (0u32..4, 0u32..4, 0u32..4).prop_map(|(a, b, c)| FirmwareVersion::new(a, b, c))
}

proptest! {
    #[test]
    fn bounds_are_min_and_max_of_sources(
        edges in prop::collection::vec((version(), version()), 1..12)
    ) {
        let entries = edges
            .iter()
            .map(|(from, to)| file(artifact_name(*from, *to), 16))
            .collect();
        let repo = load(entries)?;

        let min = edges.iter().map(|(from, _)| *from).min();
        let max = edges.iter().map(|(from, _)| *from).max();
        prop_assert_eq!(Some(repo.min_starting_version()), min);
        prop_assert_eq!(Some(repo.max_starting_version()), max);
        prop_assert_eq!(repo.upgrades().len(), edges.len());
        for (from, _) in &edges {
            prop_assert!(repo.supports_upgrade_from(*from));
        }
    }

    #[test]
    fn unparseable_names_yield_empty_repo(
        names in prop::collection::vec("[a-z0-9_.-]{0,24}", 0..8)
    ) {
        let entries = names
            .into_iter()
            .filter(|n| !n.starts_with("cm14mp1r-"))
            .map(|n| file(n, 16))
            .collect();
        let repo = load(entries)?;

        prop_assert!(repo.upgrades().is_empty());
        prop_assert_eq!(repo.min_starting_version(), FirmwareVersion::default());
        prop_assert_eq!(repo.max_starting_version(), FirmwareVersion::default());
        prop_assert!(!repo.supports_upgrade_from(FirmwareVersion::default()));
    }

    #[test]
    fn empty_images_are_ignored(from in version(), to in version()) {
        let repo = load(vec![file(artifact_name(from, to), 0)])?;
        prop_assert!(repo.upgrades().is_empty());
    }

    #[test]
    fn direct_rule_only_allows_listed_sources(
        edges in prop::collection::vec((version(), version()), 1..8),
        current in version(),
        target in version(),
    ) {
        let entries = edges
            .iter()
            .map(|(from, to)| file(artifact_name(*from, *to), 16))
            .collect();
        let repo = load(entries)?;
        let rule = powershelf_firmware::rule::rule_for(Vendor::Liteon)
            .ok_or_else(|| TestCaseError::fail("no Liteon rule"))?;
        let updater = FirmwareUpdater::new(repo, rule);

        let listed = edges.iter().any(|(from, to)| *from == current && *to == target);
        prop_assert_eq!(updater.can_update(current, target), listed);
    }
}
