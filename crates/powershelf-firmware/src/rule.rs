//! Vendor upgrade policies.

use powershelf_types::Vendor;

use crate::{FirmwareUpgrade, FirmwareVersion};

/// Decides whether a repository edge may be applied to a device.
pub trait UpgradeRule: Send + Sync {
    /// Whether `upgrade` may be applied on a device running `current`.
    fn is_allowed(&self, current: FirmwareVersion, upgrade: &FirmwareUpgrade) -> bool;

    /// One-line description for operator summaries.
    fn summary(&self) -> String;
}

/// Liteon PMCs only accept an image built for their exact running version.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectUpgradeRule;

impl UpgradeRule for DirectUpgradeRule {
    fn is_allowed(&self, current: FirmwareVersion, upgrade: &FirmwareUpgrade) -> bool {
        current == upgrade.from
    }

    fn summary(&self) -> String {
        "Liteon upgrade rule: only direct upgrades supported".to_string()
    }
}

/// The rule used for `vendor`, if upgrades are supported at all.
pub fn rule_for(vendor: Vendor) -> Option<Box<dyn UpgradeRule>> {
    match vendor {
        Vendor::Liteon => Some(Box::new(DirectUpgradeRule)),
        Vendor::Unsupported => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(from: FirmwareVersion, to: FirmwareVersion) -> FirmwareUpgrade {
        FirmwareUpgrade {
            from,
            to,
            location: String::new(),
        }
    }

    #[test]
    fn test_direct_rule_requires_exact_start() {
        let rule = DirectUpgradeRule;
        let upgrade = edge(FirmwareVersion::new(1, 2, 0), FirmwareVersion::new(1, 3, 0));
        assert!(rule.is_allowed(FirmwareVersion::new(1, 2, 0), &upgrade));
        assert!(!rule.is_allowed(FirmwareVersion::new(1, 1, 0), &upgrade));
        assert!(!rule.is_allowed(FirmwareVersion::new(1, 3, 0), &upgrade));
    }

    #[test]
    fn test_rule_lookup() {
        assert!(rule_for(Vendor::Liteon).is_some());
        assert!(rule_for(Vendor::Unsupported).is_none());
    }
}
