//! PMC firmware versions and the artifact file names that encode them.

use core::fmt;
use std::str::FromStr;

use powershelf_errors::ValidationError;
use serde::{Deserialize, Serialize};

/// File name prefix of Liteon PMC firmware images.
pub const ARTIFACT_PREFIX: &str = "cm14mp1r-";

const ARTIFACT_SUFFIX: &str = ".tar";
const EDGE_SEPARATOR: &str = "_to_";

/// A `major.minor.patch` firmware version.
///
/// Ordering is lexicographic on the triple, which is what the derived
/// `Ord` gives for this field order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct FirmwareVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch version
    pub patch: u32,
}

impl FirmwareVersion {
    /// Create a version from its parts.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Accepts `1.3.7` and the device-reported form `r1.3.7`.
impl FromStr for FirmwareVersion {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::invalid_format("version", s);
        let trimmed = s.trim();
        let body = trimmed.strip_prefix('r').unwrap_or(trimmed);

        let mut parts = body.split('.');
        let mut next = || -> Result<u32, ValidationError> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_e: std::num::ParseIntError| invalid())
        };
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl TryFrom<String> for FirmwareVersion {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FirmwareVersion> for String {
    fn from(version: FirmwareVersion) -> Self {
        version.to_string()
    }
}

/// File name of the image that upgrades `from` to `to`.
pub fn artifact_name(from: FirmwareVersion, to: FirmwareVersion) -> String {
    format!("{ARTIFACT_PREFIX}r{from}{EDGE_SEPARATOR}r{to}{ARTIFACT_SUFFIX}")
}

/// Parse `cm14mp1r-rA.B.C_to_rD.E.F.tar` into its `(from, to)` pair.
///
/// Returns `None` for anything else; auxiliary files in an artifact
/// directory are expected and simply ignored.
pub fn parse_artifact_name(name: &str) -> Option<(FirmwareVersion, FirmwareVersion)> {
    let body = name
        .strip_prefix(ARTIFACT_PREFIX)?
        .strip_suffix(ARTIFACT_SUFFIX)?;
    let (from, to) = body.split_once(EDGE_SEPARATOR)?;
    if !from.starts_with('r') || !to.starts_with('r') {
        return None;
    }
    Some((from.parse().ok()?, to.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_parse_with_and_without_prefix() -> TestResult {
        let plain: FirmwareVersion = "1.3.7".parse()?;
        let prefixed: FirmwareVersion = "r1.3.7".parse()?;
        assert_eq!(plain, prefixed);
        assert_eq!(plain, FirmwareVersion::new(1, 3, 7));
        assert_eq!(plain.to_string(), "1.3.7");
        Ok(())
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "1.2", "1.2.3.4", "a.b.c", "1..3", "r", "1.2.-3", "v1.2.3", "1.2.3 beta"] {
            assert!(bad.parse::<FirmwareVersion>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = FirmwareVersion::new(1, 2, 9);
        let b = FirmwareVersion::new(1, 3, 0);
        let c = FirmwareVersion::new(2, 0, 0);
        assert!(a < b && b < c);
        assert_eq!(a.cmp(&a), core::cmp::Ordering::Equal);
    }

    #[test]
    fn test_artifact_name() -> TestResult {
        let name = "cm14mp1r-r1.2.0_to_r1.3.0.tar";
        let (from, to) = parse_artifact_name(name).ok_or("expected a match")?;
        assert_eq!(from, FirmwareVersion::new(1, 2, 0));
        assert_eq!(to, FirmwareVersion::new(1, 3, 0));
        assert_eq!(artifact_name(from, to), name);
        Ok(())
    }

    #[test]
    fn test_artifact_name_mismatches() {
        for name in [
            "README.md",
            "cm14mp1r-r1.2.0_to_r1.3.0.tar.sig",
            "cm14mp1r-1.2.0_to_1.3.0.tar",
            "other-r1.2.0_to_r1.3.0.tar",
            "cm14mp1r-r1.2_to_r1.3.0.tar",
        ] {
            assert!(parse_artifact_name(name).is_none(), "{name} should be skipped");
        }
    }

    #[test]
    fn test_string_conversions() -> TestResult {
        let version = FirmwareVersion::try_from(String::from("r4.0.12"))?;
        assert_eq!(String::from(version), "4.0.12");
        Ok(())
    }

    fn version() -> impl Strategy<Value = FirmwareVersion> {
        (0u32..50, 0u32..50, 0u32..50).prop_map(|(a, b, c)| FirmwareVersion::new(a, b, c))
    }

    proptest! {
        #[test]
        fn prop_display_round_trips(v in version()) {
            prop_assert_eq!(v.to_string().parse::<FirmwareVersion>().ok(), Some(v));
        }

        #[test]
        fn prop_total_order(a in version(), b in version()) {
            let lt = a < b;
            let gt = a > b;
            if a == b {
                prop_assert!(!lt && !gt);
            } else {
                prop_assert!(lt ^ gt);
            }
        }

        #[test]
        fn prop_artifact_names_round_trip(a in version(), b in version()) {
            prop_assert_eq!(parse_artifact_name(&artifact_name(a, b)), Some((a, b)));
        }
    }
}
