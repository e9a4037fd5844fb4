use std::fmt;
use std::str::FromStr;

use powershelf_errors::ValidationError;
use serde::{Deserialize, Serialize};

/// PMC vendor. The discriminant is the vendor code stored by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum Vendor {
    Unsupported = 0,
    Liteon = 1,
}

impl Vendor {
    const SUPPORTED: [Vendor; 1] = [Vendor::Liteon];

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Unknown codes map to [`Vendor::Unsupported`].
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Vendor::Liteon,
            _ => Vendor::Unsupported,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Vendor::Unsupported => "Unsupported",
            Vendor::Liteon => "Liteon",
        }
    }

    pub fn is_supported(self) -> bool {
        self != Vendor::Unsupported
    }

    pub fn supported() -> impl Iterator<Item = Vendor> {
        Self::SUPPORTED.into_iter()
    }

    /// Directory name under the artifact root holding this vendor's firmware.
    pub fn artifact_dir(self) -> String {
        self.name().to_ascii_lowercase()
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Vendor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::supported()
            .find(|v| v.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::unsupported("vendor", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        assert_eq!(Vendor::Liteon.code(), 1);
        assert_eq!(Vendor::from_code(1), Vendor::Liteon);
        assert_eq!(Vendor::from_code(0), Vendor::Unsupported);
        assert_eq!(Vendor::from_code(42), Vendor::Unsupported);
    }

    #[test]
    fn parses_case_insensitively() -> Result<(), ValidationError> {
        assert_eq!("liteon".parse::<Vendor>()?, Vendor::Liteon);
        assert_eq!("LITEON".parse::<Vendor>()?, Vendor::Liteon);
        assert_eq!(
            "acme".parse::<Vendor>(),
            Err(ValidationError::unsupported("vendor", "acme"))
        );
        // Unsupported is a sentinel, never a parse result
        assert!("unsupported".parse::<Vendor>().is_err());
        Ok(())
    }

    #[test]
    fn artifact_dir_is_lowercase_name() {
        assert_eq!(Vendor::Liteon.artifact_dir(), "liteon");
        assert_eq!(Vendor::supported().collect::<Vec<_>>(), vec![Vendor::Liteon]);
        assert!(!Vendor::Unsupported.is_supported());
    }
}
