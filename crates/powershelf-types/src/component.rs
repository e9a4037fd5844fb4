use std::fmt;
use std::str::FromStr;

use powershelf_errors::ValidationError;
use serde::{Deserialize, Serialize};

/// Firmware-bearing component of a power shelf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Component {
    /// The power management controller itself
    Pmc,
    /// A power supply unit behind the PMC
    Psu,
}

impl Component {
    pub fn as_str(self) -> &'static str {
        match self {
            Component::Pmc => "PMC",
            Component::Psu => "PSU",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PMC" => Ok(Component::Pmc),
            "PSU" => Ok(Component::Psu),
            _ => Err(ValidationError::unsupported("component", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() -> Result<(), ValidationError> {
        for c in [Component::Pmc, Component::Psu] {
            assert_eq!(c.to_string().parse::<Component>()?, c);
        }
        assert_eq!("pmc".parse::<Component>()?, Component::Pmc);
        assert!("fan".parse::<Component>().is_err());
        Ok(())
    }
}
