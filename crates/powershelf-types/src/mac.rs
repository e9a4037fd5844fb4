use std::fmt;
use std::str::FromStr;

use powershelf_errors::ValidationError;
use serde::{Deserialize, Serialize};

/// A PMC hardware address in EUI-48 form.
///
/// Accepts `00:11:22:33:44:55`, `00-11-22-33-44-55`, `0011.2233.4455` and the
/// bare 12 hex digit form. Always renders lowercase and colon separated, which
/// matches what Postgres returns for a `macaddr` column.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddr(macaddr::MacAddr6);

impl MacAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        let [a, b, c, d, e, f] = bytes;
        Self(macaddr::MacAddr6::new(a, b, c, d, e, f))
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0.into_array()
    }
}

impl FromStr for MacAddr {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() == 12 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            let mut bytes = [0u8; 6];
            for (slot, pair) in bytes.iter_mut().zip(trimmed.as_bytes().chunks(2)) {
                let pair = std::str::from_utf8(pair)
                    .map_err(|_utf8| ValidationError::invalid_format("mac_address", s))?;
                *slot = u8::from_str_radix(pair, 16)
                    .map_err(|_radix| ValidationError::invalid_format("mac_address", s))?;
            }
            return Ok(Self::new(bytes));
        }

        trimmed
            .parse::<macaddr::MacAddr6>()
            .map(Self)
            .map_err(|_parse| ValidationError::invalid_format("mac_address", s))
    }
}

impl TryFrom<String> for MacAddr {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddr> for String {
    fn from(mac: MacAddr) -> Self {
        mac.to_string()
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.octets();
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddr({self})")
    }
}
