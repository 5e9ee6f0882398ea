pub mod catalog;
pub mod client;
pub mod frame;

use crate::error::InvalidSerial;

/// Serial number of the inverter's WiFi/LAN module. This doubles as the
/// protocol's authentication token: the query frame embeds it and the module
/// ignores requests carrying the wrong one.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Serial(u32);

impl Serial {
    pub fn new(value: u32) -> Result<Self, InvalidSerial> {
        if value == 0 {
            return Err(InvalidSerial::OutOfRange);
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl std::str::FromStr for Serial {
    type Err = InvalidSerial;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(InvalidSerial::Empty);
        }
        let value: u64 = s
            .parse()
            .map_err(|_| InvalidSerial::NotNumeric(s.to_string()))?;
        let value = u32::try_from(value).map_err(|_| InvalidSerial::OutOfRange)?;
        Self::new(value)
    }
}

impl std::fmt::Display for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for Serial {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
