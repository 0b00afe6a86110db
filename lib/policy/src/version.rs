use std::fmt::{Display, Formatter, Result as FResult};
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A `"MAJOR.MINOR"` version number, parsed once at the boundary and compared
/// numerically everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionNumber {
    pub major: u32,
    pub minor: u32,
}

impl VersionNumber {
    pub const fn new(major: u32, minor: u32) -> Self { Self { major, minor } }

    /// Lenient parse for caller-supplied values: a bare `"2"` means `"2.0"`,
    /// extra dotted segments are ignored. Returns `None` when the leading
    /// segments are not numeric; callers decide the fallback.
    pub fn parse_loose(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.');
        let major = parts.next()?.parse::<u32>().ok()?;
        let minor = match parts.next() {
            Some(minor) => minor.parse::<u32>().ok()?,
            None => 0,
        };
        Some(Self { major, minor })
    }

    pub const fn bump_minor(&self) -> Self { Self { major: self.major, minor: self.minor + 1 } }

    pub const fn bump_major(&self) -> Self { Self { major: self.major + 1, minor: 0 } }
}

impl Display for VersionNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult { write!(f, "{}.{}", self.major, self.minor) }
}

impl FromStr for VersionNumber {
    type Err = String;

    /// Strict parse for stored values, which always match `^\d+\.\d+$`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s.split_once('.').ok_or_else(|| format!("'{s}' is not a MAJOR.MINOR version number"))?;
        if major.is_empty() || minor.is_empty() || !major.bytes().all(|b| b.is_ascii_digit()) || !minor.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("'{s}' is not a MAJOR.MINOR version number"));
        }
        let major = major.parse::<u32>().map_err(|err| format!("major part of '{s}' out of range: {err}"))?;
        let minor = minor.parse::<u32>().map_err(|err| format!("minor part of '{s}' out of range: {err}"))?;
        Ok(Self { major, minor })
    }
}

impl Serialize for VersionNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> { serializer.serialize_str(&self.to_string()) }
}

impl<'de> Deserialize<'de> for VersionNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_str(&raw).map_err(D::Error::custom)
    }
}
