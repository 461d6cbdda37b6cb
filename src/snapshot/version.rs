//! Snapshot format version and compatibility policy

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ExchangeError;

/// Format version written by this build
pub const FORMAT_VERSION: FormatVersion = FormatVersion {
    major: 1,
    minor: 0,
    patch: 0,
};

/// A `MAJOR.MINOR.PATCH` format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormatVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

/// How a document's version relates to this build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    /// Same major, minor not newer
    Native,
    /// Same major, newer minor: readable, unknown fields are ignored
    NewerMinor,
    /// Older major: readable as is
    OlderMajor,
    /// Newer major: must be rejected
    Incompatible,
}

impl FormatVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Classify a document version against the one this build writes
    pub fn compatibility(&self) -> Compatibility {
        use std::cmp::Ordering;

        match self.major.cmp(&FORMAT_VERSION.major) {
            Ordering::Greater => Compatibility::Incompatible,
            Ordering::Less => Compatibility::OlderMajor,
            Ordering::Equal if self.minor > FORMAT_VERSION.minor => Compatibility::NewerMinor,
            Ordering::Equal => Compatibility::Native,
        }
    }
}

impl FromStr for FormatVersion {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ExchangeError::malformed(format!("Invalid format_version '{}'", s));

        // Pre-release and build suffixes do not affect compatibility
        let core = s.trim().split(['-', '+']).next().unwrap_or_default();
        let mut parts = core.split('.');

        let mut next = |required: bool| -> Result<u64, ExchangeError> {
            match parts.next() {
                Some(p) => p.parse().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };

        let major = next(true)?;
        let minor = next(false)?;
        let patch = next(false)?;

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
