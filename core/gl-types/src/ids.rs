//! Identifier types used throughout the license engine.
//!
//! Both identifiers are opaque strings on the wire. Format rules for license
//! keys (prefix, tier, checksum) are enforced by the key codec in
//! `gl-license`, not here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A license key string, e.g. `GL-PRO-2025-ABCD-EFGH-1A2B`.
///
/// Constructing a `LicenseKey` does not validate it. Keys loaded from a
/// persisted document or minted by the codec are trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseKey(String);

impl LicenseKey {
    /// Wraps a raw key string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the raw string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LicenseKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a physical or virtual device bound to a license.
///
/// Clients usually send a hardware fingerprint such as
/// `HWID-1A2B3C4D-...`; the engine only requires it to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Parses a device identifier, trimming surrounding whitespace.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidDeviceId(s.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Builds a hardware identifier, `HWID-` followed by the dash-joined
    /// groups. Never empty, so it cannot fail.
    #[must_use]
    pub fn hardware(groups: &[&str]) -> Self {
        let mut id = String::from("HWID");
        for group in groups {
            id.push('-');
            id.push_str(group.trim());
        }
        Self(id)
    }

    /// Returns the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
