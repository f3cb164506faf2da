//! License tiers and the features they can grant.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// The license class, determining default duration, device quota and features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseTier {
    /// Short evaluation license.
    Demo,
    /// Monthly entry tier.
    Basic,
    /// Annual tier with the tooling features.
    Pro,
    /// Annual tier with support and bulk operations.
    Enterprise,
}

impl LicenseTier {
    /// All tiers, cheapest first.
    pub const ALL: [LicenseTier; 4] = [Self::Demo, Self::Basic, Self::Pro, Self::Enterprise];

    /// The token used inside license keys (`DEMO`, `BASIC`, `PRO`, `ENTERPRISE`).
    #[must_use]
    pub const fn token(&self) -> &'static str {
        match self {
            Self::Demo => "DEMO",
            Self::Basic => "BASIC",
            Self::Pro => "PRO",
            Self::Enterprise => "ENTERPRISE",
        }
    }

    /// Parses the exact key token. Lowercase or padded input is rejected.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| tier.token() == token)
    }
}

impl fmt::Display for LicenseTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for LicenseTier {
    type Err = Error;

    /// Case-insensitive parse, for operator input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(&s.trim().to_ascii_uppercase())
            .ok_or_else(|| Error::UnknownTier(s.to_string()))
    }
}

/// A feature a license can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    BasicFeatures,
    #[serde(alias = "pubg_auto_update")]
    AutoUpdate,
    #[serde(alias = "gameloop_management")]
    Management,
    RegistryTools,
    AdvancedSettings,
    PrioritySupport,
    BulkOperations,
}

impl Feature {
    /// The persisted snake_case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BasicFeatures => "basic_features",
            Self::AutoUpdate => "auto_update",
            Self::Management => "management",
            Self::RegistryTools => "registry_tools",
            Self::AdvancedSettings => "advanced_settings",
            Self::PrioritySupport => "priority_support",
            Self::BulkOperations => "bulk_operations",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [Feature; 7] = [
            Feature::BasicFeatures,
            Feature::AutoUpdate,
            Feature::Management,
            Feature::RegistryTools,
            Feature::AdvancedSettings,
            Feature::PrioritySupport,
            Feature::BulkOperations,
        ];
        ALL.into_iter()
            .find(|feature| feature.as_str() == s.trim())
            .ok_or_else(|| Error::UnknownFeature(s.to_string()))
    }
}
