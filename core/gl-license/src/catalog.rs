//! Entitlement defaults per tier.

use gl_types::{Feature, LicenseTier};

use crate::error::LicenseResult;

/// What a tier grants when no override is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlementDefaults {
    pub tier: LicenseTier,
    pub duration_days: u32,
    pub max_devices: u32,
    pub features: &'static [Feature],
}

const DEMO_FEATURES: &[Feature] = &[Feature::BasicFeatures];

const BASIC_FEATURES: &[Feature] = &[Feature::AutoUpdate, Feature::Management];

const PRO_FEATURES: &[Feature] = &[
    Feature::AutoUpdate,
    Feature::Management,
    Feature::RegistryTools,
    Feature::AdvancedSettings,
];

const ENTERPRISE_FEATURES: &[Feature] = &[
    Feature::AutoUpdate,
    Feature::Management,
    Feature::RegistryTools,
    Feature::AdvancedSettings,
    Feature::PrioritySupport,
    Feature::BulkOperations,
];

/// Returns the defaults for `tier`.
#[must_use]
pub const fn entitlements(tier: LicenseTier) -> EntitlementDefaults {
    let (duration_days, max_devices, features) = match tier {
        LicenseTier::Demo => (7, 1, DEMO_FEATURES),
        LicenseTier::Basic => (30, 3, BASIC_FEATURES),
        LicenseTier::Pro => (365, 5, PRO_FEATURES),
        LicenseTier::Enterprise => (365, 10, ENTERPRISE_FEATURES),
    };
    EntitlementDefaults {
        tier,
        duration_days,
        max_devices,
        features,
    }
}

/// Looks up the defaults for an exact tier token (`"PRO"`).
///
/// Tokens are normally checked by the key codec first; this repeats the
/// check for callers that come in with a raw string.
pub fn entitlements_for_token(token: &str) -> LicenseResult<EntitlementDefaults> {
    let tier = LicenseTier::from_token(token)
        .ok_or_else(|| crate::LicenseError::UnknownTier(token.to_string()))?;
    Ok(entitlements(tier))
}
