//! Engine configuration.

/// Tunables for [`crate::LicenseLifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Mint attempts before `create` gives up with `KeyspaceExhausted`.
    pub max_mint_attempts: u32,
}

impl EngineConfig {
    /// Default number of mint attempts per `create`.
    pub const DEFAULT_MAX_MINT_ATTEMPTS: u32 = 32;
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_mint_attempts: Self::DEFAULT_MAX_MINT_ATTEMPTS,
        }
    }
}
