//! Engine configuration.

use skein_core::Settings;

/// Configuration for constructing an [`Engine`](crate::Engine).
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Seed for the engine's random generator. The same seed, level, and
    /// schedule reproduce the same simulation.
    pub seed: u64,
    /// Tunable simulation settings.
    pub settings: Settings,
}

impl EngineConfig {
    /// A configuration with the given seed and default settings.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            settings: Settings::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_seed_keeps_default_settings() {
        let cfg = EngineConfig::with_seed(42);
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.settings, Settings::default());
    }
}
