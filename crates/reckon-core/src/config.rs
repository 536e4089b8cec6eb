//! Registry configuration
//!
//! Controls how the registry guards its dependency graph and how long a
//! default tick is. Deserializable so it can live next to value definitions
//! in a RON document.

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::ValueRegistry`]
///
/// # Example
///
/// ```
/// use reckon_core::RegistryConfig;
///
/// let config = RegistryConfig::default();
/// assert!(config.reject_cycles());
/// assert_eq!(config.default_dt(), 1.0);
///
/// let config = RegistryConfig::default().with_default_dt(0.25);
/// assert_eq!(config.default_dt(), 0.25);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Refuse registrations that would close a dependency cycle
    reject_cycles: bool,
    /// Time step used by [`crate::ValueRegistry::step`]
    ///
    /// Non-finite or negative values fall back to `1.0`.
    default_dt: f64,
}

impl RegistryConfig {
    /// Whether cyclic registrations are refused
    pub fn reject_cycles(&self) -> bool {
        self.reject_cycles
    }

    /// Set whether cyclic registrations are refused
    ///
    /// With this off, invalidation still terminates and reads of a value
    /// that depends on itself fail with [`crate::Error::EvaluationCycle`].
    pub fn with_reject_cycles(mut self, reject: bool) -> Self {
        self.reject_cycles = reject;
        self
    }

    /// Time step for [`crate::ValueRegistry::step`]
    pub fn default_dt(&self) -> f64 {
        if self.default_dt.is_finite() && self.default_dt >= 0.0 {
            self.default_dt
        } else {
            1.0
        }
    }

    /// Set the time step for [`crate::ValueRegistry::step`]
    pub fn with_default_dt(mut self, dt: f64) -> Self {
        self.default_dt = dt;
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reject_cycles: true,
            default_dt: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_dt_falls_back() {
        assert_eq!(RegistryConfig::default().with_default_dt(f64::NAN).default_dt(), 1.0);
        assert_eq!(RegistryConfig::default().with_default_dt(-2.0).default_dt(), 1.0);
        assert_eq!(RegistryConfig::default().with_default_dt(0.0).default_dt(), 0.0);
    }

    #[test]
    fn test_config_ron() {
        let config: RegistryConfig = ron::from_str("(default_dt: 0.5)").unwrap();
        assert!(config.reject_cycles());
        assert_eq!(config.default_dt(), 0.5);

        let config: RegistryConfig = ron::from_str("(reject_cycles: false)").unwrap();
        assert!(!config.reject_cycles());
        assert_eq!(config.default_dt(), 1.0);
    }
}
