use serde::{Deserialize, Serialize};

use crate::grid::GridProjector;

/// Errors raised when an [`InterestConfig`] cannot be applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("visibility range must be finite and positive, got {0}")]
    InvalidVisibilityRange(f32),
    #[error("entities per quantum must be at least 1")]
    ZeroQuantumBudget,
}

/// Interest management tuning.
///
/// Both values can be changed at runtime through
/// [`InterestManager::reconfigure`](crate::InterestManager::reconfigure).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterestConfig {
    /// Maximum distance (world units) at which entities are relevant.
    pub visibility_range: f32,
    /// Maximum number of entities whose observer sets are rebuilt per
    /// scheduling quantum.
    pub entities_per_quantum: usize,
    /// Remote viewers (camera feeds) observe every entity instead of only
    /// player-controlled ones.
    pub remote_viewers_see_world: bool,
}

impl Default for InterestConfig {
    fn default() -> Self {
        Self {
            visibility_range: 30.0,
            entities_per_quantum: 300,
            remote_viewers_see_world: false,
        }
    }
}

impl InterestConfig {
    /// Grid cell side length. The 3x3 neighbourhood then spans roughly the
    /// visibility range.
    pub fn resolution(&self) -> f32 {
        self.visibility_range / 3.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.visibility_range.is_finite() || self.resolution() <= 0.0 {
            return Err(ConfigError::InvalidVisibilityRange(self.visibility_range));
        }
        if self.entities_per_quantum == 0 {
            return Err(ConfigError::ZeroQuantumBudget);
        }
        Ok(())
    }

    /// Projector for this configuration. Only call on a validated config.
    pub fn projector(&self) -> GridProjector {
        GridProjector::new(self.resolution())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = InterestConfig::default();
        assert_eq!(config.visibility_range, 30.0);
        assert_eq!(config.resolution(), 10.0);
        assert_eq!(config.entities_per_quantum, 300);
        assert!(!config.remote_viewers_see_world);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_range() {
        for range in [0.0, -3.0, f32::NAN, f32::INFINITY] {
            let config = InterestConfig {
                visibility_range: range,
                ..InterestConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidVisibilityRange(_))
            ));
        }
    }

    #[test]
    fn rejects_zero_budget() {
        let config = InterestConfig {
            entities_per_quantum: 0,
            ..InterestConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroQuantumBudget));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: InterestConfig =
            serde_json::from_str(r#"{ "visibility_range": 60.0 }"#).unwrap();
        assert_eq!(config.resolution(), 20.0);
        assert_eq!(config.entities_per_quantum, 300);
    }

    #[test]
    fn projector_uses_resolution() {
        let config = InterestConfig {
            visibility_range: 90.0,
            ..InterestConfig::default()
        };
        assert_eq!(config.projector().resolution(), 30.0);
    }
}
