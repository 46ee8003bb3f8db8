//! Refresh configuration
//!
//! Tunables for the pull model, the commit/cancel heuristic and the loading
//! and reset animations. Every field has a default, so a TOML file only needs
//! to name what it changes.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which edge of the list the user pulls from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullDirection {
    /// Pull down past the top of the list
    #[default]
    TopDown,
    /// Pull up past the bottom of the list
    BottomUp,
}

impl PullDirection {
    /// +1 for top-down, -1 for bottom-up
    pub fn sign(self) -> f32 {
        match self {
            PullDirection::TopDown => 1.0,
            PullDirection::BottomUp => -1.0,
        }
    }
}

/// Configuration for pull-to-refresh behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfiguration {
    /// Edge the gesture starts from
    pub direction: PullDirection,
    /// Distance in logical pixels the icon travels before a pull counts as complete
    pub max_pulled_distance: f32,
    /// Upper bound of the icon rotation while pulling
    pub max_rotation_degrees: f32,
    /// Pull distance at which opacity and offset reach their maximum
    pub pull_threshold: f32,
    /// Degrees of rotation per pixel pulled
    pub degree_multiplier: f32,
    /// Longest gap between "pulled to max" and "restored" that still commits
    pub commit_cancel_window_ms: u64,
    /// Pause before the rotation hands over to the loading spin
    pub settle_delay_ms: u64,
    /// Duration of one loading spin turn
    pub spin_period_ms: u32,
    /// Duration of the fade-out and collapse after a refresh
    pub reset_duration_ms: u32,
    /// How close the icon offset must be to the maximum to count as reached
    pub max_offset_tolerance: f32,
    /// Icon offset at or below which the list counts as restored
    pub restored_threshold: f32,
}

impl Default for RefreshConfiguration {
    fn default() -> Self {
        Self {
            direction: PullDirection::TopDown,
            max_pulled_distance: 36.0,
            max_rotation_degrees: 400.0,
            pull_threshold: 44.0,
            degree_multiplier: 10.0,
            commit_cancel_window_ms: 250,
            settle_delay_ms: 100,
            spin_period_ms: 1200,
            reset_duration_ms: 250,
            max_offset_tolerance: 0.01,
            restored_threshold: 1.0,
        }
    }
}

impl RefreshConfiguration {
    /// Default configuration for the given pull direction
    pub fn for_direction(direction: PullDirection) -> Self {
        Self {
            direction,
            ..Default::default()
        }
    }

    pub fn with_direction(mut self, direction: PullDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_commit_cancel_window_ms(mut self, window_ms: u64) -> Self {
        self.commit_cancel_window_ms = window_ms;
        self
    }

    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Reject values the pull model cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &str, value: f32) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number, got {value}"
                )))
            }
        }

        positive("max_pulled_distance", self.max_pulled_distance)?;
        positive("max_rotation_degrees", self.max_rotation_degrees)?;
        positive("pull_threshold", self.pull_threshold)?;
        positive("degree_multiplier", self.degree_multiplier)?;
        positive("max_offset_tolerance", self.max_offset_tolerance)?;

        if !self.restored_threshold.is_finite() || self.restored_threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "restored_threshold must not be negative, got {}",
                self.restored_threshold
            )));
        }
        if self.restored_threshold >= self.max_pulled_distance {
            return Err(ConfigError::Invalid(
                "restored_threshold must be below max_pulled_distance".to_string(),
            ));
        }
        if self.spin_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "spin_period_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Signed icon offset at full pull
    pub fn max_pulled_offset_y(&self) -> f32 {
        self.max_pulled_distance * self.direction.sign()
    }

    pub fn commit_cancel_window(&self) -> Duration {
        Duration::from_millis(self.commit_cancel_window_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RefreshConfiguration::default();
        assert_eq!(config.direction, PullDirection::TopDown);
        assert_eq!(config.max_pulled_distance, 36.0);
        assert_eq!(config.max_rotation_degrees, 400.0);
        assert_eq!(config.pull_threshold, 44.0);
        assert_eq!(config.commit_cancel_window(), Duration::from_millis(250));
        assert_eq!(config.settle_delay(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RefreshConfiguration::from_toml_str(
            r#"
            direction = "bottom_up"
            max_pulled_distance = 48.0
            "#,
        )
        .unwrap();

        assert_eq!(config.direction, PullDirection::BottomUp);
        assert_eq!(config.max_pulled_distance, 48.0);
        assert_eq!(config.pull_threshold, 44.0);
        assert_eq!(config.max_pulled_offset_y(), -48.0);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RefreshConfiguration::for_direction(PullDirection::BottomUp)
            .with_commit_cancel_window_ms(300);
        let text = config.to_toml_string().unwrap();
        assert_eq!(RefreshConfiguration::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let err = RefreshConfiguration::from_toml_str("pull_threshold = 0.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("pull_threshold")));
    }

    #[test]
    fn test_rejects_unknown_direction() {
        let err = RefreshConfiguration::from_toml_str(r#"direction = "sideways""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = RefreshConfiguration::from_path(Path::new("/definitely/not/here.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
