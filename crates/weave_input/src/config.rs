//! Gesture thresholds and timeouts.

use crate::error::InputError;
use crate::{
    DEFAULT_DOUBLE_TAP_MS, DEFAULT_LONG_PRESS_MS, DEFAULT_PAN_THRESHOLD, DEFAULT_TAP_MAX_DISTANCE,
    DEFAULT_TAP_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};
use weave_core::DEFAULT_THROTTLE_MS;

/// Gesture recognizer configuration.
///
/// Distances are screen pixels, times are milliseconds, velocities are
/// pixels per millisecond.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Longest press that still counts as a tap.
    pub tap_timeout_ms: f64,
    /// Window in which a second tap makes a double tap.
    pub double_tap_timeout_ms: f64,
    /// Hold duration before a long press fires.
    pub long_press_timeout_ms: f64,
    /// Movement allowed before a tap/long press candidate is abandoned.
    pub tap_max_distance: f64,
    /// Movement required before a pan starts.
    pub pan_threshold: f64,
    /// Total pan distance required for a swipe.
    pub swipe_threshold: f64,
    /// Release speed required for a swipe.
    pub swipe_min_velocity: f64,
    /// Relative change of finger distance that starts a pinch (0.1 = 10%).
    pub pinch_threshold: f64,
    /// Minimum interval between continuous updates on one gesture channel.
    pub throttle_ms: f64,
    /// Time window of samples used for release velocity.
    pub velocity_window_ms: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            tap_timeout_ms: DEFAULT_TAP_TIMEOUT_MS,
            double_tap_timeout_ms: DEFAULT_DOUBLE_TAP_MS,
            long_press_timeout_ms: DEFAULT_LONG_PRESS_MS,
            tap_max_distance: DEFAULT_TAP_MAX_DISTANCE,
            pan_threshold: DEFAULT_PAN_THRESHOLD,
            swipe_threshold: 50.0,
            swipe_min_velocity: 0.3,
            pinch_threshold: 0.1,
            throttle_ms: DEFAULT_THROTTLE_MS,
            velocity_window_ms: 100.0,
        }
    }
}

impl GestureConfig {
    /// Reject negative or non-finite values.
    pub fn validate(&self) -> Result<(), InputError> {
        let checks: [(&'static str, f64); 10] = [
            ("tap_timeout_ms", self.tap_timeout_ms),
            ("double_tap_timeout_ms", self.double_tap_timeout_ms),
            ("long_press_timeout_ms", self.long_press_timeout_ms),
            ("tap_max_distance", self.tap_max_distance),
            ("pan_threshold", self.pan_threshold),
            ("swipe_threshold", self.swipe_threshold),
            ("swipe_min_velocity", self.swipe_min_velocity),
            ("pinch_threshold", self.pinch_threshold),
            ("throttle_ms", self.throttle_ms),
            ("velocity_window_ms", self.velocity_window_ms),
        ];
        for (field, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(InputError::invalid(
                    field,
                    format!("must be a finite non-negative number, got {}", value),
                ));
            }
        }
        if self.long_press_timeout_ms <= self.tap_timeout_ms {
            return Err(InputError::invalid(
                "long_press_timeout_ms",
                "must exceed tap_timeout_ms",
            ));
        }
        Ok(())
    }

    /// Configuration with throttling disabled (every update is emitted).
    pub fn unthrottled() -> Self {
        Self {
            throttle_ms: 0.0,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(GestureConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_negative() {
        let config = GestureConfig {
            pan_threshold: -1.0,
            ..GestureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(InputError::InvalidConfig {
                field: "pan_threshold",
                ..
            })
        ));
    }

    #[test]
    fn rejects_long_press_shorter_than_tap() {
        let config = GestureConfig {
            long_press_timeout_ms: 100.0,
            tap_timeout_ms: 200.0,
            ..GestureConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: GestureConfig = serde_yaml::from_str("tap_max_distance: 4.0\n").unwrap();
        assert_eq!(config.tap_max_distance, 4.0);
        assert_eq!(config.long_press_timeout_ms, DEFAULT_LONG_PRESS_MS);
    }
}
