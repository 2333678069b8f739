//! Interaction configuration.
//!
//! Every section is optional in a document: [`InteractionConfig::from_yaml`]
//! and [`InteractionConfig::from_json_value`] deep-merge a partial document
//! over the defaults. Objects merge key by key; scalars and arrays replace.
//!
//! ```yaml
//! features:
//!   node_drag: true
//! viewport:
//!   max_zoom: 4.0
//! gestures:
//!   long_press_timeout_ms: 650
//! accessibility:
//!   announce_changes: false
//! ```

use crate::animation::AnimationConfig;
use crate::error::InteractionError;
use crate::viewport::{PanBounds, DEFAULT_FIT_PADDING, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weave_core::{Point2, DEFAULT_THROTTLE_MS};
use weave_input::{GestureConfig, KeyCode};

/// Feature toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub selection: bool,
    pub multi_select: bool,
    /// Modifier + drag draws a selection rectangle.
    pub region_select: bool,
    pub pan: bool,
    pub zoom: bool,
    pub wheel_zoom: bool,
    pub keyboard: bool,
    pub touch: bool,
    pub hover: bool,
    pub node_drag: bool,
    pub animated_transitions: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            selection: true,
            multi_select: true,
            region_select: true,
            pan: true,
            zoom: true,
            wheel_zoom: true,
            keyboard: true,
            touch: true,
            hover: true,
            node_drag: false,
            animated_transitions: true,
        }
    }
}

/// Keyboard shortcut bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutConfig {
    pub reset: KeyCode,
    pub fit: KeyCode,
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            reset: KeyCode::Char('0'),
            fit: KeyCode::Char('f'),
        }
    }
}

/// Step sizes and tolerances for direct manipulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Minimum interval between hover/hit-test queries.
    pub throttle_ms: f64,
    /// Hit-test slop in screen pixels.
    pub hit_tolerance: f64,
    /// Zoom change per wheel notch (0.1 = 10%).
    pub wheel_zoom_step: f64,
    /// Arrow-key pan in screen pixels.
    pub keyboard_pan_step: f64,
    /// Multiplier applied to the pan step while Shift is held.
    pub keyboard_pan_boost: f64,
    pub keyboard_zoom_factor: f64,
    pub double_tap_zoom_factor: f64,
    /// Zoom used by `zoom_to_node` when no level is given.
    pub focus_zoom: f64,
    pub fit_padding: f64,
    pub shortcuts: ShortcutConfig,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            throttle_ms: DEFAULT_THROTTLE_MS,
            hit_tolerance: 5.0,
            wheel_zoom_step: 0.1,
            keyboard_pan_step: 50.0,
            keyboard_pan_boost: 4.0,
            keyboard_zoom_factor: 1.2,
            double_tap_zoom_factor: 2.0,
            focus_zoom: 2.0,
            fit_padding: DEFAULT_FIT_PADDING,
            shortcuts: ShortcutConfig::default(),
        }
    }
}

/// Viewport limits and initial transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub initial_zoom: f64,
    pub initial_pan: Point2,
    pub pan_bounds: Option<PanBounds>,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            initial_zoom: 1.0,
            initial_pan: Point2::ZERO,
            pan_bounds: None,
        }
    }
}

/// Animation defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationDefaults {
    #[serde(flatten)]
    pub transition: AnimationConfig,
    pub reduced_motion: bool,
    pub motion_reduction_threshold_ms: f64,
}

impl Default for AnimationDefaults {
    fn default() -> Self {
        Self {
            transition: AnimationConfig::default(),
            reduced_motion: false,
            motion_reduction_threshold_ms: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessibilityConfig {
    pub announce_changes: bool,
    pub keyboard_focus_visible: bool,
    pub screen_reader_support: bool,
}

impl Default for AccessibilityConfig {
    fn default() -> Self {
        Self {
            announce_changes: true,
            keyboard_focus_visible: true,
            screen_reader_support: true,
        }
    }
}

/// Complete controller configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    pub features: FeatureConfig,
    pub behavior: BehaviorConfig,
    pub viewport: ViewportConfig,
    pub gestures: GestureConfig,
    pub animation: AnimationDefaults,
    pub accessibility: AccessibilityConfig,
}

impl InteractionConfig {
    /// Parse a (partial) YAML document over the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, InteractionError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let doc: Value = serde_yaml::from_str(yaml)?;
        Self::from_json_value(doc)
    }

    /// Merge a (partial) JSON value over the defaults.
    pub fn from_json_value(overrides: Value) -> Result<Self, InteractionError> {
        Self::default().merged(overrides)
    }

    /// Merge `overrides` over this configuration and validate the result.
    pub fn merged(&self, overrides: Value) -> Result<Self, InteractionError> {
        let mut base = serde_json::to_value(self)?;
        if !overrides.is_null() {
            deep_merge(&mut base, overrides);
        }
        let config: InteractionConfig = serde_json::from_value(base)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InteractionError> {
        let vp = &self.viewport;
        if !(vp.min_zoom > 0.0 && vp.min_zoom <= vp.max_zoom && vp.max_zoom.is_finite()) {
            return Err(InteractionError::InvalidZoomLimits {
                min: vp.min_zoom,
                max: vp.max_zoom,
            });
        }
        let b = &self.behavior;
        let positive = [
            ("behavior.wheel_zoom_step", b.wheel_zoom_step),
            ("behavior.keyboard_zoom_factor", b.keyboard_zoom_factor),
            ("behavior.double_tap_zoom_factor", b.double_tap_zoom_factor),
            ("behavior.focus_zoom", b.focus_zoom),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(InteractionError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    field, value
                )));
            }
        }
        if b.wheel_zoom_step >= 1.0 {
            return Err(InteractionError::InvalidConfig(format!(
                "behavior.wheel_zoom_step must be below 1, got {}",
                b.wheel_zoom_step
            )));
        }
        if self.animation.transition.duration_ms < 0.0 {
            return Err(InteractionError::InvalidConfig(
                "animation.duration_ms must not be negative".into(),
            ));
        }
        self.gestures.validate()?;
        Ok(())
    }
}

/// Recursively merge `overrides` into `base`.
fn deep_merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => deep_merge(existing, value),
                    _ => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overrides) => *base = overrides,
    }
}
