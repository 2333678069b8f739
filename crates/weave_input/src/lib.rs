//! Input model and gesture recognition for the weave graph view.
//!
//! Hosts translate native mouse, touch and keyboard events into [`RawInput`].
//! Touch and pointer streams are classified by the [`GestureRecognizer`]:
//!
//! 1. **Deterministic** - every entry point takes a timestamp, timers are polled
//! 2. **Single gesture** - at most one gesture is active at a time
//! 3. **Throttled** - continuous updates are rate limited per gesture channel
//!
//! # Architecture
//!
//! ```text
//! Mouse ─┐
//! Touch ─┼──► RawInput ──► GestureRecognizer ──► GestureEvent ──► listeners
//! Keys  ─┘                       │
//!                                ▼
//!                         GestureConfig (thresholds, timeouts)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use weave_input::{GestureKind, GestureRecognizer};
//!
//! let mut recognizer = GestureRecognizer::new();
//! recognizer.on(GestureKind::DoubleTap, |event| {
//!     println!("double tap at {:?}", event.gesture.position());
//!     Ok(())
//! });
//! recognizer.touch_start(&[TouchPoint::new(1, 10.0, 10.0)], now);
//! recognizer.tick(now + 16.0);
//! ```

mod config;
mod error;
mod gesture;
mod keyboard;
mod raw;

pub use config::GestureConfig;
pub use error::InputError;
pub use gesture::{
    Gesture, GestureEvent, GestureKind, GesturePhase, GestureRecognizer, GestureState,
    RecognitionPhase, SwipeDirection,
};
pub use keyboard::{KeyCode, KeyModifiers};
pub use raw::{MouseButton, RawInput, TouchPoint, MOUSE_POINTER_ID};

/// Longest press that still counts as a tap (milliseconds).
pub const DEFAULT_TAP_TIMEOUT_MS: f64 = 250.0;

/// Double-tap window (milliseconds).
pub const DEFAULT_DOUBLE_TAP_MS: f64 = 300.0;

/// Long-press hold time (milliseconds).
pub const DEFAULT_LONG_PRESS_MS: f64 = 500.0;

/// Movement tolerated by a tap (pixels).
pub const DEFAULT_TAP_MAX_DISTANCE: f64 = 10.0;

/// Movement before a pan starts (pixels).
pub const DEFAULT_PAN_THRESHOLD: f64 = 10.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::assertions_on_constants)]
    fn constants_are_reasonable() {
        assert!(DEFAULT_TAP_TIMEOUT_MS > 0.0);
        assert!(DEFAULT_LONG_PRESS_MS > DEFAULT_TAP_TIMEOUT_MS);
        assert!(DEFAULT_DOUBLE_TAP_MS > DEFAULT_TAP_TIMEOUT_MS);
        assert!(DEFAULT_TAP_MAX_DISTANCE > 0.0);
        assert!(DEFAULT_PAN_THRESHOLD >= DEFAULT_TAP_MAX_DISTANCE);
    }
}
