//! Raw input events from any source.
//!
//! Host platforms (DOM, winit, egui) convert their native events into
//! [`RawInput`] before handing them to the interaction controller. Positions
//! are container-relative screen pixels.

use crate::keyboard::{KeyCode, KeyModifiers};
use serde::{Deserialize, Serialize};
use weave_core::Point2;

/// Pointer id reserved for the mouse; touch ids are the platform identifiers.
pub const MOUSE_POINTER_ID: i64 = -1;

/// Mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MouseButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

/// One touch contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub id: i64,
    pub pos: Point2,
}

impl TouchPoint {
    pub fn new(id: i64, x: f64, y: f64) -> Self {
        Self {
            id,
            pos: Point2::new(x, y),
        }
    }
}

/// Raw input event from any source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawInput {
    // =========================================================================
    // MOUSE
    // =========================================================================
    MouseDown {
        button: MouseButton,
        pos: Point2,
        modifiers: KeyModifiers,
    },
    MouseMove {
        pos: Point2,
        modifiers: KeyModifiers,
    },
    MouseUp {
        button: MouseButton,
        pos: Point2,
        modifiers: KeyModifiers,
    },
    /// Pointer left the container.
    MouseLeave,
    /// Wheel scroll; positive `delta_y` scrolls down (zoom out).
    Wheel {
        pos: Point2,
        delta_y: f64,
        modifiers: KeyModifiers,
    },

    // =========================================================================
    // TOUCH
    // =========================================================================
    /// Contacts that went down in this event.
    TouchStart { touches: Vec<TouchPoint> },
    /// Contacts that moved in this event.
    TouchMove { touches: Vec<TouchPoint> },
    /// Contacts that lifted in this event.
    TouchEnd { touches: Vec<TouchPoint> },
    /// The platform aborted the touch sequence.
    TouchCancel,

    // =========================================================================
    // KEYBOARD
    // =========================================================================
    KeyDown {
        key: KeyCode,
        modifiers: KeyModifiers,
    },

    // =========================================================================
    // SPECIAL
    // =========================================================================
    /// Container resized.
    Resized { width: f64, height: f64 },
}

impl RawInput {
    pub fn mouse_down(x: f64, y: f64) -> Self {
        RawInput::MouseDown {
            button: MouseButton::Primary,
            pos: Point2::new(x, y),
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn mouse_move(x: f64, y: f64) -> Self {
        RawInput::MouseMove {
            pos: Point2::new(x, y),
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn mouse_up(x: f64, y: f64) -> Self {
        RawInput::MouseUp {
            button: MouseButton::Primary,
            pos: Point2::new(x, y),
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn wheel(x: f64, y: f64, delta_y: f64) -> Self {
        RawInput::Wheel {
            pos: Point2::new(x, y),
            delta_y,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn key_down(key: KeyCode) -> Self {
        RawInput::KeyDown {
            key,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn key_down_with(key: KeyCode, modifiers: KeyModifiers) -> Self {
        RawInput::KeyDown { key, modifiers }
    }

    pub fn touch_start(touches: impl Into<Vec<TouchPoint>>) -> Self {
        RawInput::TouchStart {
            touches: touches.into(),
        }
    }

    pub fn touch_move(touches: impl Into<Vec<TouchPoint>>) -> Self {
        RawInput::TouchMove {
            touches: touches.into(),
        }
    }

    pub fn touch_end(touches: impl Into<Vec<TouchPoint>>) -> Self {
        RawInput::TouchEnd {
            touches: touches.into(),
        }
    }

    /// Modifiers carried by this event, if it has any.
    pub fn modifiers(&self) -> KeyModifiers {
        match self {
            RawInput::MouseDown { modifiers, .. }
            | RawInput::MouseMove { modifiers, .. }
            | RawInput::MouseUp { modifiers, .. }
            | RawInput::Wheel { modifiers, .. }
            | RawInput::KeyDown { modifiers, .. } => *modifiers,
            _ => KeyModifiers::NONE,
        }
    }

    pub fn is_touch(&self) -> bool {
        matches!(
            self,
            RawInput::TouchStart { .. }
                | RawInput::TouchMove { .. }
                | RawInput::TouchEnd { .. }
                | RawInput::TouchCancel
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        assert!(matches!(
            RawInput::mouse_down(1.0, 2.0),
            RawInput::MouseDown {
                button: MouseButton::Primary,
                ..
            }
        ));
        let touch = RawInput::touch_start(vec![TouchPoint::new(3, 10.0, 20.0)]);
        assert!(touch.is_touch());
        assert!(!RawInput::mouse_move(0.0, 0.0).is_touch());
    }

    #[test]
    fn modifiers_extracted() {
        let ev = RawInput::key_down_with(KeyCode::ArrowUp, KeyModifiers::SHIFT);
        assert!(ev.modifiers().shift());
        assert_eq!(RawInput::TouchCancel.modifiers(), KeyModifiers::NONE);
    }
}
