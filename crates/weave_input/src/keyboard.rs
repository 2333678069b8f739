//! Keyboard key codes and modifier flags.

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical key, independent of platform scan codes.
///
/// Serialized as its display name (`"ArrowUp"`, `"Escape"`, `"+"`, `"f"`), so
/// shortcut tables read naturally in YAML configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyCode {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Plus,
    Minus,
    Escape,
    Tab,
    Enter,
    Space,
    Home,
    /// Any other printable key, lower-cased.
    Char(char),
}

impl KeyCode {
    /// Map a DOM-style `KeyboardEvent.key` value to a key code.
    pub fn from_key_name(name: &str) -> Option<KeyCode> {
        let code = match name {
            "ArrowUp" | "Up" => KeyCode::ArrowUp,
            "ArrowDown" | "Down" => KeyCode::ArrowDown,
            "ArrowLeft" | "Left" => KeyCode::ArrowLeft,
            "ArrowRight" | "Right" => KeyCode::ArrowRight,
            "+" | "=" | "Plus" => KeyCode::Plus,
            "-" | "_" | "Minus" => KeyCode::Minus,
            "Escape" | "Esc" => KeyCode::Escape,
            "Tab" => KeyCode::Tab,
            "Enter" | "Return" => KeyCode::Enter,
            " " | "Space" | "Spacebar" => KeyCode::Space,
            "Home" => KeyCode::Home,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => KeyCode::Char(c.to_ascii_lowercase()),
                    _ => return None,
                }
            }
        };
        Some(code)
    }

    pub fn is_arrow(&self) -> bool {
        matches!(
            self,
            KeyCode::ArrowUp | KeyCode::ArrowDown | KeyCode::ArrowLeft | KeyCode::ArrowRight
        )
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::ArrowUp => f.write_str("ArrowUp"),
            KeyCode::ArrowDown => f.write_str("ArrowDown"),
            KeyCode::ArrowLeft => f.write_str("ArrowLeft"),
            KeyCode::ArrowRight => f.write_str("ArrowRight"),
            KeyCode::Plus => f.write_str("+"),
            KeyCode::Minus => f.write_str("-"),
            KeyCode::Escape => f.write_str("Escape"),
            KeyCode::Tab => f.write_str("Tab"),
            KeyCode::Enter => f.write_str("Enter"),
            KeyCode::Space => f.write_str("Space"),
            KeyCode::Home => f.write_str("Home"),
            KeyCode::Char(c) => write!(f, "{}", c),
        }
    }
}

impl FromStr for KeyCode {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyCode::from_key_name(s).ok_or_else(|| InputError::UnknownKey(s.to_string()))
    }
}

impl TryFrom<String> for KeyCode {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyCode> for String {
    fn from(key: KeyCode) -> Self {
        key.to_string()
    }
}

bitflags::bitflags! {
    /// Modifier keys held during an input event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct KeyModifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL = 0b0010;
        const ALT = 0b0100;
        const META = 0b1000;
    }
}

impl KeyModifiers {
    pub const NONE: KeyModifiers = KeyModifiers::empty();

    pub fn shift(&self) -> bool {
        self.contains(KeyModifiers::SHIFT)
    }

    /// Ctrl on Linux/Windows or Cmd on macOS: the conventional multi-select key.
    pub fn command(&self) -> bool {
        self.intersects(KeyModifiers::CTRL | KeyModifiers::META)
    }

    pub fn alt(&self) -> bool {
        self.contains(KeyModifiers::ALT)
    }
}
