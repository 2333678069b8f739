//! Input errors.

use thiserror::Error;

/// Errors raised while configuring or decoding input.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InputError {
    /// A key name in configuration could not be parsed.
    #[error("Unknown key name: {0:?}")]
    UnknownKey(String),

    /// A gesture threshold or timeout is out of range.
    #[error("Invalid gesture config: {field} {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

impl InputError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        InputError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
