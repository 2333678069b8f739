//! Interaction errors.

use thiserror::Error;
use weave_core::NodeId;

/// Errors raised by the viewport, configuration and controller APIs.
///
/// Callback failures never surface here: they are logged and contained at
/// the dispatch site.
#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("Invalid zoom limits: min {min} must be positive and not exceed max {max}")]
    InvalidZoomLimits { min: f64, max: f64 },

    #[error("Invalid viewport dimensions: {width}x{height}")]
    InvalidDimensions { width: f64, height: f64 },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Input(#[from] weave_input::InputError),
}

impl InteractionError {
    /// Errors caused by caller-supplied data rather than controller state.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            InteractionError::InvalidConfig(_)
                | InteractionError::Yaml(_)
                | InteractionError::Json(_)
                | InteractionError::Input(_)
        )
    }
}
