//! Similarity and layout errors.

use thiserror::Error;

/// Errors raised by functor validation, similarity calculation and
/// function registration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimilarityError {
    #[error("Invalid similarity input: {0}")]
    InvalidInput(String),

    #[error("Similarity functor contract violation: {0}")]
    ContractViolation(String),

    #[error("Similarity functor returned {value} for ({a}, {b}); expected a finite number in [0, 1]")]
    OutOfRange { a: String, b: String, value: f64 },

    #[error("Similarity calculation failed for ({a}, {b}): {message}")]
    CalculationFailed { a: String, b: String, message: String },

    #[error("Similarity function already registered: {0}")]
    DuplicateFunction(String),

    #[error("Unknown similarity function: {0}")]
    UnknownFunction(String),

    #[error("Invalid weight {weight} for similarity function {name}: must be finite and non-negative")]
    InvalidWeight { name: String, weight: f64 },
}

impl SimilarityError {
    /// The functor itself broke its contract (as opposed to bad caller input).
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            SimilarityError::ContractViolation(_) | SimilarityError::OutOfRange { .. }
        )
    }
}

/// Errors raised by layout configuration and post-layout operations.
///
/// `calculate_layout_async` never returns these; pipeline failures are
/// reported through `LayoutResult::status`.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error(transparent)]
    Similarity(#[from] SimilarityError),

    #[error("Invalid layout configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported dimension count: {0} (expected 2 or 3)")]
    InvalidDimensions(u8),

    #[error("Duplicate node id in layout input: {0}")]
    DuplicateNode(String),

    #[error("Layout configuration YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
