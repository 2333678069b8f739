//! Per-run clustering context handed to every similarity functor.

use crate::config::{Dimensions, LayoutBounds, LayoutConfig};
use std::sync::Arc;

/// Iteration state shared by the similarity and optimization phases.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringContext {
    /// Optimizer iteration (0 during similarity calculation).
    pub iteration: usize,
    /// Cooling factor, starts at 1.0.
    pub alpha: f64,
    pub config: Arc<LayoutConfig>,
}

impl ClusteringContext {
    pub fn new(config: Arc<LayoutConfig>) -> Self {
        Self {
            iteration: 0,
            alpha: 1.0,
            config,
        }
    }

    /// Minimal context used to probe functors at registration time.
    pub fn synthetic() -> Self {
        Self::new(Arc::new(LayoutConfig::default()))
    }

    pub fn dimensions(&self) -> Dimensions {
        self.config.dimensions
    }

    pub fn bounds(&self) -> LayoutBounds {
        self.config.bounds
    }

    /// Advance one optimizer step, cooling alpha.
    pub fn advance(&mut self) {
        self.iteration += 1;
        self.alpha *= 1.0 - self.config.optimizer.alpha_decay;
    }
}
