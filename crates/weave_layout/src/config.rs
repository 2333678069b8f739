//! Layout configuration.
//!
//! ```yaml
//! dimensions: 3
//! bounds: { width: 1200, height: 900 }
//! cache:
//!   ttl_ms: 60000
//! pruning:
//!   enabled: true
//!   neighbors: 12
//! optimizer:
//!   max_iterations: 150
//! seed: 7
//! ```

use crate::error::LayoutError;
use serde::{Deserialize, Serialize};
use std::fmt;
use weave_core::Point3;

/// 2D or 3D layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Dimensions {
    #[default]
    Two,
    Three,
}

impl Dimensions {
    pub fn count(self) -> u8 {
        match self {
            Dimensions::Two => 2,
            Dimensions::Three => 3,
        }
    }

    pub fn is_3d(self) -> bool {
        self == Dimensions::Three
    }
}

impl TryFrom<u8> for Dimensions {
    type Error = LayoutError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Dimensions::Two),
            3 => Ok(Dimensions::Three),
            other => Err(LayoutError::InvalidDimensions(other)),
        }
    }
}

impl From<Dimensions> for u8 {
    fn from(d: Dimensions) -> u8 {
        d.count()
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}D", self.count())
    }
}

/// Box the optimizer places nodes in. X and Y run from zero to
/// width/height; Z is centered on zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutBounds {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

impl Default for LayoutBounds {
    fn default() -> Self {
        Self {
            width: crate::DEFAULT_LAYOUT_WIDTH,
            height: crate::DEFAULT_LAYOUT_HEIGHT,
            depth: crate::DEFAULT_LAYOUT_DEPTH,
        }
    }
}

impl LayoutBounds {
    pub fn center(&self) -> Point3 {
        Point3::new(self.width / 2.0, self.height / 2.0, 0.0)
    }

    pub fn z_range(&self) -> (f64, f64) {
        (-self.depth / 2.0, self.depth / 2.0)
    }

    /// Clamp into the box; 2D layouts flatten Z.
    pub fn clamp(&self, p: Point3, dimensions: Dimensions) -> Point3 {
        let (z_min, z_max) = self.z_range();
        Point3::new(
            p.x.clamp(0.0, self.width),
            p.y.clamp(0.0, self.height),
            if dimensions.is_3d() { p.z.clamp(z_min, z_max) } else { 0.0 },
        )
    }

    pub fn contains(&self, p: Point3, dimensions: Dimensions) -> bool {
        self.clamp(p, dimensions) == p
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached pairs before LRU eviction.
    pub capacity: usize,
    /// Entries older than this are dropped on read.
    pub ttl_ms: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: crate::DEFAULT_CACHE_CAPACITY,
            ttl_ms: crate::DEFAULT_CACHE_TTL_MS,
        }
    }
}

/// Nearest-neighbour pruning of the similarity matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningConfig {
    pub enabled: bool,
    /// Only prune above this many nodes.
    pub threshold: usize,
    /// Neighbours compared per node.
    pub neighbors: usize,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 200,
            neighbors: 16,
        }
    }
}

/// Force model parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_iterations: usize,
    /// Mean per-node movement below which the layout counts as converged.
    pub convergence_threshold: f64,
    /// Inverse-square repulsion between every pair.
    pub repulsion: f64,
    /// Spring strength pulling similar nodes together.
    pub attraction: f64,
    /// Spring rest length for identical nodes; dissimilar pairs rest further out.
    pub ideal_distance: f64,
    pub center_attraction: f64,
    /// Velocity retained per iteration.
    pub damping: f64,
    /// Largest movement per iteration.
    pub max_step: f64,
    /// Floor for pair distances in force terms.
    pub min_distance: f64,
    /// Multiplicative cooling of the context alpha per iteration.
    pub alpha_decay: f64,
    /// Pair force evaluations allowed per layout. Large graphs get fewer
    /// iterations than `max_iterations` so a run stays interactive.
    pub pair_budget: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            convergence_threshold: 0.1,
            repulsion: 2000.0,
            attraction: 0.05,
            ideal_distance: 60.0,
            center_attraction: 0.01,
            damping: 0.85,
            max_step: 40.0,
            min_distance: 5.0,
            alpha_decay: 0.02,
            pair_budget: 20_000_000,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub dimensions: Dimensions,
    pub bounds: LayoutBounds,
    pub cache: CacheConfig,
    pub pruning: PruningConfig,
    pub optimizer: OptimizerConfig,
    /// Seed for initial placement, Z assignment and centrality placeholders.
    pub seed: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            dimensions: Dimensions::Two,
            bounds: LayoutBounds::default(),
            cache: CacheConfig::default(),
            pruning: PruningConfig::default(),
            optimizer: OptimizerConfig::default(),
            seed: 42,
        }
    }
}

impl LayoutConfig {
    /// Parse a (partial) YAML document over the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, LayoutError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: LayoutConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        let b = &self.bounds;
        if !(b.width > 0.0 && b.height > 0.0 && b.depth >= 0.0)
            || !(b.width.is_finite() && b.height.is_finite() && b.depth.is_finite())
        {
            return Err(LayoutError::InvalidConfig(format!(
                "bounds must be positive and finite, got {}x{}x{}",
                b.width, b.height, b.depth
            )));
        }
        if self.cache.capacity == 0 {
            return Err(LayoutError::InvalidConfig("cache.capacity must be at least 1".into()));
        }
        if !(self.cache.ttl_ms > 0.0) {
            return Err(LayoutError::InvalidConfig("cache.ttl_ms must be positive".into()));
        }
        let o = &self.optimizer;
        if !(0.0..=1.0).contains(&o.damping) || !(0.0..1.0).contains(&o.alpha_decay) {
            return Err(LayoutError::InvalidConfig(
                "optimizer.damping must be in [0, 1] and alpha_decay in [0, 1)".into(),
            ));
        }
        if o.max_step <= 0.0 || o.min_distance <= 0.0 {
            return Err(LayoutError::InvalidConfig(
                "optimizer.max_step and min_distance must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_yaml_over_defaults() {
        let config = LayoutConfig::from_yaml(
            "dimensions: 3\nbounds:\n  width: 1200\npruning:\n  enabled: true\nseed: 7\n",
        )
        .unwrap();
        assert_eq!(config.dimensions, Dimensions::Three);
        assert_eq!(config.bounds.width, 1200.0);
        assert_eq!(config.bounds.height, 600.0);
        assert!(config.pruning.enabled);
        assert_eq!(config.pruning.neighbors, 16);
        assert_eq!(config.seed, 7);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            LayoutConfig::from_yaml("dimensions: 4\n"),
            Err(LayoutError::Yaml(_))
        ));
        assert!(matches!(
            LayoutConfig::from_yaml("cache:\n  capacity: 0\n"),
            Err(LayoutError::InvalidConfig(_))
        ));
        assert_eq!(LayoutConfig::from_yaml("  \n").unwrap(), LayoutConfig::default());
    }

    #[test]
    fn test_bounds_clamp() {
        let bounds = LayoutBounds::default();
        let p = bounds.clamp(Point3::new(-5.0, 700.0, 500.0), Dimensions::Three);
        assert_eq!(p, Point3::new(0.0, 600.0, 200.0));
        let flat = bounds.clamp(Point3::new(10.0, 10.0, 50.0), Dimensions::Two);
        assert_eq!(flat.z, 0.0);
        assert!(bounds.contains(bounds.center(), Dimensions::Two));
    }
}
