//! Similarity-driven graph layout.
//!
//! Callers hand the [`LayoutPipeline`] a set of [`Node`]s and a
//! [`SimilarityFunctor`]; the pipeline scores every pair through the
//! [`SimilarityProcessor`] (with a TTL + LRU [`SimilarityCache`] underneath)
//! and lets the [`SpatialOptimizer`] pull similar nodes together.
//!
//! # Architecture
//!
//! ```text
//!   Vec<SharedNode> + SharedFunctor
//!            │
//!            ▼
//!   LayoutPipeline ──► LayoutEvent (layoutProgress / layoutComplete)
//!    │
//!    ├── 1. ClusteringContext (iteration, alpha, config)
//!    ├── 2. SimilarityProcessor ──► SimilarityCache (symmetric pair keys)
//!    │        validate_functor, similarity matrix, kNN pruning (rstar)
//!    ├── 3. SpatialOptimizer (repulsion + similarity springs, 2D/3D)
//!    └── 4. ImportanceScorer ──► Vec<EnhancedLayoutNode>
//! ```
//!
//! Functor failures never escape `calculate_layout_async`; check
//! `LayoutResult::status`.

mod builtin;
mod cache;
mod config;
mod context;
mod error;
mod functor;
mod importance;
mod node;
mod optimizer;
mod pipeline;
mod processor;

pub use builtin::{
    cosine_similarity, jaccard_similarity, spatial_proximity, BuiltinSimilarity, CosineSimilarity,
    JaccardSimilarity, SpatialProximity, SPATIAL_FALLOFF,
};
pub use cache::{CacheStatistics, PairKey, SimilarityCache};
pub use config::{CacheConfig, Dimensions, LayoutBounds, LayoutConfig, OptimizerConfig, PruningConfig};
pub use context::ClusteringContext;
pub use error::{LayoutError, SimilarityError};
pub use functor::{
    check_score, invoke, validate_functor, Fallible, SharedFunctor, SimilarityFunctor, DEFAULT_SCOPE,
};
pub use importance::{DegreeScorer, ImportanceMetrics, ImportanceScorer};
pub use node::{Node, NodeMetadata, SharedNode};
pub use optimizer::{OptimizationResult, SpatialOptimizer};
pub use pipeline::{
    DimensionTransition, EnhancedLayoutNode, LayoutEvent, LayoutMetrics, LayoutPhase, LayoutPipeline,
    LayoutProgress, LayoutResult, LayoutStatus, MemoryEstimate, PositionDelta,
};
pub use processor::{ProcessorMetrics, SimilarityMatrix, SimilarityProcessor};

pub const DEFAULT_LAYOUT_WIDTH: f64 = 800.0;
pub const DEFAULT_LAYOUT_HEIGHT: f64 = 600.0;
/// Z runs from `-depth/2` to `depth/2` in 3D layouts.
pub const DEFAULT_LAYOUT_DEPTH: f64 = 400.0;

pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;
/// Cached scores older than this are recomputed (milliseconds).
pub const DEFAULT_CACHE_TTL_MS: f64 = 30_000.0;
