//! Built-in similarity functions.

use crate::context::ClusteringContext;
use crate::functor::{SharedFunctor, SimilarityFunctor};
use crate::node::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use weave_core::Point3;

/// Distance at which spatial proximity falls to `1/e`.
pub const SPATIAL_FALLOFF: f64 = 100.0;

/// Cosine similarity clamped to `[0, 1]`. Zero for empty, mismatched or
/// zero-length vectors.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0, 0.0, 0.0), |(dot, na, nb), (x, y)| (dot + x * y, na + x * x, nb + y * y));
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (dot / denom).clamp(0.0, 1.0)
}

/// `|A ∩ B| / |A ∪ B|`; zero when both sets are empty.
pub fn jaccard_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// `exp(-distance / 100)`.
pub fn spatial_proximity(a: Point3, b: Point3) -> f64 {
    (-a.distance(b) / SPATIAL_FALLOFF).exp()
}

/// Cosine similarity of `Node::vector`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineSimilarity;

impl SimilarityFunctor for CosineSimilarity {
    fn similarity(&self, a: &Node, b: &Node, _ctx: &ClusteringContext) -> anyhow::Result<f64> {
        Ok(match (&a.vector, &b.vector) {
            (Some(va), Some(vb)) => cosine_similarity(va, vb),
            _ => 0.0,
        })
    }

    fn cache_scope(&self) -> &str {
        "cosine"
    }
}

/// Jaccard similarity of `metadata.tags`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaccardSimilarity;

impl SimilarityFunctor for JaccardSimilarity {
    fn similarity(&self, a: &Node, b: &Node, _ctx: &ClusteringContext) -> anyhow::Result<f64> {
        Ok(jaccard_similarity(&a.metadata.tags, &b.metadata.tags))
    }

    fn cache_scope(&self) -> &str {
        "jaccard"
    }
}

/// Proximity of seed positions; zero when either node has none.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialProximity;

impl SimilarityFunctor for SpatialProximity {
    fn similarity(&self, a: &Node, b: &Node, _ctx: &ClusteringContext) -> anyhow::Result<f64> {
        Ok(match (a.position, b.position) {
            (Some(pa), Some(pb)) => spatial_proximity(pa, pb),
            _ => 0.0,
        })
    }

    fn cache_scope(&self) -> &str {
        "spatial"
    }
}

/// Named built-in functor, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinSimilarity {
    Cosine,
    Jaccard,
    Spatial,
}

impl BuiltinSimilarity {
    pub const ALL: [BuiltinSimilarity; 3] = [
        BuiltinSimilarity::Cosine,
        BuiltinSimilarity::Jaccard,
        BuiltinSimilarity::Spatial,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinSimilarity::Cosine => "cosine",
            BuiltinSimilarity::Jaccard => "jaccard",
            BuiltinSimilarity::Spatial => "spatial",
        }
    }

    pub fn functor(self) -> SharedFunctor {
        match self {
            BuiltinSimilarity::Cosine => Arc::new(CosineSimilarity),
            BuiltinSimilarity::Jaccard => Arc::new(JaccardSimilarity),
            BuiltinSimilarity::Spatial => Arc::new(SpatialProximity),
        }
    }
}
