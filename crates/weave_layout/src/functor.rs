//! Similarity functor contract.
//!
//! A functor maps `(node_a, node_b, context)` to a finite score in `[0, 1]`.
//! The three-argument shape is fixed by [`SimilarityFunctor`]; the score
//! range is checked by a probe call at registration and again on every real
//! call. Plain closures returning `f64` implement the trait directly; wrap
//! closures returning `anyhow::Result<f64>` in [`Fallible`].
//!
//! ```ignore
//! let by_label: SharedFunctor = Arc::new(|a: &Node, b: &Node, _: &ClusteringContext| {
//!     if a.label == b.label { 1.0 } else { 0.0 }
//! });
//! validate_functor(by_label.as_ref())?;
//! ```

use crate::context::ClusteringContext;
use crate::error::SimilarityError;
use crate::node::Node;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use weave_core::panic_message;

/// Cache namespace for functors that do not name one.
pub const DEFAULT_SCOPE: &str = "default";

/// Pairwise similarity function.
pub trait SimilarityFunctor: Send + Sync {
    fn similarity(&self, a: &Node, b: &Node, ctx: &ClusteringContext) -> anyhow::Result<f64>;

    /// Namespace for cached scores. Functors sharing a scope share cache entries.
    fn cache_scope(&self) -> &str {
        DEFAULT_SCOPE
    }
}

pub type SharedFunctor = Arc<dyn SimilarityFunctor>;

impl<F> SimilarityFunctor for F
where
    F: Fn(&Node, &Node, &ClusteringContext) -> f64 + Send + Sync,
{
    fn similarity(&self, a: &Node, b: &Node, ctx: &ClusteringContext) -> anyhow::Result<f64> {
        Ok(self(a, b, ctx))
    }
}

/// Adapter for closures that can fail.
pub struct Fallible<F>(pub F);

impl<F> SimilarityFunctor for Fallible<F>
where
    F: Fn(&Node, &Node, &ClusteringContext) -> anyhow::Result<f64> + Send + Sync,
{
    fn similarity(&self, a: &Node, b: &Node, ctx: &ClusteringContext) -> anyhow::Result<f64> {
        (self.0)(a, b, ctx)
    }
}

/// Check a score against the `[0, 1]` contract.
pub fn check_score(a: &str, b: &str, value: f64) -> Result<f64, SimilarityError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(SimilarityError::OutOfRange {
            a: a.to_string(),
            b: b.to_string(),
            value,
        })
    }
}

/// Call `functor`, converting errors and panics into
/// [`SimilarityError::CalculationFailed`] and range violations into
/// [`SimilarityError::OutOfRange`].
pub fn invoke(
    functor: &dyn SimilarityFunctor,
    a: &Node,
    b: &Node,
    ctx: &ClusteringContext,
) -> Result<f64, SimilarityError> {
    let failed = |message: String| SimilarityError::CalculationFailed {
        a: a.id.clone(),
        b: b.id.clone(),
        message,
    };
    let value = match catch_unwind(AssertUnwindSafe(|| functor.similarity(a, b, ctx))) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => return Err(failed(format!("{:#}", err))),
        Err(payload) => return Err(failed(format!("functor panicked: {}", panic_message(&payload)))),
    };
    check_score(&a.id, &b.id, value)
}

fn probe_nodes() -> (Node, Node) {
    let a = Node::new("__probe_a")
        .with_vector(vec![1.0, 0.0, 0.5])
        .with_tags(["probe"])
        .with_position(0.0, 0.0);
    let b = Node::new("__probe_b")
        .with_vector(vec![0.0, 1.0, 0.5])
        .with_tags(["probe", "peer"])
        .with_position(30.0, 40.0);
    (a, b)
}

/// Probe `functor` with synthetic nodes and context.
pub fn validate_functor(functor: &dyn SimilarityFunctor) -> Result<(), SimilarityError> {
    let (a, b) = probe_nodes();
    let ctx = ClusteringContext::synthetic();
    invoke(functor, &a, &b, &ctx)
        .map(|_| ())
        .map_err(|err| SimilarityError::ContractViolation(format!("probe call failed: {}", err)))
}
