//! Similarity processor.
//!
//! Runs functors through the contract checks, reads and fills the
//! [`SimilarityCache`], keeps a registry of named weighted functions and
//! builds the pairwise similarity matrix the optimizer consumes.

use crate::builtin::BuiltinSimilarity;
use crate::cache::{CacheStatistics, PairKey, SimilarityCache};
use crate::config::{CacheConfig, PruningConfig};
use crate::context::ClusteringContext;
use crate::error::SimilarityError;
use crate::functor::{invoke, validate_functor, SharedFunctor, SimilarityFunctor};
use crate::node::{Node, SharedNode};
use rstar::primitives::GeomWithData;
use rstar::RTree;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use weave_core::{NodeId, SharedClock};

// =============================================================================
// METRICS
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorMetrics {
    /// Functor invocations that produced a score.
    pub calculations: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub errors: u64,
    pub total_time_ms: f64,
    /// Matrix pairs scored straight through because the run outgrew the cache.
    pub uncached: u64,
}

impl ProcessorMetrics {
    pub fn average_time_ms(&self) -> f64 {
        if self.calculations == 0 {
            0.0
        } else {
            self.total_time_ms / self.calculations as f64
        }
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}

// =============================================================================
// SIMILARITY MATRIX
// =============================================================================

/// Dense symmetric `n x n` score matrix in node order.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    ids: Vec<NodeId>,
    index: HashMap<NodeId, usize>,
    values: Vec<f64>,
    pairs_measured: usize,
    pruned: bool,
}

impl SimilarityMatrix {
    fn new(nodes: &[SharedNode]) -> Self {
        let n = nodes.len();
        let ids: Vec<NodeId> = nodes.iter().map(|node| node.id.clone()).collect();
        let index = ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            values[i * n + i] = 1.0;
        }
        Self {
            ids,
            index,
            values,
            pairs_measured: 0,
            pruned: false,
        }
    }

    fn set(&mut self, i: usize, j: usize, value: f64) {
        let n = self.ids.len();
        self.values[i * n + j] = value;
        self.values[j * n + i] = value;
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.ids.len() + j]
    }

    /// Scores of node `i` against every node, in node order.
    pub fn row(&self, i: usize) -> &[f64] {
        let n = self.ids.len();
        &self.values[i * n..(i + 1) * n]
    }

    pub fn score(&self, a: &str, b: &str) -> Option<f64> {
        let (&i, &j) = (self.index.get(a)?, self.index.get(b)?);
        Some(self.get(i, j))
    }

    /// Distinct pairs that were scored (cache hits included).
    pub fn pairs_measured(&self) -> usize {
        self.pairs_measured
    }

    /// Whether only nearest-neighbour pairs were scored.
    pub fn is_pruned(&self) -> bool {
        self.pruned
    }
}

// =============================================================================
// PROCESSOR
// =============================================================================

struct RegisteredFunction {
    name: String,
    functor: SharedFunctor,
    weight: f64,
}

pub struct SimilarityProcessor {
    cache: SimilarityCache,
    clock: SharedClock,
    registry: Vec<RegisteredFunction>,
    metrics: ProcessorMetrics,
    pruning: PruningConfig,
}

impl fmt::Debug for SimilarityProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimilarityProcessor")
            .field("cache", &self.cache)
            .field("registered", &self.registry.iter().map(|r| r.name.as_str()).collect::<Vec<_>>())
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl SimilarityProcessor {
    pub fn new(clock: SharedClock) -> Self {
        Self::with_config(clock, CacheConfig::default(), PruningConfig::default())
    }

    pub fn with_config(clock: SharedClock, cache: CacheConfig, pruning: PruningConfig) -> Self {
        Self {
            cache: SimilarityCache::with_config(clock.clone(), cache),
            clock,
            registry: Vec::new(),
            metrics: ProcessorMetrics::default(),
            pruning,
        }
    }

    pub fn set_pruning(&mut self, pruning: PruningConfig) {
        self.pruning = pruning;
    }

    // =========================================================================
    // SINGLE PAIR
    // =========================================================================

    /// Score one pair, reading the cache first.
    ///
    /// Entries are keyed by the functor's cache scope and the unordered id
    /// pair, so `(a, b)` and `(b, a)` share one entry.
    pub fn calculate_similarity(
        &mut self,
        a: &Node,
        b: &Node,
        functor: &dyn SimilarityFunctor,
        ctx: &ClusteringContext,
    ) -> Result<f64, SimilarityError> {
        let scope = functor.cache_scope().to_string();
        self.calculate_scoped(&scope, a, b, functor, ctx)
    }

    fn calculate_scoped(
        &mut self,
        scope: &str,
        a: &Node,
        b: &Node,
        functor: &dyn SimilarityFunctor,
        ctx: &ClusteringContext,
    ) -> Result<f64, SimilarityError> {
        a.validate()?;
        b.validate()?;

        let key = PairKey::new(scope, &a.id, &b.id);
        if let Some(value) = self.cache.get(&key) {
            self.metrics.cache_hits += 1;
            return Ok(value);
        }
        self.metrics.cache_misses += 1;

        let started = self.clock.now_ms();
        let value = match invoke(functor, a, b, ctx) {
            Ok(value) => value,
            Err(err) => {
                self.metrics.errors += 1;
                return Err(err);
            }
        };
        self.metrics.calculations += 1;
        self.metrics.total_time_ms += self.clock.now_ms() - started;
        self.cache.insert(key, value);
        Ok(value)
    }

    // =========================================================================
    // REGISTRY
    // =========================================================================

    /// Register a named functor for weighted composition.
    pub fn register_similarity_function(
        &mut self,
        name: impl Into<String>,
        functor: SharedFunctor,
        weight: f64,
    ) -> Result<(), SimilarityError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SimilarityError::InvalidInput("function name must not be empty".into()));
        }
        if self.registry.iter().any(|r| r.name == name) {
            return Err(SimilarityError::DuplicateFunction(name));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(SimilarityError::InvalidWeight { name, weight });
        }
        validate_functor(functor.as_ref())?;
        tracing::debug!(name = %name, weight, "similarity function registered");
        self.registry.push(RegisteredFunction { name, functor, weight });
        Ok(())
    }

    pub fn unregister_similarity_function(&mut self, name: &str) -> bool {
        let before = self.registry.len();
        self.registry.retain(|r| r.name != name);
        before != self.registry.len()
    }

    /// Register cosine, Jaccard and spatial proximity with weight 1.
    pub fn register_builtins(&mut self) -> Result<(), SimilarityError> {
        for builtin in BuiltinSimilarity::ALL {
            self.register_similarity_function(builtin.name(), builtin.functor(), 1.0)?;
        }
        Ok(())
    }

    /// `(name, weight)` in registration order.
    pub fn registered_functions(&self) -> Vec<(&str, f64)> {
        self.registry.iter().map(|r| (r.name.as_str(), r.weight)).collect()
    }

    pub fn registered_function(&self, name: &str) -> Option<SharedFunctor> {
        self.registry
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.functor.clone())
    }

    /// Weighted average of registered functions. An empty `names` slice
    /// uses every registered function. Zero total weight scores 0.
    pub fn calculate_weighted_similarity(
        &mut self,
        a: &Node,
        b: &Node,
        names: &[&str],
        ctx: &ClusteringContext,
    ) -> Result<f64, SimilarityError> {
        let selected: Vec<(String, SharedFunctor, f64)> = if names.is_empty() {
            self.registry
                .iter()
                .map(|r| (r.name.clone(), r.functor.clone(), r.weight))
                .collect()
        } else {
            names
                .iter()
                .map(|name| {
                    self.registry
                        .iter()
                        .find(|r| r.name == *name)
                        .map(|r| (r.name.clone(), r.functor.clone(), r.weight))
                        .ok_or_else(|| SimilarityError::UnknownFunction(name.to_string()))
                })
                .collect::<Result<_, _>>()?
        };

        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for (name, functor, weight) in &selected {
            if *weight == 0.0 {
                continue;
            }
            // registry name scopes the cache so two registrations never collide
            weighted += self.calculate_scoped(name, a, b, functor.as_ref(), ctx)? * weight;
            total_weight += weight;
        }
        if total_weight == 0.0 {
            return Ok(0.0);
        }
        Ok((weighted / total_weight).clamp(0.0, 1.0))
    }

    // =========================================================================
    // MATRIX
    // =========================================================================

    /// Score every pair of `nodes`.
    ///
    /// With pruning enabled and more than `threshold` positioned nodes, only
    /// each node's nearest neighbours by seed position are scored and the
    /// rest stay 0. The diagonal is 1.
    ///
    /// A run with more pairs than the cache holds would only churn it, so
    /// those pairs are scored directly and nothing is cached.
    pub fn calculate_similarity_matrix(
        &mut self,
        nodes: &[SharedNode],
        functor: &dyn SimilarityFunctor,
        ctx: &ClusteringContext,
    ) -> Result<SimilarityMatrix, SimilarityError> {
        let n = nodes.len();
        let mut matrix = SimilarityMatrix::new(nodes);
        let calculations_before = self.metrics.calculations;

        let neighbours = self.neighbour_pairs(nodes);
        let pair_count = neighbours.as_ref().map_or(n * n.saturating_sub(1) / 2, BTreeSet::len);
        matrix.pruned = neighbours.is_some();
        let pairs: Box<dyn Iterator<Item = (usize, usize)>> = match neighbours {
            Some(pairs) => Box::new(pairs.into_iter()),
            None => Box::new((0..n).flat_map(move |i| ((i + 1)..n).map(move |j| (i, j)))),
        };

        let cached = pair_count <= self.cache.config().capacity;
        if cached {
            let scope = functor.cache_scope().to_string();
            for (i, j) in pairs {
                let value = self.calculate_scoped(&scope, &nodes[i], &nodes[j], functor, ctx)?;
                matrix.set(i, j, value);
                matrix.pairs_measured += 1;
            }
        } else {
            for node in nodes {
                node.validate()?;
            }
            let started = self.clock.now_ms();
            for (i, j) in pairs {
                let value = match invoke(functor, &nodes[i], &nodes[j], ctx) {
                    Ok(value) => value,
                    Err(err) => {
                        self.metrics.errors += 1;
                        return Err(err);
                    }
                };
                self.metrics.calculations += 1;
                self.metrics.uncached += 1;
                matrix.set(i, j, value);
                matrix.pairs_measured += 1;
            }
            self.metrics.total_time_ms += self.clock.now_ms() - started;
        }

        tracing::debug!(
            nodes = n,
            pairs = matrix.pairs_measured,
            calculated = self.metrics.calculations - calculations_before,
            pruned = matrix.pruned,
            cached,
            "similarity matrix built"
        );
        Ok(matrix)
    }

    /// Nearest-neighbour pairs `(i, j)` with `i < j`, or `None` when pruning
    /// does not apply.
    fn neighbour_pairs(&self, nodes: &[SharedNode]) -> Option<BTreeSet<(usize, usize)>> {
        if !self.pruning.enabled || nodes.len() <= self.pruning.threshold {
            return None;
        }
        let points = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| node.position.map(|p| GeomWithData::new([p.x, p.y, p.z], i)))
            .collect::<Option<Vec<_>>>()?;
        let tree = RTree::bulk_load(points.clone());

        let mut pairs = BTreeSet::new();
        for point in &points {
            let i = point.data;
            for neighbour in tree
                .nearest_neighbor_iter(point.geom())
                .filter(|candidate| candidate.data != i)
                .take(self.pruning.neighbors)
            {
                let j = neighbour.data;
                pairs.insert((i.min(j), i.max(j)));
            }
        }
        Some(pairs)
    }

    // =========================================================================
    // CACHE + METRICS
    // =========================================================================

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cleanup_expired(&mut self) -> usize {
        self.cache.cleanup_expired()
    }

    pub fn cache_statistics(&self) -> CacheStatistics {
        self.cache.statistics()
    }

    pub fn cache_memory_estimate(&self) -> usize {
        self.cache.memory_estimate()
    }

    pub fn metrics(&self) -> ProcessorMetrics {
        self.metrics
    }

    pub fn reset_metrics(&mut self) {
        self.metrics = ProcessorMetrics::default();
        self.cache.reset_statistics();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::JaccardSimilarity;
    use crate::functor::Fallible;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use weave_core::VirtualClock;

    fn processor() -> SimilarityProcessor {
        SimilarityProcessor::new(VirtualClock::new().shared())
    }

    fn ctx() -> ClusteringContext {
        ClusteringContext::synthetic()
    }

    #[test]
    fn test_cache_hit_on_swapped_pair() {
        let mut p = processor();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let functor = move |_: &Node, _: &Node, _: &ClusteringContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            0.7
        };
        let (a, b) = (Node::new("a"), Node::new("b"));

        assert_eq!(p.calculate_similarity(&a, &b, &functor, &ctx()).unwrap(), 0.7);
        assert_eq!(p.calculate_similarity(&b, &a, &functor, &ctx()).unwrap(), 0.7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = p.cache_statistics();
        assert_eq!((stats.hit_count, stats.miss_count), (1, 1));
        let metrics = p.metrics();
        assert_eq!((metrics.calculations, metrics.cache_hits, metrics.cache_misses), (1, 1, 1));
    }

    #[test]
    fn test_out_of_range_result_is_rejected() {
        let mut p = processor();
        let functor = |_: &Node, _: &Node, _: &ClusteringContext| 1.5;
        let err = p
            .calculate_similarity(&Node::new("a"), &Node::new("b"), &functor, &ctx())
            .unwrap_err();
        assert!(matches!(err, SimilarityError::OutOfRange { value, .. } if value == 1.5));
        assert_eq!(p.metrics().errors, 1);
        assert_eq!(p.cache_statistics().size, 0);
    }

    #[test]
    fn test_functor_error_keeps_message() {
        let mut p = processor();
        let functor = Fallible(|_: &Node, _: &Node, _: &ClusteringContext| -> anyhow::Result<f64> {
            anyhow::bail!("embedding missing")
        });
        let err = p
            .calculate_similarity(&Node::new("a"), &Node::new("b"), &functor, &ctx())
            .unwrap_err();
        assert!(err.to_string().contains("embedding missing"));
    }

    #[test]
    fn test_empty_id_rejected_before_call() {
        let mut p = processor();
        let functor = |_: &Node, _: &Node, _: &ClusteringContext| -> f64 { panic!("must not run") };
        let err = p
            .calculate_similarity(&Node::new(""), &Node::new("b"), &functor, &ctx())
            .unwrap_err();
        assert!(matches!(err, SimilarityError::InvalidInput(_)));
    }

    #[test]
    fn test_registration_rules() {
        let mut p = processor();
        let constant: SharedFunctor = Arc::new(|_: &Node, _: &Node, _: &ClusteringContext| 0.5);
        p.register_similarity_function("constant", constant.clone(), 1.0).unwrap();

        assert_eq!(
            p.register_similarity_function("constant", constant.clone(), 1.0),
            Err(SimilarityError::DuplicateFunction("constant".into()))
        );
        assert!(matches!(
            p.register_similarity_function("neg", constant.clone(), -1.0),
            Err(SimilarityError::InvalidWeight { .. })
        ));
        assert!(matches!(
            p.register_similarity_function("nan", constant, f64::NAN),
            Err(SimilarityError::InvalidWeight { .. })
        ));
        let broken: SharedFunctor = Arc::new(|_: &Node, _: &Node, _: &ClusteringContext| 1.5);
        let err = p.register_similarity_function("broken", broken, 1.0).unwrap_err();
        assert!(err.is_contract_violation());

        assert_eq!(p.registered_functions(), vec![("constant", 1.0)]);
        assert!(p.unregister_similarity_function("constant"));
        assert!(!p.unregister_similarity_function("constant"));
    }

    #[test]
    fn test_weighted_similarity() {
        let mut p = processor();
        p.register_similarity_function("high", Arc::new(|_: &Node, _: &Node, _: &ClusteringContext| 0.9), 3.0)
            .unwrap();
        p.register_similarity_function("low", Arc::new(|_: &Node, _: &Node, _: &ClusteringContext| 0.1), 1.0)
            .unwrap();
        let (a, b) = (Node::new("a"), Node::new("b"));

        let all = p.calculate_weighted_similarity(&a, &b, &[], &ctx()).unwrap();
        assert!((all - 0.7).abs() < 1e-12);
        let low = p.calculate_weighted_similarity(&a, &b, &["low"], &ctx()).unwrap();
        assert!((low - 0.1).abs() < 1e-12);
        assert_eq!(
            p.calculate_weighted_similarity(&a, &b, &["missing"], &ctx()),
            Err(SimilarityError::UnknownFunction("missing".into()))
        );
    }

    #[test]
    fn test_zero_total_weight_scores_zero() {
        let mut p = processor();
        p.register_similarity_function("muted", Arc::new(|_: &Node, _: &Node, _: &ClusteringContext| 0.9), 0.0)
            .unwrap();
        let score = p
            .calculate_weighted_similarity(&Node::new("a"), &Node::new("b"), &[], &ctx())
            .unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_builtins_register_once() {
        let mut p = processor();
        p.register_builtins().unwrap();
        assert_eq!(p.registered_functions().len(), 3);
        assert!(p.register_builtins().is_err());
    }

    #[test]
    fn test_matrix_is_symmetric_and_complete() {
        let mut p = processor();
        let nodes: Vec<SharedNode> = [["x", "y"], ["y", "z"], ["x", "z"], ["w", "w"]]
            .iter()
            .enumerate()
            .map(|(i, tags)| Node::new(format!("n{}", i)).with_tags(*tags).shared())
            .collect();
        let matrix = p.calculate_similarity_matrix(&nodes, &JaccardSimilarity, &ctx()).unwrap();

        assert_eq!(matrix.len(), 4);
        assert_eq!(matrix.pairs_measured(), 6);
        assert_eq!(p.metrics().calculations, 6);
        for i in 0..4 {
            assert_eq!(matrix.get(i, i), 1.0);
            for j in 0..4 {
                assert_eq!(matrix.get(i, j), matrix.get(j, i));
            }
        }
        assert_eq!(matrix.score("n0", "n1"), Some(1.0 / 3.0));
        assert_eq!(matrix.score("n0", "n3"), Some(0.0));
        assert_eq!(matrix.row(0).len(), 4);
    }

    #[test]
    fn test_matrix_larger_than_cache_skips_it() {
        let mut p = SimilarityProcessor::with_config(
            VirtualClock::new().shared(),
            CacheConfig {
                capacity: 5,
                ..CacheConfig::default()
            },
            PruningConfig::default(),
        );
        let constant = |_: &Node, _: &Node, _: &ClusteringContext| 0.5;
        let four: Vec<SharedNode> = (0..4).map(|i| Node::new(format!("n{}", i)).shared()).collect();
        let matrix = p.calculate_similarity_matrix(&four, &constant, &ctx()).unwrap();

        assert_eq!(matrix.pairs_measured(), 6);
        assert_eq!(matrix.score("n0", "n3"), Some(0.5));
        let stats = p.cache_statistics();
        assert_eq!((stats.size, stats.eviction_count, stats.miss_count), (0, 0, 0));
        assert_eq!((p.metrics().calculations, p.metrics().uncached), (6, 6));

        // three pairs fit, so the smaller run goes through the cache
        let three = &four[..3];
        p.calculate_similarity_matrix(three, &constant, &ctx()).unwrap();
        assert_eq!(p.cache_statistics().size, 3);
        p.calculate_similarity_matrix(three, &constant, &ctx()).unwrap();
        assert_eq!(p.cache_statistics().hit_count, 3);
        assert_eq!(p.metrics().uncached, 6);
    }

    #[test]
    fn test_uncached_matrix_still_rejects_bad_scores() {
        let mut p = SimilarityProcessor::with_config(
            VirtualClock::new().shared(),
            CacheConfig {
                capacity: 1,
                ..CacheConfig::default()
            },
            PruningConfig::default(),
        );
        let nodes: Vec<SharedNode> = (0..3).map(|i| Node::new(format!("n{}", i)).shared()).collect();
        let too_big = |_: &Node, _: &Node, _: &ClusteringContext| 1.5;
        let err = p.calculate_similarity_matrix(&nodes, &too_big, &ctx()).unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(p.metrics().errors, 1);
    }

    #[test]
    fn test_pruned_matrix_scores_neighbours_only() {
        let mut p = SimilarityProcessor::with_config(
            VirtualClock::new().shared(),
            CacheConfig::default(),
            PruningConfig {
                enabled: true,
                threshold: 4,
                neighbors: 1,
            },
        );
        // two tight pairs far apart
        let nodes: Vec<SharedNode> = [(0.0, 0.0), (1.0, 0.0), (500.0, 0.0), (501.0, 0.0), (900.0, 900.0)]
            .iter()
            .enumerate()
            .map(|(i, (x, y))| Node::new(format!("n{}", i)).with_position(*x, *y).shared())
            .collect();
        let constant = |_: &Node, _: &Node, _: &ClusteringContext| 0.5;
        let matrix = p.calculate_similarity_matrix(&nodes, &constant, &ctx()).unwrap();

        assert!(matrix.is_pruned());
        assert!(matrix.pairs_measured() < 10);
        assert_eq!(matrix.score("n0", "n1"), Some(0.5));
        assert_eq!(matrix.score("n2", "n3"), Some(0.5));
        assert_eq!(matrix.score("n0", "n3"), Some(0.0));
    }

    #[test]
    fn test_pruning_skipped_without_positions() {
        let mut p = processor();
        p.set_pruning(PruningConfig {
            enabled: true,
            threshold: 1,
            neighbors: 1,
        });
        let nodes: Vec<SharedNode> = (0..3).map(|i| Node::new(format!("n{}", i)).shared()).collect();
        let constant = |_: &Node, _: &Node, _: &ClusteringContext| 0.5;
        let matrix = p.calculate_similarity_matrix(&nodes, &constant, &ctx()).unwrap();
        assert!(!matrix.is_pruned());
        assert_eq!(matrix.pairs_measured(), 3);
    }

    #[test]
    fn test_reset_metrics() {
        let mut p = processor();
        let f = |_: &Node, _: &Node, _: &ClusteringContext| 0.2;
        p.calculate_similarity(&Node::new("a"), &Node::new("b"), &f, &ctx()).unwrap();
        p.reset_metrics();
        assert_eq!(p.metrics(), ProcessorMetrics::default());
        assert_eq!(p.cache_statistics().size, 1);
        p.clear_cache();
        assert_eq!(p.cache_statistics().size, 0);
    }

    proptest! {
        #[test]
        fn prop_similarity_is_symmetric(
            va in proptest::collection::vec(-10.0f64..10.0, 4),
            vb in proptest::collection::vec(-10.0f64..10.0, 4),
        ) {
            let a = Node::new("a").with_vector(va);
            let b = Node::new("b").with_vector(vb);
            let functor = BuiltinSimilarity::Cosine.functor();

            let mut fresh = processor();
            let forward = fresh.calculate_similarity(&a, &b, functor.as_ref(), &ctx()).unwrap();
            let mut fresh = processor();
            let backward = fresh.calculate_similarity(&b, &a, functor.as_ref(), &ctx()).unwrap();
            prop_assert!((forward - backward).abs() < 1e-12);
            prop_assert!((0.0..=1.0).contains(&forward));
        }
    }
}
