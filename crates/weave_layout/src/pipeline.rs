//! Layout pipeline.
//!
//! Runs a layout in four phases, each inside its own `tracing` span and each
//! announced with a [`LayoutEvent::Progress`]:
//!
//! ```text
//! initialization ─► similarity ─► optimization ─► finalization ─► layoutComplete
//!   context          matrix        positions       enhanced nodes
//! ```
//!
//! [`LayoutPipeline::calculate_layout_async`] never fails: errors from any
//! phase come back as `status.success == false` with the message in
//! `status.errors`.

use crate::config::{Dimensions, LayoutConfig};
use crate::context::ClusteringContext;
use crate::error::LayoutError;
use crate::functor::{validate_functor, SharedFunctor};
use crate::importance::{DegreeScorer, ImportanceMetrics, ImportanceScorer};
use crate::node::SharedNode;
use crate::optimizer::SpatialOptimizer;
use crate::processor::{ProcessorMetrics, SimilarityProcessor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use weave_core::{CallbackResult, Emitter, ListenerId, NodeId, Point3, SharedClock, SystemClock};
use weave_events::Topic;

/// Estimated per-node overhead of a spatial index over the result.
const SPATIAL_INDEX_ENTRY_BYTES: usize = 64;

// =============================================================================
// EVENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutPhase {
    Initialization,
    Similarity,
    Optimization,
    Finalization,
}

impl LayoutPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutPhase::Initialization => "initialization",
            LayoutPhase::Similarity => "similarity",
            LayoutPhase::Optimization => "optimization",
            LayoutPhase::Finalization => "finalization",
        }
    }
}

impl fmt::Display for LayoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutProgress {
    pub phase: LayoutPhase,
    /// Percent complete, 0 to 100.
    pub progress: f64,
    pub nodes_processed: usize,
    pub total_nodes: usize,
    pub time_elapsed_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LayoutEvent {
    #[serde(rename = "layoutProgress")]
    Progress(LayoutProgress),
    #[serde(rename = "layoutComplete", rename_all = "camelCase")]
    Complete {
        total_duration_ms: f64,
        final_stability: f64,
        total_nodes: usize,
        total_iterations: usize,
    },
}

impl Topic for LayoutEvent {
    fn topic(&self) -> &'static str {
        match self {
            LayoutEvent::Progress(_) => "layoutProgress",
            LayoutEvent::Complete { .. } => "layoutComplete",
        }
    }
}

// =============================================================================
// RESULT
// =============================================================================

/// A laid-out node. `original_node` is the caller's own `Arc`.
#[derive(Debug, Clone)]
pub struct EnhancedLayoutNode {
    pub id: NodeId,
    pub original_node: SharedNode,
    pub position: Point3,
    /// Non-zero scores against other nodes.
    pub similarity_scores: BTreeMap<NodeId, f64>,
    pub importance: ImportanceMetrics,
    /// The optimizer converged before its iteration cap.
    pub is_stable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutStatus {
    pub success: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryEstimate {
    pub coordinates: usize,
    pub cache: usize,
    pub spatial_index: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutMetrics {
    pub duration_ms: f64,
    /// Functor invocations during this run.
    pub calculations: u64,
    pub cache_hit_rate: f64,
    pub iterations: usize,
    pub stability: f64,
    pub converged: bool,
    pub memory: MemoryEstimate,
}

#[derive(Debug, Clone)]
pub struct LayoutResult {
    pub nodes: Vec<EnhancedLayoutNode>,
    pub status: LayoutStatus,
    pub metrics: LayoutMetrics,
    pub dimensions: Dimensions,
}

impl LayoutResult {
    fn failed(error: String, dimensions: Dimensions, duration_ms: f64) -> Self {
        Self {
            nodes: Vec::new(),
            status: LayoutStatus {
                success: false,
                errors: vec![error],
                warnings: Vec::new(),
            },
            metrics: LayoutMetrics {
                duration_ms,
                ..LayoutMetrics::default()
            },
            dimensions,
        }
    }

    pub fn node(&self, id: &str) -> Option<&EnhancedLayoutNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Position change of one node during a dimension switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionDelta {
    pub id: NodeId,
    pub from: Point3,
    pub to: Point3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionTransition {
    pub from: Dimensions,
    pub to: Dimensions,
    pub changed: bool,
    pub deltas: Vec<PositionDelta>,
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Yields once to the executor between phases.
struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

fn yield_now() -> YieldNow {
    YieldNow(false)
}

pub struct LayoutPipeline {
    config: Arc<LayoutConfig>,
    clock: SharedClock,
    processor: SimilarityProcessor,
    optimizer: SpatialOptimizer,
    scorer: Box<dyn ImportanceScorer>,
    events: Emitter<LayoutEvent>,
    last_result: Option<LayoutResult>,
    last_functor: Option<SharedFunctor>,
    dimensions: Dimensions,
    rng: StdRng,
}

impl fmt::Debug for LayoutPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutPipeline")
            .field("config", &self.config)
            .field("dimensions", &self.dimensions)
            .field("processor", &self.processor)
            .field("has_result", &self.last_result.is_some())
            .finish_non_exhaustive()
    }
}

impl LayoutPipeline {
    pub fn new(config: LayoutConfig, clock: SharedClock) -> Result<Self, LayoutError> {
        config.validate()?;
        let processor = SimilarityProcessor::with_config(clock.clone(), config.cache, config.pruning);
        Ok(Self {
            optimizer: SpatialOptimizer::new(config.optimizer),
            scorer: Box::new(DegreeScorer::new(config.seed)),
            events: Emitter::new("layout"),
            last_result: None,
            last_functor: None,
            dimensions: config.dimensions,
            rng: StdRng::seed_from_u64(config.seed),
            config: Arc::new(config),
            clock,
            processor,
        })
    }

    pub fn with_system_clock(config: LayoutConfig) -> Result<Self, LayoutError> {
        Self::new(config, SystemClock::shared())
    }

    pub fn with_scorer(mut self, scorer: Box<dyn ImportanceScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn processor(&self) -> &SimilarityProcessor {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut SimilarityProcessor {
        &mut self.processor
    }

    pub fn current_dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn last_result(&self) -> Option<&LayoutResult> {
        self.last_result.as_ref()
    }

    pub fn on_event<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&LayoutEvent) -> CallbackResult + 'static,
    {
        self.events.on(listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    // =========================================================================
    // LAYOUT
    // =========================================================================

    /// Lay out `nodes` using `functor` for pairwise similarity.
    pub async fn calculate_layout_async(&mut self, nodes: Vec<SharedNode>, functor: SharedFunctor) -> LayoutResult {
        let started = self.clock.now_ms();
        let dimensions = self.dimensions;
        match self.run(&nodes, functor, started).await {
            Ok(result) => {
                self.last_result = Some(result.clone());
                result
            }
            Err(err) => {
                let duration_ms = self.clock.now_ms() - started;
                tracing::warn!(error = %err, nodes = nodes.len(), "layout failed");
                LayoutResult::failed(err.to_string(), dimensions, duration_ms)
            }
        }
    }

    fn progress(&mut self, phase: LayoutPhase, progress: f64, processed: usize, total: usize, started: f64) {
        self.events.emit(&LayoutEvent::Progress(LayoutProgress {
            phase,
            progress,
            nodes_processed: processed,
            total_nodes: total,
            time_elapsed_ms: self.clock.now_ms() - started,
        }));
    }

    async fn run(
        &mut self,
        nodes: &[SharedNode],
        functor: SharedFunctor,
        started: f64,
    ) -> Result<LayoutResult, LayoutError> {
        let total = nodes.len();
        let mut warnings = Vec::new();

        // ===== INITIALIZATION =====
        let mut ctx = {
            let _span = tracing::info_span!("layout_initialization", nodes = total).entered();
            let mut seen = HashSet::with_capacity(total);
            for node in nodes {
                node.validate()?;
                if !seen.insert(node.id.as_str()) {
                    return Err(LayoutError::DuplicateNode(node.id.clone()));
                }
            }
            if total == 0 {
                warnings.push("no nodes to lay out".to_string());
            }
            if !self.last_functor.as_ref().is_some_and(|last| Arc::ptr_eq(last, &functor)) {
                self.processor.clear_cache();
            }
            self.last_functor = Some(functor.clone());

            let mut run_config = (*self.config).clone();
            run_config.dimensions = self.dimensions;
            ClusteringContext::new(Arc::new(run_config))
        };
        self.progress(LayoutPhase::Initialization, 10.0, 0, total, started);
        yield_now().await;

        // ===== SIMILARITY =====
        let before: ProcessorMetrics = self.processor.metrics();
        let matrix = {
            let _span = tracing::info_span!("layout_similarity", nodes = total).entered();
            validate_functor(functor.as_ref())?;
            self.processor.calculate_similarity_matrix(nodes, functor.as_ref(), &ctx)?
        };
        let after = self.processor.metrics();
        self.progress(LayoutPhase::Similarity, 40.0, total, total, started);
        yield_now().await;

        // ===== OPTIMIZATION =====
        let optimized = {
            let _span = tracing::info_span!("layout_optimization", nodes = total).entered();
            let mut rng = StdRng::seed_from_u64(self.config.seed);
            self.optimizer.optimize(nodes, &matrix, &mut ctx, &mut rng)
        };
        if !optimized.converged {
            warnings.push(format!(
                "optimizer stopped after {} iterations without converging (stability {:.3})",
                optimized.iterations, optimized.stability
            ));
        }
        self.progress(LayoutPhase::Optimization, 80.0, total, total, started);
        yield_now().await;

        // ===== FINALIZATION =====
        let result = {
            let _span = tracing::info_span!("layout_finalization", nodes = total).entered();
            let importance = self.scorer.score_all(nodes);
            let enhanced: Vec<EnhancedLayoutNode> = nodes
                .iter()
                .zip(optimized.positions.iter().copied())
                .zip(importance)
                .enumerate()
                .map(|(i, ((node, position), importance))| EnhancedLayoutNode {
                    id: node.id.clone(),
                    original_node: Arc::clone(node),
                    position,
                    similarity_scores: matrix
                        .ids()
                        .iter()
                        .zip(matrix.row(i))
                        .filter(|(id, score)| **id != node.id && **score > 0.0)
                        .map(|(id, score)| (id.clone(), *score))
                        .collect(),
                    importance,
                    is_stable: optimized.converged,
                })
                .collect();

            let coordinates = total * std::mem::size_of::<Point3>();
            let cache = self.processor.cache_memory_estimate();
            let spatial_index = total * SPATIAL_INDEX_ENTRY_BYTES;
            let hits = after.cache_hits - before.cache_hits;
            let lookups = hits + after.cache_misses - before.cache_misses;

            LayoutResult {
                nodes: enhanced,
                status: LayoutStatus {
                    success: true,
                    errors: Vec::new(),
                    warnings,
                },
                metrics: LayoutMetrics {
                    duration_ms: self.clock.now_ms() - started,
                    calculations: after.calculations - before.calculations,
                    cache_hit_rate: if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 },
                    iterations: optimized.iterations,
                    stability: optimized.stability,
                    converged: optimized.converged,
                    memory: MemoryEstimate {
                        coordinates,
                        cache,
                        spatial_index,
                        total: coordinates + cache + spatial_index,
                    },
                },
                dimensions: ctx.dimensions(),
            }
        };
        self.progress(LayoutPhase::Finalization, 100.0, total, total, started);
        self.events.emit(&LayoutEvent::Complete {
            total_duration_ms: result.metrics.duration_ms,
            final_stability: result.metrics.stability,
            total_nodes: total,
            total_iterations: result.metrics.iterations,
        });
        tracing::info!(
            nodes = total,
            iterations = result.metrics.iterations,
            stability = result.metrics.stability,
            duration_ms = result.metrics.duration_ms,
            "layout complete"
        );
        Ok(result)
    }

    // =========================================================================
    // DIMENSIONS
    // =========================================================================

    /// Move the pipeline, and the last layout if there is one, to 2 or 3
    /// dimensions. Going to 2D flattens Z; going to 3D assigns each node a
    /// pseudo-random Z within the depth range. Without a previous layout only
    /// the dimensions of the next run change.
    pub async fn switch_dimensions_async(&mut self, target: u8) -> Result<DimensionTransition, LayoutError> {
        let target = Dimensions::try_from(target)?;
        let from = self.dimensions;
        if from == target {
            return Ok(DimensionTransition {
                from,
                to: target,
                changed: false,
                deltas: Vec::new(),
            });
        }
        let (z_min, z_max) = self.config.bounds.z_range();
        let Some(result) = self.last_result.as_mut() else {
            self.dimensions = target;
            tracing::info!(%from, to = %target, "layout dimensions switched before first layout");
            return Ok(DimensionTransition {
                from,
                to: target,
                changed: true,
                deltas: Vec::new(),
            });
        };

        let mut deltas = Vec::with_capacity(result.nodes.len());
        for node in result.nodes.iter_mut() {
            let before = node.position;
            let z = if target.is_3d() { self.rng.gen_range(z_min..=z_max) } else { 0.0 };
            node.position = Point3 { z, ..before };
            deltas.push(PositionDelta {
                id: node.id.clone(),
                from: before,
                to: node.position,
            });
        }
        result.dimensions = target;
        self.dimensions = target;
        tracing::info!(%from, to = %target, nodes = deltas.len(), "layout dimensions switched");
        yield_now().await;

        Ok(DimensionTransition {
            from,
            to: target,
            changed: true,
            deltas,
        })
    }
}
