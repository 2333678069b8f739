//! Spatial optimizer.
//!
//! Turns a [`SimilarityMatrix`] into positions inside the layout bounds with
//! a damped force model:
//! - inverse-square repulsion between every pair
//! - springs between similar pairs, resting closer the more similar they are
//! - a weak pull towards the center of the bounds
//!
//! Forces are scaled by the context's cooling `alpha`. The run stops when the
//! mean per-node movement drops below `convergence_threshold` or after
//! `max_iterations`.

use crate::config::{Dimensions, LayoutBounds, OptimizerConfig};
use crate::context::ClusteringContext;
use crate::node::SharedNode;
use crate::processor::SimilarityMatrix;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use weave_core::Point3;

const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

/// How much further than `ideal_distance` a fully dissimilar spring rests.
const DISSIMILAR_STRETCH: f64 = 2.0;

/// Floor on iterations when `pair_budget` cuts a large layout short.
const MIN_BUDGETED_ITERATIONS: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Positions in node order.
    pub positions: Vec<Point3>,
    pub iterations: usize,
    /// `1 / (1 + mean movement)` of the last iteration; 1.0 means still.
    pub stability: f64,
    pub converged: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SpatialOptimizer {
    config: OptimizerConfig,
}

impl SpatialOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Iteration cap for `n` nodes: `max_iterations`, lowered so the run
    /// stays within `pair_budget` pair evaluations.
    pub fn iteration_limit(&self, n: usize) -> usize {
        let pairs = n * n.saturating_sub(1) / 2;
        if pairs == 0 {
            return self.config.max_iterations;
        }
        (self.config.pair_budget / pairs)
            .max(MIN_BUDGETED_ITERATIONS)
            .min(self.config.max_iterations)
    }

    /// Seed positions where nodes carry one, otherwise a jittered golden-angle
    /// spiral around the center. 3D layouts get a random Z.
    pub fn initial_positions(
        &self,
        nodes: &[SharedNode],
        bounds: &LayoutBounds,
        dimensions: Dimensions,
        rng: &mut StdRng,
    ) -> Vec<Point3> {
        let center = bounds.center();
        let max_radius = bounds.width.min(bounds.height) * 0.4;
        let (z_min, z_max) = bounds.z_range();
        nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                if let Some(seed) = node.position {
                    return bounds.clamp(seed, dimensions);
                }
                let angle = i as f64 * GOLDEN_ANGLE;
                let radius = max_radius * ((i as f64 + 0.5) / nodes.len() as f64).sqrt();
                let jitter = rng.gen_range(-1.0..1.0);
                let z = if dimensions.is_3d() { rng.gen_range(z_min..=z_max) } else { 0.0 };
                let p = Point3::new(
                    center.x + (radius + jitter) * angle.cos(),
                    center.y + (radius + jitter) * angle.sin(),
                    z,
                );
                bounds.clamp(p, dimensions)
            })
            .collect()
    }

    /// Run the force model to convergence, advancing `ctx` once per iteration.
    pub fn optimize(
        &self,
        nodes: &[SharedNode],
        matrix: &SimilarityMatrix,
        ctx: &mut ClusteringContext,
        rng: &mut StdRng,
    ) -> OptimizationResult {
        let dimensions = ctx.dimensions();
        let bounds = ctx.bounds();
        let mut positions = self.initial_positions(nodes, &bounds, dimensions, rng);
        let n = positions.len();
        if n == 0 {
            return OptimizationResult {
                positions,
                iterations: 0,
                stability: 1.0,
                converged: true,
            };
        }

        let cfg = &self.config;
        let center = bounds.center();
        let mut velocities = vec![Point3::ZERO; n];
        let mut mean_movement = f64::MAX;
        let mut iterations = 0;
        let mut converged = false;
        let limit = self.iteration_limit(n);

        while iterations < limit {
            let forces = self.calculate_forces(&positions, matrix, center, dimensions);

            let mut total_movement = 0.0;
            for i in 0..n {
                let mut velocity = (velocities[i] + forces[i] * ctx.alpha) * cfg.damping;
                let speed = velocity.length();
                if speed > cfg.max_step {
                    velocity = velocity * (cfg.max_step / speed);
                }
                let next = bounds.clamp(positions[i] + velocity, dimensions);
                total_movement += next.distance(positions[i]);
                // wall hits bleed off the blocked component
                velocities[i] = next - positions[i];
                positions[i] = next;
            }

            ctx.advance();
            iterations += 1;
            mean_movement = total_movement / n as f64;
            tracing::trace!(iteration = iterations, mean_movement, alpha = ctx.alpha, "optimizer step");
            if mean_movement < cfg.convergence_threshold {
                converged = true;
                break;
            }
        }

        let stability = 1.0 / (1.0 + mean_movement);
        tracing::debug!(nodes = n, iterations, limit, converged, stability, "spatial optimization finished");
        OptimizationResult {
            positions,
            iterations,
            stability,
            converged,
        }
    }

    fn calculate_forces(
        &self,
        positions: &[Point3],
        matrix: &SimilarityMatrix,
        center: Point3,
        dimensions: Dimensions,
    ) -> Vec<Point3> {
        let cfg = &self.config;
        let n = positions.len();
        let mut forces = vec![Point3::ZERO; n];

        for i in 0..n {
            let row = matrix.row(i);
            for j in (i + 1)..n {
                let delta = positions[i] - positions[j];
                let raw = delta.length();
                let direction = if raw > f64::EPSILON {
                    delta / raw
                } else {
                    // coincident nodes separate along a fixed per-pair angle
                    let angle = (i * n + j) as f64 * GOLDEN_ANGLE;
                    Point3::new(angle.cos(), angle.sin(), 0.0)
                };
                let dist = raw.max(cfg.min_distance);

                let repulsion = direction * (cfg.repulsion / (dist * dist));
                forces[i] += repulsion;
                forces[j] -= repulsion;

                let similarity = row[j];
                if similarity > 0.0 {
                    let rest = cfg.ideal_distance * (1.0 + DISSIMILAR_STRETCH * (1.0 - similarity));
                    let spring = direction * (cfg.attraction * similarity * (dist - rest));
                    forces[i] -= spring;
                    forces[j] += spring;
                }
            }
        }

        for (force, p) in forces.iter_mut().zip(positions) {
            *force += (center - *p) * cfg.center_attraction;
            if !dimensions.is_3d() {
                force.z = 0.0;
            }
        }
        forces
    }
}
