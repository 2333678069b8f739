//! Spatial index for hit testing positioned nodes.
//!
//! [`RTreeIndex`] gives O(log n) point and region lookups via `rstar`;
//! [`LinearIndex`] is the scan fallback used when no index is injected.
//! Both implement [`SpatialIndex`] with identical hit semantics, so a
//! controller behaves the same either way:
//!
//! - point query: `distance(point, center) <= radius + tolerance`
//! - region query: the node's circle intersects the rectangle
//!
//! Point results are ordered nearest first (ties by id), region results by id.

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use weave_core::{NodeId, Point2, Rect};

/// Radius assumed for nodes that do not carry one.
pub const DEFAULT_NODE_RADIUS: f64 = 10.0;

/// Host-owned node position used for spatial queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedNode {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

impl PositionedNode {
    pub fn new(id: impl Into<NodeId>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            z: None,
            radius: None,
        }
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn with_z(mut self, z: f64) -> Self {
        self.z = Some(z);
        self
    }

    pub fn center(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }

    pub fn effective_radius(&self) -> f64 {
        self.radius.unwrap_or(DEFAULT_NODE_RADIUS).max(0.0)
    }

    /// Distance from `point` to the node's edge (0 inside).
    pub fn edge_distance(&self, point: Point2) -> f64 {
        (self.center().distance(point) - self.effective_radius()).max(0.0)
    }

    pub fn hit_by(&self, point: Point2, tolerance: f64) -> bool {
        self.center().distance(point) <= self.effective_radius() + tolerance
    }

    /// True if the node's circle touches `rect`.
    pub fn intersects_rect(&self, rect: &Rect) -> bool {
        let min = rect.min();
        let max = rect.max();
        let nearest = Point2::new(self.x.clamp(min.x, max.x), self.y.clamp(min.y, max.y));
        nearest.distance(self.center()) <= self.effective_radius()
    }

    fn envelope(&self) -> AABB<[f64; 2]> {
        let r = self.effective_radius();
        AABB::from_corners([self.x - r, self.y - r], [self.x + r, self.y + r])
    }
}

/// Spatial lookup over one snapshot of positioned nodes.
pub trait SpatialIndex {
    /// Replace the indexed snapshot.
    fn build(&mut self, nodes: &[PositionedNode]);

    /// Nodes hit by `point` with `tolerance`, nearest first.
    fn query_point(&self, point: Point2, tolerance: f64) -> Vec<&PositionedNode>;

    /// Nodes whose circle intersects `rect`, ordered by id.
    fn query_region(&self, rect: &Rect) -> Vec<&PositionedNode>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nodes crossed by the segment `origin + t * direction`, `t ∈ [0, max_distance]`,
    /// ordered by distance along the ray.
    fn query_ray(&self, origin: Point2, direction: Point2, max_distance: f64) -> Vec<&PositionedNode> {
        let len = direction.length();
        if len == 0.0 || !max_distance.is_finite() || max_distance <= 0.0 {
            return Vec::new();
        }
        let dir = direction / len;
        let end = origin + dir * max_distance;
        let sweep = Rect::from_corners(origin, end);

        let mut hits: Vec<(f64, &PositionedNode)> = self
            .query_region(&sweep.expand(self.max_radius()))
            .into_iter()
            .filter_map(|node| {
                let along = ((node.center() - origin).x * dir.x + (node.center() - origin).y * dir.y)
                    .clamp(0.0, max_distance);
                let closest = origin + dir * along;
                (closest.distance(node.center()) <= node.effective_radius()).then_some((along, node))
            })
            .collect();
        hits.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then_with(|| a.1.id.cmp(&b.1.id)));
        hits.into_iter().map(|(_, n)| n).collect()
    }

    /// Largest node radius in the snapshot.
    fn max_radius(&self) -> f64;
}

fn sort_nearest(point: Point2, hits: &mut [&PositionedNode]) {
    hits.sort_by(|a, b| {
        a.edge_distance(point)
            .partial_cmp(&b.edge_distance(point))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn max_radius_of<'a>(nodes: impl Iterator<Item = &'a PositionedNode>) -> f64 {
    nodes.map(PositionedNode::effective_radius).fold(0.0, f64::max)
}

// =============================================================================
// R-TREE INDEX
// =============================================================================

#[derive(Debug, Clone)]
struct Entry(PositionedNode);

impl RTreeObject for Entry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.0.envelope()
    }
}

impl PointDistance for Entry {
    /// Squared distance to the node center.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let (dx, dy) = (self.0.x - point[0], self.0.y - point[1]);
        dx * dx + dy * dy
    }
}

/// R-tree backed index.
#[derive(Clone, Default)]
pub struct RTreeIndex {
    tree: RTree<Entry>,
    max_radius: f64,
}

impl std::fmt::Debug for RTreeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RTreeIndex")
            .field("count", &self.tree.size())
            .finish_non_exhaustive()
    }
}

impl RTreeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: &[PositionedNode]) -> Self {
        let mut index = Self::new();
        index.build(nodes);
        index
    }

    pub fn find_by_id(&self, id: &str) -> Option<&PositionedNode> {
        self.tree.iter().map(|e| &e.0).find(|n| n.id == id)
    }

    /// The `n` nodes whose centers are nearest to `point`.
    pub fn nearest_n(&self, point: Point2, n: usize) -> Vec<&PositionedNode> {
        self.tree
            .nearest_neighbor_iter(&[point.x, point.y])
            .take(n)
            .map(|e| &e.0)
            .collect()
    }
}

impl SpatialIndex for RTreeIndex {
    fn build(&mut self, nodes: &[PositionedNode]) {
        self.max_radius = max_radius_of(nodes.iter());
        self.tree = RTree::bulk_load(nodes.iter().cloned().map(Entry).collect());
    }

    fn query_point(&self, point: Point2, tolerance: f64) -> Vec<&PositionedNode> {
        let t = tolerance.max(0.0);
        let search = AABB::from_corners([point.x - t, point.y - t], [point.x + t, point.y + t]);
        let mut hits: Vec<&PositionedNode> = self
            .tree
            .locate_in_envelope_intersecting(&search)
            .map(|e| &e.0)
            .filter(|n| n.hit_by(point, t))
            .collect();
        sort_nearest(point, &mut hits);
        hits
    }

    fn query_region(&self, rect: &Rect) -> Vec<&PositionedNode> {
        let min = rect.min();
        let max = rect.max();
        let search = AABB::from_corners([min.x, min.y], [max.x, max.y]);
        let mut hits: Vec<&PositionedNode> = self
            .tree
            .locate_in_envelope_intersecting(&search)
            .map(|e| &e.0)
            .filter(|n| n.intersects_rect(rect))
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        hits
    }

    fn len(&self) -> usize {
        self.tree.size()
    }

    fn max_radius(&self) -> f64 {
        self.max_radius
    }
}

// =============================================================================
// LINEAR FALLBACK
// =============================================================================

/// Scan-based index with the same results as [`RTreeIndex`].
#[derive(Debug, Clone, Default)]
pub struct LinearIndex {
    nodes: Vec<PositionedNode>,
}

impl LinearIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: &[PositionedNode]) -> Self {
        Self {
            nodes: nodes.to_vec(),
        }
    }
}

impl SpatialIndex for LinearIndex {
    fn build(&mut self, nodes: &[PositionedNode]) {
        self.nodes = nodes.to_vec();
    }

    fn query_point(&self, point: Point2, tolerance: f64) -> Vec<&PositionedNode> {
        let t = tolerance.max(0.0);
        let mut hits: Vec<&PositionedNode> = self.nodes.iter().filter(|n| n.hit_by(point, t)).collect();
        sort_nearest(point, &mut hits);
        hits
    }

    fn query_region(&self, rect: &Rect) -> Vec<&PositionedNode> {
        let mut hits: Vec<&PositionedNode> = self.nodes.iter().filter(|n| n.intersects_rect(rect)).collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        hits
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn max_radius(&self) -> f64 {
        max_radius_of(self.nodes.iter())
    }
}
