//! Node importance scoring for finalized layouts.

use crate::node::SharedNode;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportanceMetrics {
    /// Distinct neighbours present in the layout, counting both directions.
    pub degree: usize,
    /// `degree / (n - 1)`.
    pub degree_centrality: f64,
    pub betweenness: f64,
    pub eigenvector: f64,
    /// Weighted blend of the three centralities, in `[0, 1]`.
    pub composite: f64,
}

/// Scores every node of a layout. Output is in input order.
pub trait ImportanceScorer: Send + Sync {
    fn score_all(&self, nodes: &[SharedNode]) -> Vec<ImportanceMetrics>;
}

/// Degree centrality from `connections`, with seeded pseudo-random
/// betweenness and eigenvector placeholders.
#[derive(Debug, Clone, Copy)]
pub struct DegreeScorer {
    seed: u64,
}

impl DegreeScorer {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Default for DegreeScorer {
    fn default() -> Self {
        Self::new(42)
    }
}

impl ImportanceScorer for DegreeScorer {
    fn score_all(&self, nodes: &[SharedNode]) -> Vec<ImportanceMetrics> {
        let index: HashMap<&str, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id.as_str(), i)).collect();
        let mut neighbours: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            for target in &node.connections {
                // dangling ids and self loops do not count
                if let Some(&j) = index.get(target.as_str()).filter(|&&j| j != i) {
                    neighbours[i].insert(j);
                    neighbours[j].insert(i);
                }
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let denom = nodes.len().saturating_sub(1).max(1) as f64;
        neighbours
            .iter()
            .map(|adjacent| {
                let degree = adjacent.len();
                let degree_centrality = (degree as f64 / denom).min(1.0);
                let betweenness = rng.gen_range(0.0..1.0) * degree_centrality;
                let eigenvector = rng.gen_range(0.0..1.0);
                ImportanceMetrics {
                    degree,
                    degree_centrality,
                    betweenness,
                    eigenvector,
                    composite: 0.5 * degree_centrality + 0.25 * betweenness + 0.25 * eigenvector,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    #[test]
    fn test_degree_counts_both_directions() {
        let nodes = vec![
            Node::new("hub").with_connections(["a", "b", "ghost", "hub"]).shared(),
            Node::new("a").shared(),
            Node::new("b").with_connections(["hub"]).shared(),
        ];
        let scores = DegreeScorer::default().score_all(&nodes);
        assert_eq!(scores.len(), 3);
        assert_eq!(scores[0].degree, 2);
        assert_eq!(scores[0].degree_centrality, 1.0);
        assert_eq!(scores[1].degree, 1);
        assert_eq!(scores[2].degree, 1);
        for s in &scores {
            assert!((0.0..=1.0).contains(&s.composite));
            assert!(s.betweenness <= s.degree_centrality);
        }
    }

    #[test]
    fn test_placeholders_are_seeded() {
        let nodes: Vec<SharedNode> = (0..5).map(|i| Node::new(format!("n{}", i)).shared()).collect();
        assert_eq!(DegreeScorer::new(9).score_all(&nodes), DegreeScorer::new(9).score_all(&nodes));
        assert!(DegreeScorer::new(1).score_all(&[]).is_empty());
    }
}
