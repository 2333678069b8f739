//! Layout input nodes.
//!
//! Nodes are shared as [`SharedNode`] (`Arc<Node>`) so layout results can hand
//! back the caller's own node and identity is preserved end to end.

use crate::error::SimilarityError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use weave_core::{NodeId, Point3};

pub type SharedNode = Arc<Node>;

/// Free-form node metadata. `tags` feeds the Jaccard similarity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeMetadata {
    pub tags: BTreeSet<String>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// A graph node as supplied to the layout pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    pub id: NodeId,
    pub label: Option<String>,
    /// Feature vector for cosine similarity.
    pub vector: Option<Vec<f64>>,
    pub metadata: NodeMetadata,
    /// Seed position; used by spatial similarity, pruning and as the
    /// optimizer's starting point.
    pub position: Option<Point3>,
    /// Ids of adjacent nodes.
    pub connections: Vec<NodeId>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_vector(mut self, vector: impl Into<Vec<f64>>) -> Self {
        self.vector = Some(vector.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.attributes.insert(key.into(), value);
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Point3::new(x, y, 0.0));
        self
    }

    pub fn with_position_3d(mut self, position: Point3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_connections<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.connections = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn shared(self) -> SharedNode {
        Arc::new(self)
    }

    pub fn degree(&self) -> usize {
        self.connections.len()
    }

    /// Reject nodes that cannot take part in a similarity calculation.
    pub fn validate(&self) -> Result<(), SimilarityError> {
        if self.id.is_empty() {
            return Err(SimilarityError::InvalidInput("node id must not be empty".into()));
        }
        if let Some(vector) = &self.vector {
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(SimilarityError::InvalidInput(format!(
                    "node {} has a non-finite vector component",
                    self.id
                )));
            }
        }
        if let Some(position) = self.position {
            if !position.is_finite() {
                return Err(SimilarityError::InvalidInput(format!(
                    "node {} has a non-finite position",
                    self.id
                )));
            }
        }
        Ok(())
    }
}
