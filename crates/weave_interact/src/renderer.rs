//! Renderer contract consumed by the controller.
//!
//! Drawing lives outside this crate. A renderer only has to accept a
//! transform and a highlight set; its [`RendererKind`] selects the
//! capability row the controller consults.

use serde::{Deserialize, Serialize};
use std::fmt;
use weave_core::NodeId;

/// Screen transform pushed to the renderer: translate by `(x, y)`, then scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

/// Rendering back-end family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    Svg,
    Canvas,
    WebGl,
}

impl RendererKind {
    pub fn capabilities(self) -> RendererCapabilities {
        match self {
            RendererKind::Svg => RendererCapabilities {
                supports_3d: false,
                recommended_max_nodes: 1_000,
                hardware_accelerated: false,
            },
            RendererKind::Canvas => RendererCapabilities {
                supports_3d: false,
                recommended_max_nodes: 10_000,
                hardware_accelerated: false,
            },
            RendererKind::WebGl => RendererCapabilities {
                supports_3d: true,
                recommended_max_nodes: 100_000,
                hardware_accelerated: true,
            },
        }
    }

    /// Cheapest back-end whose ceiling covers `node_count`, preferring 3D
    /// support when asked.
    pub fn recommend(node_count: usize, needs_3d: bool) -> RendererKind {
        [RendererKind::Svg, RendererKind::Canvas, RendererKind::WebGl]
            .into_iter()
            .find(|kind| {
                let caps = kind.capabilities();
                (!needs_3d || caps.supports_3d) && node_count <= caps.recommended_max_nodes
            })
            .unwrap_or(RendererKind::WebGl)
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RendererKind::Svg => "svg",
            RendererKind::Canvas => "canvas",
            RendererKind::WebGl => "webgl",
        };
        f.write_str(name)
    }
}

/// What a back-end can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererCapabilities {
    pub supports_3d: bool,
    pub recommended_max_nodes: usize,
    pub hardware_accelerated: bool,
}

/// Minimal renderer surface driven by the controller.
pub trait Renderer {
    fn kind(&self) -> RendererKind;

    fn set_transform(&mut self, transform: Transform);

    fn highlight_nodes(&mut self, ids: &[NodeId]);
}

/// Renderer that records every call. Useful for hosts without a display
/// and for tests.
#[derive(Debug, Clone)]
pub struct RecordingRenderer {
    kind: RendererKind,
    pub transforms: Vec<Transform>,
    pub highlights: Vec<Vec<NodeId>>,
}

impl RecordingRenderer {
    pub fn new(kind: RendererKind) -> Self {
        Self {
            kind,
            transforms: Vec::new(),
            highlights: Vec::new(),
        }
    }

    pub fn last_transform(&self) -> Option<Transform> {
        self.transforms.last().copied()
    }

    pub fn last_highlight(&self) -> Option<&[NodeId]> {
        self.highlights.last().map(Vec::as_slice)
    }
}

impl Default for RecordingRenderer {
    fn default() -> Self {
        Self::new(RendererKind::Canvas)
    }
}

impl Renderer for RecordingRenderer {
    fn kind(&self) -> RendererKind {
        self.kind
    }

    fn set_transform(&mut self, transform: Transform) {
        self.transforms.push(transform);
    }

    fn highlight_nodes(&mut self, ids: &[NodeId]) {
        self.highlights.push(ids.to_vec());
    }
}
