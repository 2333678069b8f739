//! Events published by the interaction controller.

use crate::viewport::ViewportSnapshot;
use serde::{Deserialize, Serialize};
use weave_core::{NodeId, Point2};
use weave_events::Topic;
use weave_input::{GestureEvent, KeyModifiers};

pub const VIEWPORT_CHANGE: &str = "viewportChange";
pub const SELECTION_CHANGE: &str = "selectionChange";
pub const NODE_CLICK: &str = "nodeClick";
pub const NODE_HOVER: &str = "nodeHover";
pub const NODE_DRAG: &str = "nodeDrag";
pub const NODE_DRAG_END: &str = "nodeDragEnd";
pub const ANNOUNCEMENT: &str = "announcement";

/// Why the viewport changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportChangeReason {
    Pan,
    Zoom,
    Reset,
    Fit,
    Programmatic,
}

/// Controller output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InteractionEvent {
    ViewportChange {
        viewport: ViewportSnapshot,
        previous: ViewportSnapshot,
        reason: ViewportChangeReason,
    },
    SelectionChange {
        selected: Vec<NodeId>,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    NodeClick {
        node: NodeId,
        /// Screen position of the click.
        position: Point2,
        modifiers: KeyModifiers,
    },
    /// Hovered node changed; `node` is `None` when the pointer left all nodes.
    NodeHover {
        node: Option<NodeId>,
        previous: Option<NodeId>,
    },
    NodeDrag {
        nodes: Vec<NodeId>,
        /// Movement since the previous drag event, in world units.
        world_delta: Point2,
    },
    NodeDragEnd {
        nodes: Vec<NodeId>,
    },
    /// Recognized gesture, forwarded as-is.
    Gesture(GestureEvent),
    /// Human-readable message for assistive technology.
    Announcement {
        message: String,
    },
}

impl Topic for InteractionEvent {
    fn topic(&self) -> &'static str {
        match self {
            InteractionEvent::ViewportChange { .. } => VIEWPORT_CHANGE,
            InteractionEvent::SelectionChange { .. } => SELECTION_CHANGE,
            InteractionEvent::NodeClick { .. } => NODE_CLICK,
            InteractionEvent::NodeHover { .. } => NODE_HOVER,
            InteractionEvent::NodeDrag { .. } => NODE_DRAG,
            InteractionEvent::NodeDragEnd { .. } => NODE_DRAG_END,
            InteractionEvent::Gesture(ev) => ev.kind().event_name(),
            InteractionEvent::Announcement { .. } => ANNOUNCEMENT,
        }
    }
}
