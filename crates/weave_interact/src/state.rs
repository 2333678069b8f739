//! Transient interaction session state.

use crate::selection::SelectionSnapshot;
use weave_core::{NodeId, Point2, Rect};

/// What the primary pointer is doing between down and up.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PointerMode {
    #[default]
    Idle,
    /// Dragging the viewport.
    Panning,
    /// Rubber-band selection from `origin` (screen space).
    Selecting { origin: Point2, current: Point2 },
    /// Pressed on a node; becomes a drag once movement passes the threshold.
    NodePressed { node: NodeId, origin: Point2 },
    /// Dragging nodes.
    Dragging { nodes: Vec<NodeId> },
}

/// Session state mutated only by the controller's handlers.
#[derive(Debug, Clone, Default)]
pub struct InteractionState {
    pub pointer: PointerMode,
    /// A one, two or multi-finger touch pan is running.
    pub touch_panning: bool,
    pub is_zooming: bool,
    pub is_animating: bool,
    pub last_pointer_position: Option<Point2>,
    /// Screen position where the primary button went down.
    pub pointer_down_position: Option<Point2>,
    pub selection: SelectionSnapshot,
    pub hovered_node: Option<NodeId>,
    pub focused_node: Option<NodeId>,
}

impl InteractionState {
    /// Mouse drag or touch pan.
    pub fn is_panning(&self) -> bool {
        matches!(self.pointer, PointerMode::Panning) || self.touch_panning
    }

    pub fn is_selecting(&self) -> bool {
        matches!(self.pointer, PointerMode::Selecting { .. })
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.pointer, PointerMode::Dragging { .. })
    }

    pub fn dragged_nodes(&self) -> &[NodeId] {
        match &self.pointer {
            PointerMode::Dragging { nodes } => nodes,
            _ => &[],
        }
    }

    /// Current rubber-band rectangle in screen space.
    pub fn selection_rect(&self) -> Option<Rect> {
        match self.pointer {
            PointerMode::Selecting { origin, current } => Some(Rect::from_corners(origin, current)),
            _ => None,
        }
    }

    /// Drop pointer-scoped state after release or cancel.
    pub fn end_pointer(&mut self) {
        self.pointer = PointerMode::Idle;
        self.pointer_down_position = None;
        self.touch_panning = false;
        self.is_zooming = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_follow_pointer_mode() {
        let mut state = InteractionState::default();
        assert!(!state.is_panning() && !state.is_selecting() && !state.is_dragging());

        state.pointer = PointerMode::Selecting {
            origin: Point2::new(10.0, 10.0),
            current: Point2::new(0.0, 30.0),
        };
        assert!(state.is_selecting());
        assert_eq!(state.selection_rect(), Some(Rect::new(0.0, 10.0, 10.0, 20.0)));

        state.pointer = PointerMode::Dragging {
            nodes: vec!["a".into()],
        };
        assert_eq!(state.dragged_nodes(), ["a".to_string()]);

        state.end_pointer();
        assert_eq!(state.pointer, PointerMode::Idle);
        assert!(state.dragged_nodes().is_empty());
    }

    #[test]
    fn test_touch_pan_counts_as_panning() {
        let mut state = InteractionState {
            touch_panning: true,
            ..InteractionState::default()
        };
        assert!(state.is_panning());
        assert_eq!(state.pointer, PointerMode::Idle);
        state.end_pointer();
        assert!(!state.is_panning());
    }
}
