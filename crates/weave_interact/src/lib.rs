//! Renderer-agnostic interaction layer for the weave graph view.
//!
//! The [`InteractionController`] turns raw host input into viewport changes,
//! selection changes and node events, animating transitions through the
//! [`AnimationSystem`] and pushing the resulting transform to whatever
//! [`Renderer`] the host plugs in.
//!
//! # Architecture
//!
//! ```text
//!   RawInput ──► InteractionController ──────────────► Renderer
//!                 │    │         │      set_transform / highlight_nodes
//!                 │    │         │
//!                 │    │         └──► InteractionEvent ──► listeners / EventBus
//!                 │    │
//!                 │    ├──► GestureRecognizer (touch & pointer classification)
//!                 │    ├──► SpatialIndex (R-tree or linear hit testing)
//!                 │    └──► SelectionSnapshot (copy-on-write)
//!                 │
//!                 └──► AnimationSystem ──► ViewportState (zoom, pan, limits)
//!                         tick()            world ⇄ screen transforms
//! ```
//!
//! All time is read from an injected [`weave_core::Clock`], so every
//! interaction can be replayed deterministically with a `VirtualClock`.

mod animation;
mod config;
mod controller;
mod easing;
mod error;
mod events;
mod interpolate;
mod renderer;
mod selection;
mod spatial;
mod state;
mod viewport;

pub use animation::{
    AnimationCallbacks, AnimationConfig, AnimationHandle, AnimationOutcome, AnimationSystem,
    MIN_PAN_CHANGE, MIN_ZOOM_CHANGE, VIEWPORT_PAN_ANIMATION, VIEWPORT_TRANSFORM_ANIMATION,
    VIEWPORT_ZOOM_ANIMATION,
};
pub use config::{
    AccessibilityConfig, AnimationDefaults, BehaviorConfig, FeatureConfig, InteractionConfig,
    ShortcutConfig, ViewportConfig,
};
pub use controller::InteractionController;
pub use easing::Easing;
pub use error::InteractionError;
pub use events::{
    InteractionEvent, ViewportChangeReason, ANNOUNCEMENT, NODE_CLICK, NODE_DRAG, NODE_DRAG_END,
    NODE_HOVER, SELECTION_CHANGE, VIEWPORT_CHANGE,
};
pub use interpolate::{AnimValue, Interpolate};
pub use renderer::{RecordingRenderer, Renderer, RendererCapabilities, RendererKind, Transform};
pub use selection::{SelectionDiff, SelectionMode, SelectionSnapshot};
pub use spatial::{LinearIndex, PositionedNode, RTreeIndex, SpatialIndex, DEFAULT_NODE_RADIUS};
pub use state::{InteractionState, PointerMode};
pub use viewport::{
    PanBounds, SharedViewport, ViewportSnapshot, ViewportState, DEFAULT_FIT_PADDING,
    DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM,
};

/// Default transition length (milliseconds).
pub const DEFAULT_ANIMATION_MS: f64 = 300.0;
