//! Shared foundation for the weave graph interaction engine.
//!
//! Everything here is a leaf: pure geometry, time sources, deterministic
//! timers and the composition-based [`Emitter`]. The higher crates build on
//! these so that gesture recognition, animation and layout all run against an
//! injectable clock.
//!
//! # Architecture
//!
//! ```text
//! weave_core ──► weave_input ──┐
//!      │                       ├──► weave_interact (viewport, animation, controller)
//!      ├──► weave_events ──────┘
//!      └──► weave_layout (similarity, optimizer, pipeline)
//! ```

mod clock;
mod emitter;
mod geometry;
mod timer;

pub use clock::{Clock, SharedClock, SystemClock, VirtualClock};
pub use emitter::{panic_message, CallbackResult, Emitter, EmitterStats, ListenerId};
pub use geometry::{Bounds, Point2, Point3, Rect};
pub use timer::{Throttle, TimerQueue};

/// Node identifier shared by the interaction and layout crates.
pub type NodeId = String;

/// Frame budget at 60fps (milliseconds).
pub const FRAME_MS: f64 = 1000.0 / 60.0;

/// Default throttle interval for high-frequency emissions (milliseconds).
pub const DEFAULT_THROTTLE_MS: f64 = 16.0;
