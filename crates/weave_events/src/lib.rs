//! Typed event bus decoupling interaction output from its consumers.
//!
//! Producers (the interaction controller, the layout pipeline) publish typed
//! events; renderers and host code subscribe by topic. Between the two sit:
//!
//! - **filters**: predicates that silently drop events
//! - **middleware**: ordered per-topic stages that transform or drop events
//!   and explicitly call `next` to continue
//! - **batching**: configured topics also accumulate into [`EventBatch`]es
//!   flushed by size or age
//!
//! The bus keeps rolling event-rate and frame-rate counters and raises a
//! [`PerformanceWarning`] (topic [`PERFORMANCE_WARNING`]) when either crosses
//! its threshold.
//!
//! ```text
//! publish ──► filters ──► middleware chain ──► subscribers
//!                                         └──► batch buffer ──► batch subscribers
//! ```

mod batch;
mod bus;
mod metrics;
mod middleware;

pub use batch::{BatchConfig, EventBatch};
pub use bus::{EventBus, Topic, PERFORMANCE_WARNING};
pub use metrics::{BusStats, PerformanceThresholds, PerformanceWarning, RollingCounter};
pub use middleware::{Middleware, Next};
