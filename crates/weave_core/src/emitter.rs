//! Composition-based event emitter.
//!
//! Components own an `Emitter<E>` and expose typed subscribe methods instead
//! of inheriting from a base emitter. Listener failures (an `Err` or a panic)
//! are logged and counted; they never reach the code that emitted the event,
//! and the remaining listeners still run.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Result type returned by every host callback in the engine.
pub type CallbackResult = anyhow::Result<()>;

/// Handle returned by `on`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

type Listener<E> = Box<dyn FnMut(&E) -> CallbackResult>;

/// Emitter statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitterStats {
    /// Events passed to `emit`
    pub emitted: u64,
    /// Individual listener invocations that returned `Err` or panicked
    pub listener_failures: u64,
}

impl EmitterStats {
    /// Fraction of emissions that hit at least one failing listener (approximate).
    pub fn failure_rate(&self) -> f64 {
        if self.emitted == 0 {
            0.0
        } else {
            self.listener_failures as f64 / self.emitted as f64
        }
    }

    /// Healthy while fewer than 1% of emissions fail.
    pub fn is_healthy(&self) -> bool {
        self.failure_rate() < 0.01
    }
}

/// Ordered listener list for events of type `E`.
pub struct Emitter<E> {
    listeners: Vec<(ListenerId, Listener<E>)>,
    next_id: u64,
    stats: EmitterStats,
    label: &'static str,
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("label", &self.label)
            .field("listeners", &self.listeners.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new("emitter")
    }
}

impl<E> Emitter<E> {
    /// Create an emitter; `label` names it in log output.
    pub fn new(label: &'static str) -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 1,
            stats: EmitterStats::default(),
            label,
        }
    }

    /// Register a listener. Listeners run in registration order.
    pub fn on<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&E) -> CallbackResult + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        before != self.listeners.len()
    }

    /// Deliver `event` to every listener. Returns how many succeeded.
    pub fn emit(&mut self, event: &E) -> usize {
        self.stats.emitted += 1;
        let mut delivered = 0;
        for (id, listener) in self.listeners.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    self.stats.listener_failures += 1;
                    tracing::warn!(emitter = self.label, %id, error = %err, "listener failed");
                }
                Err(panic) => {
                    self.stats.listener_failures += 1;
                    tracing::warn!(
                        emitter = self.label,
                        %id,
                        panic = %panic_message(&panic),
                        "listener panicked"
                    );
                }
            }
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn stats(&self) -> EmitterStats {
        self.stats
    }
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
