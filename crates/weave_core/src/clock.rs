//! Time sources.
//!
//! Every timestamp in the engine is a millisecond `f64` read from a [`Clock`].
//! Production code uses [`SystemClock`]; tests inject a [`VirtualClock`] and
//! advance it by hand so gesture timers and animations are deterministic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic millisecond time source.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary, fixed origin.
    fn now_ms(&self) -> f64;
}

/// Shared handle to any clock.
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock backed by `instant::Instant` (works on wasm32 too).
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: instant::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: instant::Instant::now(),
        }
    }

    /// Convenience constructor for a shared handle.
    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Manually advanced clock. Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    bits: Arc<AtomicU64>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    pub fn starting_at(ms: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(ms.to_bits())),
        }
    }

    /// Move time forward by `ms`.
    pub fn advance(&self, ms: f64) {
        let now = self.now_ms();
        self.set(now + ms);
    }

    /// Jump to an absolute time.
    pub fn set(&self, ms: f64) {
        self.bits.store(ms.to_bits(), Ordering::SeqCst);
    }

    /// Shared handle pointing at this clock.
    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}
