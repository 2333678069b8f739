//! Rolling rate counters and performance thresholds.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Rolling window length for rate counters (milliseconds).
pub const RATE_WINDOW_MS: f64 = 1000.0;

/// Counts timestamps inside a sliding window.
#[derive(Debug, Clone)]
pub struct RollingCounter {
    window_ms: f64,
    stamps: VecDeque<f64>,
    first_seen: Option<f64>,
}

impl RollingCounter {
    pub fn new(window_ms: f64) -> Self {
        Self {
            window_ms,
            stamps: VecDeque::new(),
            first_seen: None,
        }
    }

    pub fn record(&mut self, now: f64) {
        self.first_seen.get_or_insert(now);
        self.stamps.push_back(now);
        self.prune(now);
    }

    /// Events in the window ending at `now`.
    pub fn count(&mut self, now: f64) -> usize {
        self.prune(now);
        self.stamps.len()
    }

    /// Events per second over the window.
    pub fn rate_per_sec(&mut self, now: f64) -> f64 {
        self.count(now) as f64 * 1000.0 / self.window_ms
    }

    /// True once the counter has observed a full window of time.
    pub fn has_full_window(&self, now: f64) -> bool {
        self.first_seen
            .is_some_and(|first| now - first >= self.window_ms)
    }

    pub fn reset(&mut self) {
        self.stamps.clear();
        self.first_seen = None;
    }

    fn prune(&mut self, now: f64) {
        while let Some(&t) = self.stamps.front() {
            if now - t > self.window_ms {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Limits that trigger a `performance:warning`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceThresholds {
    /// Warn when frame rate drops below this (frames per second).
    pub min_fps: f64,
    /// Warn when event throughput exceeds this (events per second).
    pub max_events_per_sec: f64,
    /// Minimum spacing between warnings of the same kind (milliseconds).
    pub warning_cooldown_ms: f64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            min_fps: 30.0,
            max_events_per_sec: 1000.0,
            warning_cooldown_ms: 1000.0,
        }
    }
}

/// Payload of a `performance:warning`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PerformanceWarning {
    LowFrameRate { fps: f64, threshold: f64 },
    HighEventRate { events_per_sec: f64, threshold: f64 },
}

/// Counters exposed by [`crate::EventBus::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BusStats {
    /// Events handed to `publish`.
    pub published: u64,
    /// Events that reached subscribers.
    pub delivered: u64,
    /// Events rejected by a filter.
    pub filtered: u64,
    /// Events dropped by middleware.
    pub dropped: u64,
    /// Subscriber callbacks that failed or panicked.
    pub handler_failures: u64,
    /// Batches flushed.
    pub batches_flushed: u64,
    /// Performance warnings raised.
    pub warnings: u64,
}

impl BusStats {
    /// Fraction of published events that never reached subscribers.
    pub fn drop_rate(&self) -> f64 {
        if self.published == 0 {
            0.0
        } else {
            (self.filtered + self.dropped) as f64 / self.published as f64
        }
    }
}
