//! Deterministic timer queue and rate limiter.
//!
//! Replaces `setTimeout`-style callbacks: owners schedule keyed deadlines and
//! poll [`TimerQueue::drain_expired`] from their tick, so the state machines
//! that own the timers stay free of hidden reentrancy.

use std::fmt::Debug;

#[derive(Debug, Clone)]
struct Deadline<K> {
    key: K,
    due_ms: f64,
    seq: u64,
}

/// Keyed one-shot timers. Scheduling an existing key replaces its deadline.
#[derive(Debug, Clone)]
pub struct TimerQueue<K> {
    deadlines: Vec<Deadline<K>>,
    next_seq: u64,
}

impl<K: PartialEq + Clone + Debug> TimerQueue<K> {
    pub fn new() -> Self {
        Self {
            deadlines: Vec::new(),
            next_seq: 0,
        }
    }

    /// Arm `key` to fire at `due_ms`.
    pub fn schedule(&mut self, key: K, due_ms: f64) {
        self.cancel(&key);
        let seq = self.next_seq;
        self.next_seq += 1;
        tracing::trace!(?key, due_ms, "timer scheduled");
        self.deadlines.push(Deadline { key, due_ms, seq });
    }

    /// Disarm `key`. Returns whether it was armed.
    pub fn cancel(&mut self, key: &K) -> bool {
        let before = self.deadlines.len();
        self.deadlines.retain(|d| &d.key != key);
        before != self.deadlines.len()
    }

    pub fn is_scheduled(&self, key: &K) -> bool {
        self.deadlines.iter().any(|d| &d.key == key)
    }

    /// Deadline for `key`, if armed.
    pub fn due(&self, key: &K) -> Option<f64> {
        self.deadlines
            .iter()
            .find(|d| &d.key == key)
            .map(|d| d.due_ms)
    }

    /// Remove and return all keys due at or before `now_ms`, earliest first.
    /// Ties keep scheduling order.
    pub fn drain_expired(&mut self, now_ms: f64) -> Vec<K> {
        let mut expired: Vec<Deadline<K>> = Vec::new();
        self.deadlines.retain(|d| {
            if d.due_ms <= now_ms {
                expired.push(d.clone());
                false
            } else {
                true
            }
        });
        expired.sort_by(|a, b| {
            a.due_ms
                .partial_cmp(&b.due_ms)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.seq.cmp(&b.seq))
        });
        expired.into_iter().map(|d| d.key).collect()
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

impl<K: PartialEq + Clone + Debug> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// THROTTLE
// =============================================================================

/// Leading-edge rate limiter: allows at most one pass per `interval_ms`.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval_ms: f64,
    last_pass: Option<f64>,
}

impl Throttle {
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms: interval_ms.max(0.0),
            last_pass: None,
        }
    }

    /// Returns `true` (and records the pass) when the interval has elapsed.
    pub fn try_pass(&mut self, now_ms: f64) -> bool {
        match self.last_pass {
            Some(last) if now_ms - last < self.interval_ms => false,
            _ => {
                self.last_pass = Some(now_ms);
                true
            }
        }
    }

    /// Would a call at `now_ms` pass, without recording it.
    pub fn ready(&self, now_ms: f64) -> bool {
        self.last_pass
            .map_or(true, |last| now_ms - last >= self.interval_ms)
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn reset(&mut self) {
        self.last_pass = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_in_deadline_order() {
        let mut timers = TimerQueue::new();
        timers.schedule("late", 300.0);
        timers.schedule("early", 100.0);
        timers.schedule("never", 10_000.0);

        assert!(timers.drain_expired(50.0).is_empty());
        assert_eq!(timers.drain_expired(500.0), vec!["early", "late"]);
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn test_reschedule_replaces() {
        let mut timers = TimerQueue::new();
        timers.schedule(1u8, 100.0);
        timers.schedule(1u8, 200.0);
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.due(&1), Some(200.0));
        assert!(timers.drain_expired(150.0).is_empty());
    }

    #[test]
    fn test_cancel() {
        let mut timers = TimerQueue::new();
        timers.schedule("tap", 100.0);
        assert!(timers.cancel(&"tap"));
        assert!(!timers.cancel(&"tap"));
        assert!(timers.drain_expired(1000.0).is_empty());
    }

    #[test]
    fn test_throttle() {
        let mut throttle = Throttle::new(16.0);
        assert!(throttle.try_pass(0.0));
        assert!(!throttle.try_pass(10.0));
        assert!(throttle.ready(16.0));
        assert!(throttle.try_pass(16.0));
        throttle.reset();
        assert!(throttle.try_pass(17.0));
    }
}
