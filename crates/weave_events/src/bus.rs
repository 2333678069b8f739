//! The typed event bus.

use crate::batch::{BatchBuffer, BatchConfig, EventBatch};
use crate::metrics::{
    BusStats, PerformanceThresholds, PerformanceWarning, RollingCounter, RATE_WINDOW_MS,
};
use crate::middleware::{run_chain, Middleware, Next};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use weave_core::{panic_message, CallbackResult, Emitter, ListenerId, SharedClock, Throttle};

/// Topic name of performance warnings.
pub const PERFORMANCE_WARNING: &str = "performance:warning";

/// Events routed by the bus name their own topic.
pub trait Topic {
    fn topic(&self) -> &'static str;
}

type Handler<E> = Box<dyn FnMut(&E) -> CallbackResult>;
type BatchHandler<E> = Box<dyn FnMut(&EventBatch<E>) -> CallbackResult>;
type Filter<E> = Box<dyn FnMut(&E) -> bool>;

struct Subscription<E> {
    id: ListenerId,
    /// `None` subscribes to every topic.
    topic: Option<&'static str>,
    handler: Handler<E>,
}

/// Typed pub/sub with filters, per-topic middleware and batching.
///
/// Delivery order for one `publish`:
/// filters → middleware chain → subscribers → batch buffer.
pub struct EventBus<E> {
    clock: SharedClock,
    subscriptions: Vec<Subscription<E>>,
    filters: Vec<(ListenerId, Option<&'static str>, Filter<E>)>,
    middleware: HashMap<&'static str, Vec<Box<dyn Middleware<E>>>>,
    batch_config: BatchConfig,
    buffers: HashMap<&'static str, BatchBuffer<E>>,
    batch_handlers: Vec<(ListenerId, BatchHandler<E>)>,
    thresholds: PerformanceThresholds,
    event_rate: RollingCounter,
    frame_rate: RollingCounter,
    fps_warning: Throttle,
    rate_warning: Throttle,
    warnings: Emitter<PerformanceWarning>,
    stats: BusStats,
    next_id: u64,
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .field("filters", &self.filters.len())
            .field("batch_config", &self.batch_config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<E: Topic + Clone> EventBus<E> {
    pub fn new(clock: SharedClock) -> Self {
        Self::with_config(clock, BatchConfig::default(), PerformanceThresholds::default())
    }

    pub fn with_config(
        clock: SharedClock,
        batch_config: BatchConfig,
        thresholds: PerformanceThresholds,
    ) -> Self {
        Self {
            clock,
            subscriptions: Vec::new(),
            filters: Vec::new(),
            middleware: HashMap::new(),
            batch_config,
            buffers: HashMap::new(),
            batch_handlers: Vec::new(),
            fps_warning: Throttle::new(thresholds.warning_cooldown_ms),
            rate_warning: Throttle::new(thresholds.warning_cooldown_ms),
            thresholds,
            event_rate: RollingCounter::new(RATE_WINDOW_MS),
            frame_rate: RollingCounter::new(RATE_WINDOW_MS),
            warnings: Emitter::new(PERFORMANCE_WARNING),
            stats: BusStats::default(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        id
    }

    // =========================================================================
    // SUBSCRIPTION
    // =========================================================================

    /// Subscribe to one topic.
    pub fn subscribe<F>(&mut self, topic: &'static str, handler: F) -> ListenerId
    where
        F: FnMut(&E) -> CallbackResult + 'static,
    {
        let id = self.allocate_id();
        self.subscriptions.push(Subscription {
            id,
            topic: Some(topic),
            handler: Box::new(handler),
        });
        id
    }

    /// Subscribe to every topic.
    pub fn subscribe_all<F>(&mut self, handler: F) -> ListenerId
    where
        F: FnMut(&E) -> CallbackResult + 'static,
    {
        let id = self.allocate_id();
        self.subscriptions.push(Subscription {
            id,
            topic: None,
            handler: Box::new(handler),
        });
        id
    }

    /// Receive flushed batches of every batched topic.
    pub fn subscribe_batches<F>(&mut self, handler: F) -> ListenerId
    where
        F: FnMut(&EventBatch<E>) -> CallbackResult + 'static,
    {
        let id = self.allocate_id();
        self.batch_handlers.push((id, Box::new(handler)));
        id
    }

    /// Receive `performance:warning` notifications.
    pub fn on_performance_warning<F>(&mut self, handler: F) -> ListenerId
    where
        F: FnMut(&PerformanceWarning) -> CallbackResult + 'static,
    {
        self.warnings.on(handler)
    }

    /// Remove a subscription, batch handler or filter by id.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before =
            self.subscriptions.len() + self.batch_handlers.len() + self.filters.len();
        self.subscriptions.retain(|s| s.id != id);
        self.batch_handlers.retain(|(hid, _)| *hid != id);
        self.filters.retain(|(fid, _, _)| *fid != id);
        let after = self.subscriptions.len() + self.batch_handlers.len() + self.filters.len();
        before != after || self.warnings.off(id)
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscriptions
            .iter()
            .filter(|s| s.topic.map_or(true, |t| t == topic))
            .count()
    }

    // =========================================================================
    // PIPELINE CONFIGURATION
    // =========================================================================

    /// Add a filter. A `false` result drops the event before middleware.
    /// `topic = None` filters every topic.
    pub fn add_filter<F>(&mut self, topic: Option<&'static str>, predicate: F) -> ListenerId
    where
        F: FnMut(&E) -> bool + 'static,
    {
        let id = self.allocate_id();
        self.filters.push((id, topic, Box::new(predicate)));
        id
    }

    /// Append a closure middleware to a topic's chain.
    pub fn use_middleware<F>(&mut self, topic: &'static str, middleware: F)
    where
        F: FnMut(E, Next<'_, E>) -> anyhow::Result<Option<E>> + 'static,
    {
        self.use_middleware_boxed(topic, Box::new(middleware));
    }

    /// Append a middleware object to a topic's chain.
    pub fn use_middleware_boxed(&mut self, topic: &'static str, middleware: Box<dyn Middleware<E>>) {
        self.middleware.entry(topic).or_default().push(middleware);
    }

    pub fn clear_middleware(&mut self, topic: &str) {
        self.middleware.remove(topic);
    }

    pub fn set_batch_config(&mut self, config: BatchConfig) {
        self.flush_all();
        self.batch_config = config;
    }

    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch_config
    }

    pub fn set_thresholds(&mut self, thresholds: PerformanceThresholds) {
        self.fps_warning = Throttle::new(thresholds.warning_cooldown_ms);
        self.rate_warning = Throttle::new(thresholds.warning_cooldown_ms);
        self.thresholds = thresholds;
    }

    // =========================================================================
    // PUBLISH
    // =========================================================================

    /// Publish an event. Returns whether it reached the subscribers.
    pub fn publish(&mut self, event: E) -> bool {
        let now = self.clock.now_ms();
        let topic = event.topic();
        self.stats.published += 1;
        self.event_rate.record(now);

        let rejected = self
            .filters
            .iter_mut()
            .filter(|(_, t, _)| t.map_or(true, |t| t == topic))
            .any(|(_, _, predicate)| !predicate(&event));
        if rejected {
            self.stats.filtered += 1;
            tracing::trace!(topic, "event filtered");
            self.check_event_rate(now);
            return false;
        }

        let event = match self.middleware.get_mut(topic) {
            Some(chain) => run_chain(chain, topic, event),
            None => Some(event),
        };
        let Some(event) = event else {
            self.stats.dropped += 1;
            tracing::trace!(topic, "event dropped by middleware");
            self.check_event_rate(now);
            return false;
        };

        self.deliver(topic, &event);

        if self.batch_config.batches(topic) {
            let max = self.batch_config.max_batch_size.max(1);
            let len = self.buffers.entry(topic).or_default().push(event, now);
            if len >= max {
                self.flush(topic, now);
            }
        }

        self.check_event_rate(now);
        true
    }

    fn deliver(&mut self, topic: &'static str, event: &E) {
        self.stats.delivered += 1;
        for sub in self
            .subscriptions
            .iter_mut()
            .filter(|s| s.topic.map_or(true, |t| t == topic))
        {
            let handler = &mut sub.handler;
            let failure = match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err.to_string()),
                Err(panic) => Some(panic_message(&panic)),
            };
            if let Some(error) = failure {
                self.stats.handler_failures += 1;
                tracing::warn!(topic, id = %sub.id, %error, "event handler failed");
            }
        }
    }

    // =========================================================================
    // BATCHING
    // =========================================================================

    fn flush(&mut self, topic: &'static str, now: f64) {
        let Some(batch) = self.buffers.get_mut(topic).and_then(|b| b.take(topic, now)) else {
            return;
        };
        self.stats.batches_flushed += 1;
        tracing::trace!(topic, size = batch.len(), "batch flushed");
        for (id, handler) in self.batch_handlers.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| handler(&batch))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.stats.handler_failures += 1;
                    tracing::warn!(topic, %id, error = %err, "batch handler failed");
                }
                Err(panic) => {
                    self.stats.handler_failures += 1;
                    tracing::warn!(topic, %id, panic = %panic_message(&panic), "batch handler panicked");
                }
            }
        }
    }

    /// Flush every buffer regardless of age.
    pub fn flush_all(&mut self) {
        let now = self.clock.now_ms();
        let topics: Vec<&'static str> = self.buffers.keys().copied().collect();
        for topic in topics {
            self.flush(topic, now);
        }
    }

    /// Flush buffers older than `max_batch_time_ms`. Call once per frame.
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();
        let max_age = self.batch_config.max_batch_time_ms;
        let due: Vec<&'static str> = self
            .buffers
            .iter()
            .filter(|(_, b)| !b.is_empty() && b.is_due(now, max_age))
            .map(|(t, _)| *t)
            .collect();
        for topic in due {
            self.flush(topic, now);
        }
        self.check_event_rate(now);
    }

    // =========================================================================
    // METRICS
    // =========================================================================

    /// Record a rendered frame for the rolling FPS counter.
    pub fn record_frame(&mut self) {
        let now = self.clock.now_ms();
        self.frame_rate.record(now);
        if !self.frame_rate.has_full_window(now) {
            return;
        }
        let fps = self.frame_rate.rate_per_sec(now);
        if fps < self.thresholds.min_fps && self.fps_warning.try_pass(now) {
            self.raise(PerformanceWarning::LowFrameRate {
                fps,
                threshold: self.thresholds.min_fps,
            });
        }
    }

    /// Frames per second over the last second.
    pub fn fps(&mut self) -> f64 {
        let now = self.clock.now_ms();
        self.frame_rate.rate_per_sec(now)
    }

    /// Published events per second over the last second.
    pub fn event_rate(&mut self) -> f64 {
        let now = self.clock.now_ms();
        self.event_rate.rate_per_sec(now)
    }

    fn check_event_rate(&mut self, now: f64) {
        let rate = self.event_rate.rate_per_sec(now);
        if rate > self.thresholds.max_events_per_sec && self.rate_warning.try_pass(now) {
            self.raise(PerformanceWarning::HighEventRate {
                events_per_sec: rate,
                threshold: self.thresholds.max_events_per_sec,
            });
        }
    }

    fn raise(&mut self, warning: PerformanceWarning) {
        self.stats.warnings += 1;
        tracing::warn!(topic = PERFORMANCE_WARNING, ?warning, "performance warning");
        self.warnings.emit(&warning);
    }

    pub fn stats(&self) -> BusStats {
        self.stats
    }

    pub fn reset_metrics(&mut self) {
        self.stats = BusStats::default();
        self.event_rate.reset();
        self.frame_rate.reset();
        self.fps_warning.reset();
        self.rate_warning.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;
    use weave_core::VirtualClock;

    #[derive(Debug, Clone, PartialEq)]
    enum Ev {
        Hover(u32),
        Select(u32),
    }

    impl Topic for Ev {
        fn topic(&self) -> &'static str {
            match self {
                Ev::Hover(_) => "nodeHover",
                Ev::Select(_) => "selectionChange",
            }
        }
    }

    fn bus() -> (EventBus<Ev>, VirtualClock) {
        let clock = VirtualClock::new();
        (EventBus::new(clock.shared()), clock)
    }

    fn collector(bus: &mut EventBus<Ev>, topic: &'static str) -> Rc<RefCell<Vec<Ev>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        bus.subscribe(topic, move |e| {
            s.borrow_mut().push(e.clone());
            Ok(())
        });
        seen
    }

    #[test]
    fn routes_by_topic() {
        let (mut bus, _clock) = bus();
        let hovers = collector(&mut bus, "nodeHover");
        let all = Rc::new(RefCell::new(0));
        let a = all.clone();
        bus.subscribe_all(move |_| {
            *a.borrow_mut() += 1;
            Ok(())
        });

        assert!(bus.publish(Ev::Hover(1)));
        assert!(bus.publish(Ev::Select(2)));
        assert_eq!(*hovers.borrow(), vec![Ev::Hover(1)]);
        assert_eq!(*all.borrow(), 2);
        assert_eq!(bus.subscriber_count("nodeHover"), 2);
    }

    #[test]
    fn filter_drops_before_middleware() {
        let (mut bus, _clock) = bus();
        let seen = collector(&mut bus, "nodeHover");
        let middleware_runs = Rc::new(RefCell::new(0));
        let m = middleware_runs.clone();
        bus.use_middleware("nodeHover", move |e, next| {
            *m.borrow_mut() += 1;
            Ok(next(e))
        });
        bus.add_filter(Some("nodeHover"), |e| !matches!(e, Ev::Hover(0)));

        assert!(!bus.publish(Ev::Hover(0)));
        assert!(bus.publish(Ev::Hover(5)));
        assert_eq!(*seen.borrow(), vec![Ev::Hover(5)]);
        assert_eq!(*middleware_runs.borrow(), 1);
        assert_eq!(bus.stats().filtered, 1);
    }

    #[test]
    fn middleware_transforms_and_failure_keeps_original() {
        let (mut bus, _clock) = bus();
        let seen = collector(&mut bus, "nodeHover");
        bus.use_middleware("nodeHover", |_e, _next| anyhow::bail!("broken"));
        bus.use_middleware("nodeHover", |e, next| match e {
            Ev::Hover(n) => Ok(next(Ev::Hover(n * 2))),
            other => Ok(next(other)),
        });
        bus.publish(Ev::Hover(4));
        assert_eq!(*seen.borrow(), vec![Ev::Hover(8)]);
    }

    #[test]
    fn failing_handler_does_not_block_others() {
        let (mut bus, _clock) = bus();
        bus.subscribe("nodeHover", |_| anyhow::bail!("handler bug"));
        bus.subscribe("nodeHover", |_| panic!("handler panic"));
        let seen = collector(&mut bus, "nodeHover");
        bus.publish(Ev::Hover(1));
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(bus.stats().handler_failures, 2);
    }

    #[test]
    fn batches_flush_on_size_and_time() {
        let clock = VirtualClock::new();
        let config = BatchConfig {
            max_batch_size: 3,
            max_batch_time_ms: 50.0,
            ..BatchConfig::for_topics(["nodeHover"])
        };
        let mut bus = EventBus::with_config(
            clock.shared(),
            config,
            PerformanceThresholds::default(),
        );
        let individual = collector(&mut bus, "nodeHover");
        let batches = Rc::new(RefCell::new(Vec::new()));
        let b = batches.clone();
        bus.subscribe_batches(move |batch: &EventBatch<Ev>| {
            b.borrow_mut().push(batch.clone());
            Ok(())
        });

        for i in 0..3 {
            clock.advance(5.0);
            bus.publish(Ev::Hover(i));
        }
        assert_eq!(batches.borrow().len(), 1, "size-triggered flush");
        assert_eq!(batches.borrow()[0].events.len(), 3);
        assert_eq!(batches.borrow()[0].batch_start_time, 5.0);
        assert_eq!(batches.borrow()[0].batch_end_time, 15.0);

        clock.advance(5.0);
        bus.publish(Ev::Hover(9));
        bus.tick();
        assert_eq!(batches.borrow().len(), 1, "not old enough yet");
        clock.advance(60.0);
        bus.tick();
        assert_eq!(batches.borrow().len(), 2, "time-triggered flush");
        assert_eq!(individual.borrow().len(), 4, "individual delivery continues");

        bus.publish(Ev::Select(1));
        bus.flush_all();
        assert_eq!(batches.borrow().len(), 2, "unbatched topics never buffer");
    }

    #[test]
    fn high_event_rate_warns_once_per_cooldown() {
        let clock = VirtualClock::new();
        let thresholds = PerformanceThresholds {
            max_events_per_sec: 5.0,
            ..PerformanceThresholds::default()
        };
        let mut bus = EventBus::with_config(clock.shared(), BatchConfig::default(), thresholds);
        let warnings = Rc::new(RefCell::new(Vec::new()));
        let w = warnings.clone();
        bus.on_performance_warning(move |warning| {
            w.borrow_mut().push(*warning);
            Ok(())
        });

        for _ in 0..20 {
            clock.advance(10.0);
            bus.publish(Ev::Hover(0));
        }
        assert_eq!(warnings.borrow().len(), 1);
        assert!(matches!(
            warnings.borrow()[0],
            PerformanceWarning::HighEventRate { .. }
        ));
    }

    #[test]
    fn low_frame_rate_warns_after_full_window() {
        let (mut bus, clock) = bus();
        let warned = Rc::new(RefCell::new(0));
        let w = warned.clone();
        bus.on_performance_warning(move |_| {
            *w.borrow_mut() += 1;
            Ok(())
        });
        // 10 fps
        for _ in 0..11 {
            bus.record_frame();
            clock.advance(100.0);
        }
        bus.record_frame();
        assert_eq!(*warned.borrow(), 1);
        assert!(bus.fps() < 30.0);
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let (mut bus, _clock) = bus();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        let id = bus.subscribe("nodeHover", move |_| {
            *c.borrow_mut() += 1;
            Ok(())
        });
        bus.publish(Ev::Hover(1));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(Ev::Hover(1));
        assert_eq!(*count.borrow(), 1);
    }
}
