//! Middleware objects and batching driven through the public API.

use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;
use weave_core::VirtualClock;
use weave_events::{BatchConfig, EventBus, Middleware, Next, PerformanceThresholds, Topic};

#[derive(Debug, Clone, PartialEq)]
struct Moved {
    dx: f64,
    dy: f64,
}

impl Topic for Moved {
    fn topic(&self) -> &'static str {
        "viewportChange"
    }
}

/// Drops sub-pixel moves.
struct DeadZone {
    min: f64,
    dropped: Rc<RefCell<usize>>,
}

impl Middleware<Moved> for DeadZone {
    fn handle(&mut self, event: Moved, next: Next<'_, Moved>) -> anyhow::Result<Option<Moved>> {
        if event.dx.hypot(event.dy) < self.min {
            *self.dropped.borrow_mut() += 1;
            return Ok(None);
        }
        Ok(next(event))
    }
}

#[test]
fn middleware_object_and_batches() {
    let clock = VirtualClock::new();
    let mut bus = EventBus::with_config(
        clock.shared(),
        BatchConfig {
            max_batch_size: 100,
            max_batch_time_ms: 16.0,
            ..BatchConfig::for_topics(["viewportChange"])
        },
        PerformanceThresholds::default(),
    );

    let dropped = Rc::new(RefCell::new(0));
    bus.use_middleware_boxed(
        "viewportChange",
        Box::new(DeadZone {
            min: 0.5,
            dropped: dropped.clone(),
        }),
    );

    let totals = Rc::new(RefCell::new(Vec::new()));
    let t = totals.clone();
    bus.subscribe_batches(move |batch| {
        let dx: f64 = batch.events.iter().map(|e| e.dx).sum();
        t.borrow_mut().push((batch.len(), dx));
        Ok(())
    });

    for dx in [0.1, 2.0, 0.2, 3.0, 5.0] {
        clock.advance(4.0);
        bus.publish(Moved { dx, dy: 0.0 });
    }
    clock.advance(16.0);
    bus.tick();

    assert_eq!(*dropped.borrow(), 2);
    assert_eq!(*totals.borrow(), vec![(3, 10.0)]);
    let stats = bus.stats();
    assert_eq!(stats.published, 5);
    assert_eq!(stats.dropped, 2);
    assert_eq!(stats.batches_flushed, 1);
}
