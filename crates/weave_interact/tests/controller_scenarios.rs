//! Host-level scenarios driven through the public controller API.

use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;
use weave_core::{Point2, VirtualClock};
use weave_events::{EventBus, Topic};
use weave_input::{KeyCode, RawInput};
use weave_interact::{
    AnimationConfig, AnimationOutcome, AnimationSystem, Easing, InteractionConfig,
    InteractionController, InteractionEvent, PositionedNode, RTreeIndex, RecordingRenderer,
    SelectionMode, ViewportChangeReason,
};

type Log = Rc<RefCell<Vec<InteractionEvent>>>;

fn graph() -> Vec<PositionedNode> {
    (0..20)
        .map(|i| {
            let x = (i % 5) as f64 * 100.0;
            let y = (i / 5) as f64 * 100.0;
            PositionedNode::new(format!("n{:02}", i), x, y).with_radius(8.0)
        })
        .collect()
}

fn setup(config: InteractionConfig) -> (InteractionController, VirtualClock, Log) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let clock = VirtualClock::new();
    let mut controller = InteractionController::new(config, clock.shared()).unwrap();
    controller
        .initialize(Box::new(RecordingRenderer::default()), 1000.0, 800.0)
        .unwrap();
    controller.set_spatial_index(Some(Box::new(RTreeIndex::new())));
    controller.update_nodes(graph());
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    controller.on_event(move |event| {
        sink.borrow_mut().push(event.clone());
        Ok(())
    });
    (controller, clock, log)
}

fn run_frames(controller: &mut InteractionController, clock: &VirtualClock, ms: f64) {
    let mut elapsed = 0.0;
    while elapsed < ms {
        clock.advance(16.0);
        elapsed += 16.0;
        controller.tick();
    }
}

#[test]
fn reduced_motion_snaps_value_animation() {
    let clock = VirtualClock::new();
    let mut anims = AnimationSystem::new(clock.shared());
    anims.set_reduced_motion(true);

    let values = Rc::new(RefCell::new(Vec::new()));
    let sink = values.clone();
    let handle = anims.animate_value(
        "opacity",
        0.0,
        100.0,
        AnimationConfig::new(1000.0, Easing::Linear),
        move |v| {
            sink.borrow_mut().push(*v);
            Ok(())
        },
    );

    assert_eq!(pollster::block_on(handle), AnimationOutcome::Completed);
    assert_eq!(*values.borrow(), vec![100.0]);
    assert!(!anims.is_animating());
}

#[test]
fn zoom_about_point_keeps_it_fixed() {
    let (mut c, _clock, _log) = setup(InteractionConfig::default());
    let anchor = Point2::new(250.0, 130.0);
    let world = c.viewport().borrow().screen_to_world(anchor);

    c.set_zoom(3.0, Some(anchor), false);
    c.set_zoom(0.5, Some(anchor), false);

    let back = c.viewport().borrow().world_to_screen(world);
    assert!(back.approx_eq(anchor, 1e-9));
    assert_eq!(c.viewport_snapshot().zoom, 0.5);
}

#[test]
fn zoom_is_clamped_to_configured_limits() {
    let config = InteractionConfig::from_yaml("viewport:\n  min_zoom: 0.5\n  max_zoom: 2.0\n").unwrap();
    let (mut c, _clock, _log) = setup(config);
    c.set_zoom(50.0, None, false);
    assert_eq!(c.viewport_snapshot().zoom, 2.0);
    for _ in 0..40 {
        c.handle_input(RawInput::wheel(500.0, 400.0, 100.0));
    }
    assert_eq!(c.viewport_snapshot().zoom, 0.5);
}

#[test]
fn animated_fit_resolves_and_shows_every_node() {
    let (mut c, clock, log) = setup(InteractionConfig::default());
    c.set_zoom(8.0, Some(Point2::ZERO), false);
    log.borrow_mut().clear();

    let handle = c.fit_to_graph(true);
    run_frames(&mut c, &clock, 400.0);
    assert_eq!(pollster::block_on(handle), AnimationOutcome::Completed);

    let vp = c.viewport();
    let vp = vp.borrow();
    for node in c.nodes() {
        assert!(vp.is_point_visible(node.center(), 0.0), "{} off screen", node.id);
    }
    let reasons: Vec<ViewportChangeReason> = log
        .borrow()
        .iter()
        .filter_map(|e| match e {
            InteractionEvent::ViewportChange { reason, .. } => Some(*reason),
            _ => None,
        })
        .collect();
    assert!(reasons.len() > 3);
    assert!(reasons.iter().all(|r| *r == ViewportChangeReason::Fit));
}

#[test]
fn clear_selection_is_idempotent() {
    let (mut c, _clock, log) = setup(InteractionConfig::default());
    c.select_nodes(&["n01".to_string(), "n02".to_string()], SelectionMode::Set);
    assert!(c.clear_selection());
    let after_first = log.borrow().len();
    assert!(!c.clear_selection());
    assert!(!c.clear_selection());
    assert_eq!(log.borrow().len(), after_first);
    assert!(c.selection().is_empty());
}

#[test]
fn drag_pan_then_click_node() {
    let (mut c, clock, log) = setup(InteractionConfig::default());

    // drag the background by (40, -20)
    c.handle_input(RawInput::mouse_down(700.0, 700.0));
    for step in 1..=4 {
        clock.advance(16.0);
        let s = step as f64;
        c.handle_input(RawInput::mouse_move(700.0 + 10.0 * s, 700.0 - 5.0 * s));
    }
    c.handle_input(RawInput::mouse_up(740.0, 680.0));
    assert_eq!(c.viewport_snapshot().pan, Point2::new(40.0, -20.0));

    // node n07 sits at world (200, 100)
    clock.advance(500.0);
    c.handle_input(RawInput::mouse_down(243.0, 82.0));
    c.handle_input(RawInput::mouse_up(243.0, 82.0));
    assert_eq!(c.selected_nodes(), vec!["n07".to_string()]);

    let clicks: Vec<_> = log
        .borrow()
        .iter()
        .filter(|e| e.topic() == "nodeClick")
        .cloned()
        .collect();
    assert_eq!(clicks.len(), 1);
}

#[test]
fn keyboard_navigation_without_animation() {
    let mut config = InteractionConfig::default();
    config.features.animated_transitions = false;
    let (mut c, _clock, log) = setup(config);

    c.handle_input(RawInput::key_down(KeyCode::ArrowRight));
    c.handle_input(RawInput::key_down(KeyCode::ArrowDown));
    assert_eq!(c.viewport_snapshot().pan, Point2::new(-50.0, -50.0));

    c.handle_input(RawInput::key_down(KeyCode::Minus));
    assert!((c.viewport_snapshot().zoom - 1.0 / 1.2).abs() < 1e-12);

    c.handle_input(RawInput::key_down(KeyCode::Home));
    assert_eq!(c.viewport_snapshot().zoom, 1.0);
    assert_eq!(c.viewport_snapshot().pan, Point2::ZERO);

    let messages: Vec<String> = log
        .borrow()
        .iter()
        .filter_map(|e| match e {
            InteractionEvent::Announcement { message } => Some(message.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(messages, vec!["Zoom 83%".to_string(), "View reset".to_string()]);
}

#[test]
fn events_flow_through_attached_bus() {
    let (mut c, clock, _log) = setup(InteractionConfig::default());
    let topics = Rc::new(RefCell::new(Vec::new()));
    let sink = topics.clone();
    let mut bus = EventBus::new(clock.shared());
    bus.subscribe_all(move |event: &InteractionEvent| {
        sink.borrow_mut().push(event.topic());
        Ok(())
    });
    c.attach_event_bus(bus);

    c.select_nodes(&["n00".to_string()], SelectionMode::Add);
    c.tick();
    assert_eq!(*topics.borrow(), vec!["selectionChange", "announcement"]);
}

#[test]
fn destroy_cancels_running_transitions() {
    let (mut c, clock, _log) = setup(InteractionConfig::default());
    let mut handle = c.zoom_to_node("n12", Some(3.0), true).unwrap();
    clock.advance(16.0);
    c.tick();
    assert!(c.destroy());
    assert_eq!(handle.try_outcome(), Some(AnimationOutcome::Cancelled));
    assert!(!c.is_initialized());
}
