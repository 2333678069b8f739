//! Gesture recognition for mouse, touch and multi-touch input.
//!
//! The recognizer is a deterministic state machine: every entry point takes
//! the current timestamp, and time-based transitions (tap confirmation,
//! long press) are armed in a [`TimerQueue`] that the owner polls through
//! [`GestureRecognizer::tick`]. Recognized gestures are both returned to the
//! caller and delivered to listeners registered with [`GestureRecognizer::on`].
//!
//! Classification per touch count:
//! - 1 touch: tap / double tap / long press / pan (+ swipe on release)
//! - 2 touches: pinch when finger distance changes past `pinch_threshold`,
//!   otherwise two-finger pan once the center moves past `pan_threshold`
//! - 3+ touches: multi-finger pan of the centroid, or a three-finger tap

use crate::config::GestureConfig;
use crate::raw::{TouchPoint, MOUSE_POINTER_ID};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use weave_core::{CallbackResult, Emitter, ListenerId, Point2, Throttle, TimerQueue};

const DISTANCE_EPSILON: f64 = 1e-9;

// =============================================================================
// PUBLIC TYPES
// =============================================================================

/// Gesture channel, used for listener registration and throttling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GestureKind {
    Tap,
    DoubleTap,
    LongPress,
    ThreeFingerTap,
    Pan,
    TwoFingerPan,
    MultiFingerPan,
    Pinch,
    Swipe,
}

impl GestureKind {
    /// Event name as published to hosts.
    pub fn event_name(&self) -> &'static str {
        match self {
            GestureKind::Tap => "tap",
            GestureKind::DoubleTap => "doubleTap",
            GestureKind::LongPress => "longPress",
            GestureKind::ThreeFingerTap => "threeFingerTap",
            GestureKind::Pan => "pan",
            GestureKind::TwoFingerPan => "twoFingerPan",
            GestureKind::MultiFingerPan => "multiFingerPan",
            GestureKind::Pinch => "pinch",
            GestureKind::Swipe => "swipe",
        }
    }

    /// Continuous gestures have start/update/end phases and are throttled.
    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            GestureKind::Pan
                | GestureKind::TwoFingerPan
                | GestureKind::MultiFingerPan
                | GestureKind::Pinch
        )
    }
}

/// Swipe direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl SwipeDirection {
    /// Dominant axis of a screen-space vector (y grows downward).
    pub fn from_vector(v: Point2) -> Self {
        if v.x.abs() > v.y.abs() {
            if v.x > 0.0 {
                SwipeDirection::Right
            } else {
                SwipeDirection::Left
            }
        } else if v.y > 0.0 {
            SwipeDirection::Down
        } else {
            SwipeDirection::Up
        }
    }
}

/// Recognized gesture payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Gesture {
    /// Single tap at position.
    Tap { pos: Point2 },

    /// Two taps close together in time and space.
    DoubleTap { pos: Point2 },

    /// Touch held in place past the long-press timeout.
    LongPress { pos: Point2 },

    /// Three fingers tapped together.
    ThreeFingerTap { center: Point2 },

    /// Single-pointer drag. `delta` is movement since the previous emission.
    Pan {
        start: Point2,
        current: Point2,
        delta: Point2,
    },

    /// Two-finger drag of the midpoint.
    TwoFingerPan { center: Point2, delta: Point2 },

    /// Drag of the centroid of three or more fingers.
    MultiFingerPan {
        center: Point2,
        delta: Point2,
        touch_count: usize,
    },

    /// Two-finger pinch. `scale` is relative to the gesture start,
    /// `scale_delta` to the previous emission.
    Pinch {
        center: Point2,
        scale: f64,
        scale_delta: f64,
        rotation: f64,
    },

    /// Fast release at the end of a pan. Velocity in px/ms.
    Swipe {
        direction: SwipeDirection,
        velocity: Point2,
        speed: f64,
    },
}

impl Gesture {
    pub fn kind(&self) -> GestureKind {
        match self {
            Gesture::Tap { .. } => GestureKind::Tap,
            Gesture::DoubleTap { .. } => GestureKind::DoubleTap,
            Gesture::LongPress { .. } => GestureKind::LongPress,
            Gesture::ThreeFingerTap { .. } => GestureKind::ThreeFingerTap,
            Gesture::Pan { .. } => GestureKind::Pan,
            Gesture::TwoFingerPan { .. } => GestureKind::TwoFingerPan,
            Gesture::MultiFingerPan { .. } => GestureKind::MultiFingerPan,
            Gesture::Pinch { .. } => GestureKind::Pinch,
            Gesture::Swipe { .. } => GestureKind::Swipe,
        }
    }

    /// Representative screen position of the gesture, if it has one.
    pub fn position(&self) -> Option<Point2> {
        match self {
            Gesture::Tap { pos } | Gesture::DoubleTap { pos } | Gesture::LongPress { pos } => {
                Some(*pos)
            }
            Gesture::ThreeFingerTap { center }
            | Gesture::TwoFingerPan { center, .. }
            | Gesture::MultiFingerPan { center, .. }
            | Gesture::Pinch { center, .. } => Some(*center),
            Gesture::Pan { current, .. } => Some(*current),
            Gesture::Swipe { .. } => None,
        }
    }
}

/// Lifecycle phase of an emitted gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GesturePhase {
    Start,
    Update,
    End,
    /// Discrete gestures (taps, long press, swipe).
    Instant,
}

/// A gesture emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureEvent {
    pub gesture: Gesture,
    pub phase: GesturePhase,
    pub timestamp: f64,
    pub touch_count: usize,
}

impl GestureEvent {
    pub fn kind(&self) -> GestureKind {
        self.gesture.kind()
    }
}

/// Coarse recognition phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecognitionPhase {
    /// No gesture in progress.
    #[default]
    None,
    /// Pointers are down, nothing recognized yet.
    Possible,
    /// Gesture recognized and in progress.
    Active,
    /// Last sequence finished.
    Completed,
    /// Sequence abandoned by cancel/reset.
    Cancelled,
}

/// The single current gesture. At most one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GestureState {
    pub kind: Option<GestureKind>,
    pub start_time: f64,
    pub is_active: bool,
    pub phase: RecognitionPhase,
}

// =============================================================================
// INTERNAL STATE
// =============================================================================

/// Live pointer tracking.
#[derive(Debug, Clone, Copy)]
struct ActiveTouch {
    start_pos: Point2,
    current_pos: Point2,
}

impl ActiveTouch {
    fn new(pos: Point2) -> Self {
        Self {
            start_pos: pos,
            current_pos: pos,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureTimer {
    /// Confirms a single tap once the double-tap window closes.
    Tap,
    LongPress,
}

#[derive(Debug, Clone, Copy)]
struct PendingTap {
    pos: Point2,
    time: f64,
}

/// Per-sequence bookkeeping (first pointer down to last pointer up).
#[derive(Debug, Clone, Copy, Default)]
struct SequenceState {
    start_time: f64,
    max_touches: usize,
    moved: bool,
    had_gesture: bool,
    tap_centroid: Point2,
}

/// Baseline for two-or-more-finger gestures.
#[derive(Debug, Clone, Copy)]
struct MultiTouchTracking {
    start_distance: f64,
    start_angle: f64,
    start_center: Point2,
    emitted_distance: f64,
    emitted_center: Point2,
}

/// Recent samples of the primary pointer for release velocity.
#[derive(Debug, Clone)]
struct VelocityTracker {
    samples: VecDeque<(f64, Point2)>,
    window_ms: f64,
}

impl VelocityTracker {
    fn new(window_ms: f64) -> Self {
        Self {
            samples: VecDeque::new(),
            window_ms,
        }
    }

    fn push(&mut self, now: f64, pos: Point2) {
        self.samples.push_back((now, pos));
        while let Some(&(t, _)) = self.samples.front() {
            if now - t > self.window_ms && self.samples.len() > 2 {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Velocity in px/ms across the retained window.
    fn velocity(&self) -> Point2 {
        match (self.samples.front(), self.samples.back()) {
            (Some(&(t0, p0)), Some(&(t1, p1))) if t1 > t0 => (p1 - p0) / (t1 - t0),
            _ => Point2::ZERO,
        }
    }

    fn clear(&mut self) {
        self.samples.clear();
    }
}

// =============================================================================
// RECOGNIZER
// =============================================================================

/// Gesture recognizer for mouse and touch input.
pub struct GestureRecognizer {
    config: GestureConfig,
    touches: BTreeMap<i64, ActiveTouch>,
    state: GestureState,
    timers: TimerQueue<GestureTimer>,
    pending_tap: Option<PendingTap>,
    sequence: SequenceState,
    multi: Option<MultiTouchTracking>,
    /// Primary pointer position at the last pan emission.
    pan_emitted_pos: Point2,
    velocity: VelocityTracker,
    throttles: HashMap<GestureKind, Throttle>,
    last_gesture: Option<Gesture>,
    listeners: Emitter<GestureEvent>,
}

impl std::fmt::Debug for GestureRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureRecognizer")
            .field("touches", &self.touches.len())
            .field("state", &self.state)
            .field("pending_tap", &self.pending_tap.is_some())
            .field("timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}

impl Default for GestureRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureRecognizer {
    /// Create a new gesture recognizer.
    pub fn new() -> Self {
        Self::with_config(GestureConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(config: GestureConfig) -> Self {
        let window = config.velocity_window_ms;
        Self {
            config,
            touches: BTreeMap::new(),
            state: GestureState::default(),
            timers: TimerQueue::new(),
            pending_tap: None,
            sequence: SequenceState::default(),
            multi: None,
            pan_emitted_pos: Point2::ZERO,
            velocity: VelocityTracker::new(window),
            throttles: HashMap::new(),
            last_gesture: None,
            listeners: Emitter::new("gestures"),
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Replace thresholds. In-flight touches keep their tracking.
    pub fn set_config(&mut self, config: GestureConfig) {
        self.velocity.window_ms = config.velocity_window_ms;
        self.throttles.clear();
        self.config = config;
    }

    /// Current gesture state.
    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Last recognized gesture.
    pub fn gesture(&self) -> Option<&Gesture> {
        self.last_gesture.as_ref()
    }

    /// Number of live pointers.
    pub fn touch_count(&self) -> usize {
        self.touches.len()
    }

    /// True while a tap or long-press timer is armed.
    pub fn has_pending_timers(&self) -> bool {
        !self.timers.is_empty()
    }

    // =========================================================================
    // LISTENERS
    // =========================================================================

    /// Register a callback for one gesture type.
    pub fn on<F>(&mut self, kind: GestureKind, mut callback: F) -> ListenerId
    where
        F: FnMut(&GestureEvent) -> CallbackResult + 'static,
    {
        self.listeners.on(move |event: &GestureEvent| {
            if event.kind() == kind {
                callback(event)
            } else {
                Ok(())
            }
        })
    }

    /// Register a callback for every gesture type.
    pub fn on_any<F>(&mut self, callback: F) -> ListenerId
    where
        F: FnMut(&GestureEvent) -> CallbackResult + 'static,
    {
        self.listeners.on(callback)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.listeners.off(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.listener_count()
    }

    // =========================================================================
    // POINTER ENTRY POINTS
    // =========================================================================

    /// Pointer (touch contact or mouse) went down.
    pub fn pointer_down(&mut self, id: i64, pos: Point2, now: f64) -> Vec<GestureEvent> {
        let mut out = Vec::new();

        if self.touches.is_empty() {
            self.begin_sequence(now);
        } else if let Some(kind) = self.active_continuous() {
            // Finger count changed: the running gesture ends, a new one may start.
            self.end_continuous(kind, now, &mut out);
        } else if self.state.kind == Some(GestureKind::LongPress) {
            // A held press gives way to whatever the extra fingers start.
            self.state.kind = None;
            self.state.is_active = false;
            self.state.phase = RecognitionPhase::Possible;
        }

        self.touches.insert(id, ActiveTouch::new(pos));
        let count = self.touches.len();
        self.sequence.max_touches = self.sequence.max_touches.max(count);

        if count == 1 {
            self.state.phase = RecognitionPhase::Possible;
            self.pan_emitted_pos = pos;
            self.velocity.clear();
            self.velocity.push(now, pos);
            self.timers.schedule(
                GestureTimer::LongPress,
                now + self.config.long_press_timeout_ms,
            );
        } else {
            self.timers.cancel(&GestureTimer::LongPress);
            self.rebaseline();
            if count == 3 {
                self.sequence.tap_centroid = self.centroid().unwrap_or(pos);
            }
        }

        out
    }

    /// Pointer moved.
    pub fn pointer_move(&mut self, id: i64, pos: Point2, now: f64) -> Vec<GestureEvent> {
        let mut out = Vec::new();
        let Some(touch) = self.touches.get_mut(&id) else {
            tracing::trace!(id, "move for unknown pointer ignored");
            return out;
        };
        touch.current_pos = pos;
        if touch.start_pos.distance(pos) > self.config.tap_max_distance && !self.sequence.moved {
            self.sequence.moved = true;
            self.timers.cancel(&GestureTimer::LongPress);
        }

        match self.touches.len() {
            0 => {}
            1 => {
                self.velocity.push(now, pos);
                self.on_single_move(now, &mut out);
            }
            2 => self.on_two_finger_move(now, &mut out),
            _ => self.on_multi_finger_move(now, &mut out),
        }
        out
    }

    /// Pointer lifted.
    pub fn pointer_up(&mut self, id: i64, pos: Point2, now: f64) -> Vec<GestureEvent> {
        let mut out = Vec::new();
        let single = self.touches.len() == 1;
        let Some(touch) = self.touches.get_mut(&id) else {
            tracing::trace!(id, "release for unknown pointer ignored");
            return out;
        };
        touch.current_pos = pos;
        let start_pos = touch.start_pos;
        if single {
            self.velocity.push(now, pos);
        }

        let ending = self.active_continuous();
        if let Some(kind) = ending {
            self.end_continuous(kind, now, &mut out);
        }
        self.touches.remove(&id);

        if !self.touches.is_empty() {
            self.rebaseline();
            return out;
        }

        self.timers.cancel(&GestureTimer::LongPress);
        if ending == Some(GestureKind::Pan) {
            self.check_swipe(pos - start_pos, now, &mut out);
        } else if !self.sequence.had_gesture && !self.sequence.moved {
            let duration = now - self.sequence.start_time;
            if duration <= self.config.tap_timeout_ms {
                match self.sequence.max_touches {
                    1 => self.resolve_tap(pos, now, &mut out),
                    3 => {
                        let center = self.sequence.tap_centroid;
                        self.emit(Gesture::ThreeFingerTap { center }, GesturePhase::Instant, now, &mut out);
                    }
                    _ => {}
                }
            }
        }

        self.finish_sequence();
        out
    }

    /// Platform aborted the touch sequence: drop everything.
    pub fn touch_cancel(&mut self) {
        self.reset();
        self.state.phase = RecognitionPhase::Cancelled;
        tracing::debug!("touch sequence cancelled");
    }

    /// Clear all timers and pointer state unconditionally.
    pub fn reset(&mut self) {
        self.touches.clear();
        self.timers.clear();
        self.pending_tap = None;
        self.sequence = SequenceState::default();
        self.multi = None;
        self.velocity.clear();
        self.throttles.clear();
        self.state = GestureState::default();
        self.last_gesture = None;
    }

    /// Poll timers and flush throttled updates. Call once per frame.
    pub fn tick(&mut self, now: f64) -> Vec<GestureEvent> {
        let mut out = Vec::new();

        for timer in self.timers.drain_expired(now) {
            match timer {
                GestureTimer::Tap => {
                    if let Some(pending) = self.pending_tap.take() {
                        self.emit(
                            Gesture::Tap { pos: pending.pos },
                            GesturePhase::Instant,
                            now,
                            &mut out,
                        );
                    }
                }
                GestureTimer::LongPress => {
                    let eligible = self.touches.len() == 1
                        && !self.sequence.moved
                        && self.state.kind.is_none();
                    if eligible {
                        if let Some(touch) = self.touches.values().next().copied() {
                            self.begin(GestureKind::LongPress, now);
                            self.emit(
                                Gesture::LongPress {
                                    pos: touch.current_pos,
                                },
                                GesturePhase::Instant,
                                now,
                                &mut out,
                            );
                        }
                    }
                }
            }
        }

        if let Some(kind) = self.active_continuous() {
            if self.throttle(kind).ready(now) {
                if let Some(gesture) = self.take_update(kind) {
                    self.throttle(kind).try_pass(now);
                    self.emit(gesture, GesturePhase::Update, now, &mut out);
                }
            }
        }

        out
    }

    // =========================================================================
    // CONVENIENCE ENTRY POINTS
    // =========================================================================

    /// Handle a batch of touch contacts going down.
    pub fn touch_start(&mut self, touches: &[TouchPoint], now: f64) -> Vec<GestureEvent> {
        touches
            .iter()
            .flat_map(|t| self.pointer_down(t.id, t.pos, now))
            .collect()
    }

    /// Handle a batch of touch contacts moving.
    pub fn touch_move(&mut self, touches: &[TouchPoint], now: f64) -> Vec<GestureEvent> {
        touches
            .iter()
            .flat_map(|t| self.pointer_move(t.id, t.pos, now))
            .collect()
    }

    /// Handle a batch of touch contacts lifting.
    pub fn touch_end(&mut self, touches: &[TouchPoint], now: f64) -> Vec<GestureEvent> {
        touches
            .iter()
            .flat_map(|t| self.pointer_up(t.id, t.pos, now))
            .collect()
    }

    pub fn mouse_down(&mut self, pos: Point2, now: f64) -> Vec<GestureEvent> {
        self.pointer_down(MOUSE_POINTER_ID, pos, now)
    }

    pub fn mouse_move(&mut self, pos: Point2, now: f64) -> Vec<GestureEvent> {
        self.pointer_move(MOUSE_POINTER_ID, pos, now)
    }

    pub fn mouse_up(&mut self, pos: Point2, now: f64) -> Vec<GestureEvent> {
        self.pointer_up(MOUSE_POINTER_ID, pos, now)
    }

    // =========================================================================
    // INTERNAL HELPERS
    // =========================================================================

    fn begin_sequence(&mut self, now: f64) {
        self.sequence = SequenceState {
            start_time: now,
            ..SequenceState::default()
        };
        self.state = GestureState {
            kind: None,
            start_time: now,
            is_active: false,
            phase: RecognitionPhase::Possible,
        };
        self.multi = None;
        self.velocity.clear();
        for throttle in self.throttles.values_mut() {
            throttle.reset();
        }
    }

    fn finish_sequence(&mut self) {
        let recognized = self.sequence.had_gesture || self.last_gesture.is_some();
        self.state.kind = None;
        self.state.is_active = false;
        self.state.phase = if recognized {
            RecognitionPhase::Completed
        } else {
            RecognitionPhase::None
        };
        self.multi = None;
        self.velocity.clear();
    }

    fn begin(&mut self, kind: GestureKind, now: f64) {
        tracing::debug!(gesture = kind.event_name(), "gesture started");
        self.state = GestureState {
            kind: Some(kind),
            start_time: now,
            is_active: true,
            phase: RecognitionPhase::Active,
        };
        self.sequence.had_gesture = true;
        let throttle = self.throttle(kind);
        throttle.reset();
        throttle.try_pass(now);
    }

    fn active_continuous(&self) -> Option<GestureKind> {
        self.state.kind.filter(|k| k.is_continuous())
    }

    fn throttle(&mut self, kind: GestureKind) -> &mut Throttle {
        let interval = self.config.throttle_ms;
        self.throttles
            .entry(kind)
            .or_insert_with(|| Throttle::new(interval))
    }

    fn emit(
        &mut self,
        gesture: Gesture,
        phase: GesturePhase,
        now: f64,
        out: &mut Vec<GestureEvent>,
    ) {
        let event = GestureEvent {
            gesture,
            phase,
            timestamp: now,
            touch_count: self.touches.len(),
        };
        tracing::trace!(gesture = event.kind().event_name(), ?phase, "gesture emitted");
        self.listeners.emit(&event);
        self.last_gesture = Some(event.gesture.clone());
        out.push(event);
    }

    fn end_continuous(&mut self, kind: GestureKind, now: f64, out: &mut Vec<GestureEvent>) {
        let gesture = self
            .take_update(kind)
            .unwrap_or_else(|| self.idle_payload(kind));
        self.emit(gesture, GesturePhase::End, now, out);
        tracing::debug!(gesture = kind.event_name(), "gesture ended");
        self.state.kind = None;
        self.state.is_active = false;
        self.state.phase = RecognitionPhase::Completed;
    }

    /// Re-anchor every live pointer at its current position.
    fn rebaseline(&mut self) {
        for touch in self.touches.values_mut() {
            touch.start_pos = touch.current_pos;
        }
        self.multi = match self.touches.len() {
            0 | 1 => None,
            _ => {
                let center = self.centroid().unwrap_or(Point2::ZERO);
                let (distance, angle) = self.two_finger_geometry().unwrap_or((0.0, 0.0));
                Some(MultiTouchTracking {
                    start_distance: distance,
                    start_angle: angle,
                    start_center: center,
                    emitted_distance: distance,
                    emitted_center: center,
                })
            }
        };
        if let Some(touch) = self.single_touch() {
            self.pan_emitted_pos = touch.current_pos;
        }
        self.velocity.clear();
    }

    fn single_touch(&self) -> Option<ActiveTouch> {
        if self.touches.len() == 1 {
            self.touches.values().next().copied()
        } else {
            None
        }
    }

    fn centroid(&self) -> Option<Point2> {
        Point2::centroid(self.touches.values().map(|t| t.current_pos))
    }

    /// Distance and angle between the first two pointers.
    fn two_finger_geometry(&self) -> Option<(f64, f64)> {
        let mut iter = self.touches.values();
        let a = iter.next()?.current_pos;
        let b = iter.next()?.current_pos;
        let d = b - a;
        Some((d.length(), d.y.atan2(d.x)))
    }

    fn on_single_move(&mut self, now: f64, out: &mut Vec<GestureEvent>) {
        let Some(touch) = self.single_touch() else {
            return;
        };
        match self.state.kind {
            Some(GestureKind::Pan) => {
                if self.throttle(GestureKind::Pan).try_pass(now) {
                    if let Some(gesture) = self.take_update(GestureKind::Pan) {
                        self.emit(gesture, GesturePhase::Update, now, out);
                    }
                }
            }
            None | Some(GestureKind::LongPress) => {
                if touch.start_pos.distance(touch.current_pos) > self.config.pan_threshold {
                    self.begin(GestureKind::Pan, now);
                    if let Some(gesture) = self.take_update(GestureKind::Pan) {
                        self.emit(gesture, GesturePhase::Start, now, out);
                    }
                }
            }
            _ => {}
        }
    }

    fn on_two_finger_move(&mut self, now: f64, out: &mut Vec<GestureEvent>) {
        let (Some(tracking), Some(center), Some((distance, _))) =
            (self.multi, self.centroid(), self.two_finger_geometry())
        else {
            return;
        };

        match self.state.kind {
            Some(kind @ (GestureKind::Pinch | GestureKind::TwoFingerPan)) => {
                if self.throttle(kind).try_pass(now) {
                    if let Some(gesture) = self.take_update(kind) {
                        self.emit(gesture, GesturePhase::Update, now, out);
                    }
                }
            }
            None => {
                let pinching = tracking.start_distance > DISTANCE_EPSILON
                    && (distance - tracking.start_distance).abs()
                        > self.config.pinch_threshold * tracking.start_distance;
                let kind = if pinching {
                    GestureKind::Pinch
                } else if center.distance(tracking.start_center) > self.config.pan_threshold {
                    GestureKind::TwoFingerPan
                } else {
                    return;
                };
                self.begin(kind, now);
                if let Some(gesture) = self.take_update(kind) {
                    self.emit(gesture, GesturePhase::Start, now, out);
                }
            }
            _ => {}
        }
    }

    fn on_multi_finger_move(&mut self, now: f64, out: &mut Vec<GestureEvent>) {
        let (Some(tracking), Some(center)) = (self.multi, self.centroid()) else {
            return;
        };
        match self.state.kind {
            Some(GestureKind::MultiFingerPan) => {
                if self.throttle(GestureKind::MultiFingerPan).try_pass(now) {
                    if let Some(gesture) = self.take_update(GestureKind::MultiFingerPan) {
                        self.emit(gesture, GesturePhase::Update, now, out);
                    }
                }
            }
            None => {
                if center.distance(tracking.start_center) > self.config.pan_threshold {
                    self.begin(GestureKind::MultiFingerPan, now);
                    if let Some(gesture) = self.take_update(GestureKind::MultiFingerPan) {
                        self.emit(gesture, GesturePhase::Start, now, out);
                    }
                }
            }
            _ => {}
        }
    }

    /// Build the next update payload for `kind` and mark it as emitted.
    /// Returns `None` when nothing moved since the last emission.
    fn take_update(&mut self, kind: GestureKind) -> Option<Gesture> {
        match kind {
            GestureKind::Pan => {
                let touch = self.single_touch()?;
                let delta = touch.current_pos - self.pan_emitted_pos;
                if delta == Point2::ZERO {
                    return None;
                }
                self.pan_emitted_pos = touch.current_pos;
                Some(Gesture::Pan {
                    start: touch.start_pos,
                    current: touch.current_pos,
                    delta,
                })
            }
            GestureKind::TwoFingerPan | GestureKind::MultiFingerPan => {
                let center = self.centroid()?;
                let mut tracking = self.multi?;
                let delta = center - tracking.emitted_center;
                if delta == Point2::ZERO {
                    return None;
                }
                tracking.emitted_center = center;
                self.multi = Some(tracking);
                Some(if kind == GestureKind::TwoFingerPan {
                    Gesture::TwoFingerPan { center, delta }
                } else {
                    Gesture::MultiFingerPan {
                        center,
                        delta,
                        touch_count: self.touches.len(),
                    }
                })
            }
            GestureKind::Pinch => {
                let center = self.centroid()?;
                let (distance, angle) = self.two_finger_geometry()?;
                let mut tracking = self.multi?;
                if (distance - tracking.emitted_distance).abs() < DISTANCE_EPSILON
                    && center == tracking.emitted_center
                {
                    return None;
                }
                let scale = distance / tracking.start_distance;
                let scale_delta = if tracking.emitted_distance > DISTANCE_EPSILON {
                    distance / tracking.emitted_distance
                } else {
                    1.0
                };
                tracking.emitted_distance = distance;
                tracking.emitted_center = center;
                self.multi = Some(tracking);
                Some(Gesture::Pinch {
                    center,
                    scale,
                    scale_delta,
                    rotation: angle - tracking.start_angle,
                })
            }
            _ => None,
        }
    }

    /// End payload when nothing moved since the last update.
    fn idle_payload(&self, kind: GestureKind) -> Gesture {
        let tracking = self.multi;
        let center = tracking.map_or(self.pan_emitted_pos, |t| t.emitted_center);
        match kind {
            GestureKind::TwoFingerPan => Gesture::TwoFingerPan {
                center,
                delta: Point2::ZERO,
            },
            GestureKind::MultiFingerPan => Gesture::MultiFingerPan {
                center,
                delta: Point2::ZERO,
                touch_count: self.touches.len(),
            },
            GestureKind::Pinch => Gesture::Pinch {
                center,
                scale: tracking
                    .filter(|t| t.start_distance > DISTANCE_EPSILON)
                    .map_or(1.0, |t| t.emitted_distance / t.start_distance),
                scale_delta: 1.0,
                rotation: 0.0,
            },
            _ => {
                let start = self
                    .single_touch()
                    .map_or(self.pan_emitted_pos, |t| t.start_pos);
                Gesture::Pan {
                    start,
                    current: self.pan_emitted_pos,
                    delta: Point2::ZERO,
                }
            }
        }
    }

    fn check_swipe(&mut self, total: Point2, now: f64, out: &mut Vec<GestureEvent>) {
        let velocity = self.velocity.velocity();
        let speed = velocity.length();
        if total.length() > self.config.swipe_threshold && speed > self.config.swipe_min_velocity {
            let direction = SwipeDirection::from_vector(total);
            self.emit(
                Gesture::Swipe {
                    direction,
                    velocity,
                    speed,
                },
                GesturePhase::Instant,
                now,
                out,
            );
        }
    }

    /// A clean single tap just lifted: either completes a double tap or
    /// waits for the double-tap window before confirming.
    fn resolve_tap(&mut self, pos: Point2, now: f64, out: &mut Vec<GestureEvent>) {
        if let Some(pending) = self.pending_tap.take() {
            self.timers.cancel(&GestureTimer::Tap);
            let in_time = now - pending.time <= self.config.double_tap_timeout_ms;
            let in_place = pending.pos.distance(pos) <= self.config.tap_max_distance;
            if in_time && in_place {
                self.emit(Gesture::DoubleTap { pos }, GesturePhase::Instant, now, out);
                return;
            }
            // Timer expired but was not polled yet: confirm the earlier tap first.
            self.emit(
                Gesture::Tap { pos: pending.pos },
                GesturePhase::Instant,
                now,
                out,
            );
        }
        self.pending_tap = Some(PendingTap { pos, time: now });
        self.timers
            .schedule(GestureTimer::Tap, now + self.config.double_tap_timeout_ms);
    }
}
