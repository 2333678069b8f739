//! Frame-driven animation of typed values.
//!
//! One [`AnimationSystem`] drives every running animation from a single
//! `tick()` per frame, in registration order. Each animation is keyed by a
//! caller-chosen id; starting a new animation under a live id cancels the old
//! one. Callers get an [`AnimationHandle`] future that resolves with the
//! [`AnimationOutcome`] and never fails: cancellation and callback failures
//! are outcomes, not errors.
//!
//! # Usage
//! ```ignore
//! let handle = animations.animate("fade", 0.0, 1.0, AnimationConfig::default(), |v| {
//!     renderer.set_opacity(*v);
//!     Ok(())
//! });
//! // each frame:
//! animations.tick();
//! ```

use crate::easing::Easing;
use crate::interpolate::Interpolate;
use crate::viewport::{SharedViewport, ViewportSnapshot};
use futures::channel::oneshot;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use weave_core::{panic_message, Bounds, CallbackResult, Point2, SharedClock};
use weave_events::RollingCounter;

/// Zoom changes below this are not animated.
pub const MIN_ZOOM_CHANGE: f64 = 0.001;
/// Pan changes below this (per axis, pixels) are not animated.
pub const MIN_PAN_CHANGE: f64 = 0.1;

pub const VIEWPORT_ZOOM_ANIMATION: &str = "viewport:zoom";
pub const VIEWPORT_PAN_ANIMATION: &str = "viewport:pan";
pub const VIEWPORT_TRANSFORM_ANIMATION: &str = "viewport:transform";

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Per-animation timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub duration_ms: f64,
    pub easing: Easing,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            duration_ms: 300.0,
            easing: Easing::EaseOutCubic,
        }
    }
}

impl AnimationConfig {
    pub fn new(duration_ms: f64, easing: Easing) -> Self {
        Self {
            duration_ms,
            easing,
        }
    }

    pub fn with_duration(duration_ms: f64) -> Self {
        Self {
            duration_ms,
            ..Self::default()
        }
    }
}

type ProgressFn = Box<dyn FnMut(f64) -> CallbackResult>;
type CompleteFn = Box<dyn FnOnce() -> CallbackResult>;

/// Optional callbacks attached to one animation.
#[derive(Default)]
pub struct AnimationCallbacks {
    on_progress: Option<ProgressFn>,
    on_complete: Option<CompleteFn>,
}

impl AnimationCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called each frame with linear progress in `[0,1]`.
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(f64) -> CallbackResult + 'static,
    {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Called once when the animation reaches its target.
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> CallbackResult + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for AnimationCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationCallbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// How an animation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimationOutcome {
    Completed,
    Cancelled,
    /// A callback failed; the animation stopped where it was.
    Failed(String),
}

impl AnimationOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, AnimationOutcome::Completed)
    }
}

/// Resolves when its animation completes, is cancelled or fails.
///
/// A joined handle (see [`AnimationHandle::join`]) resolves once every part
/// has, with the first non-completed outcome if any.
#[derive(Debug)]
pub struct AnimationHandle {
    inner: HandleInner,
    resolved: Option<AnimationOutcome>,
}

#[derive(Debug)]
enum HandleInner {
    Single(oneshot::Receiver<AnimationOutcome>),
    Joined(Vec<AnimationHandle>),
}

impl AnimationHandle {
    fn pending() -> (oneshot::Sender<AnimationOutcome>, Self) {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            inner: HandleInner::Single(rx),
            resolved: None,
        };
        (tx, handle)
    }

    /// A handle that is already resolved.
    pub fn ready(outcome: AnimationOutcome) -> Self {
        Self {
            inner: HandleInner::Joined(Vec::new()),
            resolved: Some(outcome),
        }
    }

    /// Wait for several animations as one.
    pub fn join(handles: impl IntoIterator<Item = AnimationHandle>) -> Self {
        Self {
            inner: HandleInner::Joined(handles.into_iter().collect()),
            resolved: None,
        }
    }

    /// Non-blocking check; `None` while the animation runs.
    pub fn try_outcome(&mut self) -> Option<AnimationOutcome> {
        if self.resolved.is_none() {
            self.resolved = match &mut self.inner {
                HandleInner::Single(rx) => match rx.try_recv() {
                    Ok(outcome) => outcome,
                    // sender dropped with the system
                    Err(oneshot::Canceled) => Some(AnimationOutcome::Cancelled),
                },
                HandleInner::Joined(parts) => {
                    let outcomes: Vec<_> = parts.iter_mut().map(AnimationHandle::try_outcome).collect();
                    combine(outcomes)
                }
            };
        }
        self.resolved.clone()
    }
}

fn combine(outcomes: Vec<Option<AnimationOutcome>>) -> Option<AnimationOutcome> {
    let outcomes: Option<Vec<AnimationOutcome>> = outcomes.into_iter().collect();
    outcomes.map(|all| {
        all.into_iter()
            .find(|o| !o.is_completed())
            .unwrap_or(AnimationOutcome::Completed)
    })
}

impl Future for AnimationHandle {
    type Output = AnimationOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.resolved.clone() {
            return Poll::Ready(outcome);
        }
        let polled = match &mut self.inner {
            HandleInner::Single(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => Some(outcome),
                Poll::Ready(Err(oneshot::Canceled)) => Some(AnimationOutcome::Cancelled),
                Poll::Pending => None,
            },
            HandleInner::Joined(parts) => {
                let outcomes: Vec<_> = parts
                    .iter_mut()
                    .map(|part| match Pin::new(part).poll(cx) {
                        Poll::Ready(outcome) => Some(outcome),
                        Poll::Pending => None,
                    })
                    .collect();
                combine(outcomes)
            }
        };
        match polled {
            Some(outcome) => {
                self.resolved = Some(outcome.clone());
                Poll::Ready(outcome)
            }
            None => Poll::Pending,
        }
    }
}

// =============================================================================
// RUNNING ANIMATIONS
// =============================================================================

/// Type-erased running animation.
trait Running {
    fn id(&self) -> &str;
    /// Advance to `now`; `Some` once finished.
    fn advance(&mut self, now: f64) -> Option<AnimationOutcome>;
    /// Run completion callbacks (if completed) and resolve the handle.
    fn settle(self: Box<Self>, outcome: AnimationOutcome);
}

struct Tween<T: Interpolate> {
    id: String,
    start_time: f64,
    config: AnimationConfig,
    start: T,
    target: T,
    on_update: Box<dyn FnMut(&T) -> CallbackResult>,
    callbacks: AnimationCallbacks,
    done: oneshot::Sender<AnimationOutcome>,
}

/// Run a host callback, containing errors and panics.
fn guarded(id: &str, stage: &'static str, f: impl FnOnce() -> CallbackResult) -> Result<(), String> {
    let failure = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(err)) => err.to_string(),
        Err(panic) => panic_message(&panic),
    };
    tracing::warn!(animation = id, stage, error = %failure, "animation callback failed");
    Err(failure)
}

impl<T: Interpolate> Running for Tween<T> {
    fn id(&self) -> &str {
        &self.id
    }

    fn advance(&mut self, now: f64) -> Option<AnimationOutcome> {
        let progress = if self.config.duration_ms <= 0.0 {
            1.0
        } else {
            ((now - self.start_time) / self.config.duration_ms).clamp(0.0, 1.0)
        };
        let eased = self.config.easing.apply(progress);
        let value = self.start.interpolate(&self.target, eased);

        let on_update = &mut self.on_update;
        if let Err(e) = guarded(&self.id, "update", || on_update(&value)) {
            return Some(AnimationOutcome::Failed(e));
        }
        if let Some(on_progress) = self.callbacks.on_progress.as_mut() {
            if let Err(e) = guarded(&self.id, "progress", || on_progress(progress)) {
                return Some(AnimationOutcome::Failed(e));
            }
        }
        (progress >= 1.0).then_some(AnimationOutcome::Completed)
    }

    fn settle(mut self: Box<Self>, outcome: AnimationOutcome) {
        let mut outcome = outcome;
        if outcome.is_completed() {
            if let Some(on_complete) = self.callbacks.on_complete.take() {
                if let Err(e) = guarded(&self.id, "complete", on_complete) {
                    outcome = AnimationOutcome::Failed(e);
                }
            }
        }
        tracing::trace!(animation = %self.id, ?outcome, "animation settled");
        let _ = self.done.send(outcome);
    }
}

// =============================================================================
// ANIMATION SYSTEM
// =============================================================================

/// Drives all animations from one frame tick.
pub struct AnimationSystem {
    clock: SharedClock,
    running: Vec<Box<dyn Running>>,
    defaults: AnimationConfig,
    reduced_motion: bool,
    motion_reduction_threshold_ms: f64,
    frames: RollingCounter,
    loop_active: bool,
}

impl std::fmt::Debug for AnimationSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationSystem")
            .field("active", &self.active_animation_ids())
            .field("reduced_motion", &self.reduced_motion)
            .field("loop_active", &self.loop_active)
            .finish_non_exhaustive()
    }
}

impl AnimationSystem {
    pub fn new(clock: SharedClock) -> Self {
        Self::with_defaults(clock, AnimationConfig::default())
    }

    pub fn with_defaults(clock: SharedClock, defaults: AnimationConfig) -> Self {
        Self {
            clock,
            running: Vec::new(),
            defaults,
            reduced_motion: false,
            motion_reduction_threshold_ms: 100.0,
            frames: RollingCounter::new(1000.0),
            loop_active: false,
        }
    }

    pub fn defaults(&self) -> AnimationConfig {
        self.defaults
    }

    pub fn set_defaults(&mut self, defaults: AnimationConfig) {
        self.defaults = defaults;
    }

    /// Honor a reduced-motion preference: longer animations snap to target.
    pub fn set_reduced_motion(&mut self, enabled: bool) {
        self.reduced_motion = enabled;
    }

    pub fn reduced_motion(&self) -> bool {
        self.reduced_motion
    }

    pub fn set_motion_reduction_threshold(&mut self, ms: f64) {
        self.motion_reduction_threshold_ms = ms.max(0.0);
    }

    // =========================================================================
    // START / CANCEL
    // =========================================================================

    /// Animate from `start` to `target`, calling `on_update` every frame.
    pub fn animate<T, F>(
        &mut self,
        id: impl Into<String>,
        start: T,
        target: T,
        config: AnimationConfig,
        on_update: F,
    ) -> AnimationHandle
    where
        T: Interpolate + 'static,
        F: FnMut(&T) -> CallbackResult + 'static,
    {
        self.animate_with(id, start, target, config, AnimationCallbacks::default(), on_update)
    }

    /// [`animate`](Self::animate) with progress/completion callbacks.
    pub fn animate_with<T, F>(
        &mut self,
        id: impl Into<String>,
        start: T,
        target: T,
        config: AnimationConfig,
        callbacks: AnimationCallbacks,
        on_update: F,
    ) -> AnimationHandle
    where
        T: Interpolate + 'static,
        F: FnMut(&T) -> CallbackResult + 'static,
    {
        let id = id.into();
        self.cancel(&id);

        let (done, handle) = AnimationHandle::pending();
        let mut tween = Box::new(Tween {
            id: id.clone(),
            start_time: self.clock.now_ms(),
            config,
            start,
            target,
            on_update: Box::new(on_update),
            callbacks,
            done,
        });

        let snap = config.duration_ms <= 0.0
            || (self.reduced_motion && config.duration_ms > self.motion_reduction_threshold_ms);
        if snap {
            tracing::debug!(animation = %id, "snapping to target");
            tween.config.duration_ms = 0.0;
            let outcome = tween
                .advance(f64::INFINITY)
                .unwrap_or(AnimationOutcome::Completed);
            tween.settle(outcome);
            return handle;
        }

        tracing::trace!(animation = %id, duration_ms = config.duration_ms, "animation started");
        self.running.push(tween);
        if !self.loop_active {
            self.loop_active = true;
            tracing::debug!("animation loop started");
        }
        handle
    }

    /// Tween a number.
    pub fn animate_value<F>(
        &mut self,
        id: impl Into<String>,
        start: f64,
        target: f64,
        config: AnimationConfig,
        on_update: F,
    ) -> AnimationHandle
    where
        F: FnMut(&f64) -> CallbackResult + 'static,
    {
        self.animate(id, start, target, config, on_update)
    }

    /// Cancel one animation. Its handle resolves with `Cancelled`.
    pub fn cancel(&mut self, id: &str) -> bool {
        let Some(index) = self.running.iter().position(|a| a.id() == id) else {
            return false;
        };
        let animation = self.running.remove(index);
        tracing::trace!(animation = id, "animation cancelled");
        animation.settle(AnimationOutcome::Cancelled);
        self.stop_loop_if_idle();
        true
    }

    /// Cancel everything. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled: Vec<_> = self.running.drain(..).collect();
        let count = cancelled.len();
        for animation in cancelled {
            animation.settle(AnimationOutcome::Cancelled);
        }
        self.stop_loop_if_idle();
        count
    }

    // =========================================================================
    // FRAME LOOP
    // =========================================================================

    /// Advance every animation to the clock's current time. Returns the
    /// number still running.
    pub fn tick(&mut self) -> usize {
        if self.running.is_empty() {
            self.stop_loop_if_idle();
            return 0;
        }
        let now = self.clock.now_ms();
        self.frames.record(now);

        let mut finished = Vec::new();
        for (index, animation) in self.running.iter_mut().enumerate() {
            if let Some(outcome) = animation.advance(now) {
                finished.push((index, outcome));
            }
        }
        for (index, outcome) in finished.into_iter().rev() {
            let animation = self.running.remove(index);
            animation.settle(outcome);
        }
        self.stop_loop_if_idle();
        self.running.len()
    }

    fn stop_loop_if_idle(&mut self) {
        if self.running.is_empty() && self.loop_active {
            self.loop_active = false;
            tracing::debug!("animation loop stopped");
        }
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    pub fn is_animating(&self) -> bool {
        !self.running.is_empty()
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.running.iter().any(|a| a.id() == id)
    }

    pub fn active_animation_ids(&self) -> Vec<String> {
        self.running.iter().map(|a| a.id().to_string()).collect()
    }

    /// True while the frame loop should keep requesting frames.
    pub fn needs_frame(&self) -> bool {
        self.loop_active
    }

    /// Animation frames over the last second.
    pub fn fps(&mut self) -> f64 {
        let now = self.clock.now_ms();
        self.frames.rate_per_sec(now)
    }

    // =========================================================================
    // VIEWPORT HELPERS
    // =========================================================================

    /// Animate zoom about `center` (screen point kept fixed).
    pub fn animate_zoom(
        &mut self,
        viewport: &SharedViewport,
        zoom: f64,
        center: Option<Point2>,
        config: AnimationConfig,
    ) -> AnimationHandle {
        let (current, target) = {
            let vp = viewport.borrow();
            (vp.zoom(), vp.clamp_zoom(zoom))
        };
        if (target - current).abs() < MIN_ZOOM_CHANGE {
            return AnimationHandle::ready(AnimationOutcome::Completed);
        }
        self.cancel(VIEWPORT_TRANSFORM_ANIMATION);
        let vp = viewport.clone();
        self.animate(VIEWPORT_ZOOM_ANIMATION, current, target, config, move |z: &f64| {
            vp.borrow_mut().set_zoom(*z, center);
            Ok(())
        })
    }

    /// Animate pan to an absolute value.
    pub fn animate_pan(
        &mut self,
        viewport: &SharedViewport,
        pan: Point2,
        config: AnimationConfig,
    ) -> AnimationHandle {
        let (current, target) = {
            let vp = viewport.borrow();
            let mut probe = vp.clone();
            probe.set_pan(pan);
            (vp.pan(), probe.pan())
        };
        if pan_change_below_threshold(current, target) {
            return AnimationHandle::ready(AnimationOutcome::Completed);
        }
        self.cancel(VIEWPORT_TRANSFORM_ANIMATION);
        let vp = viewport.clone();
        self.animate(VIEWPORT_PAN_ANIMATION, current, target, config, move |p: &Point2| {
            vp.borrow_mut().set_pan(*p);
            Ok(())
        })
    }

    /// Animate zoom and pan together to `target`.
    pub fn animate_to_viewport(
        &mut self,
        viewport: &SharedViewport,
        target: ViewportSnapshot,
        config: AnimationConfig,
    ) -> AnimationHandle {
        let (current, target) = {
            let vp = viewport.borrow();
            let mut probe = vp.clone();
            probe.apply_snapshot(target);
            (vp.snapshot(), probe.snapshot())
        };
        if (target.zoom - current.zoom).abs() < MIN_ZOOM_CHANGE
            && pan_change_below_threshold(current.pan, target.pan)
        {
            return AnimationHandle::ready(AnimationOutcome::Completed);
        }
        self.cancel(VIEWPORT_ZOOM_ANIMATION);
        self.cancel(VIEWPORT_PAN_ANIMATION);
        let vp = viewport.clone();
        self.animate(
            VIEWPORT_TRANSFORM_ANIMATION,
            current,
            target,
            config,
            move |s: &ViewportSnapshot| {
                vp.borrow_mut().apply_snapshot(*s);
                Ok(())
            },
        )
    }

    /// Animate to the fit-to-bounds transform.
    pub fn animate_to_fit(
        &mut self,
        viewport: &SharedViewport,
        content: Bounds,
        padding: f64,
        config: AnimationConfig,
    ) -> AnimationHandle {
        let target = viewport.borrow().fit_snapshot(content, padding);
        self.animate_to_viewport(viewport, target, config)
    }

    /// Animate back to zoom 1 and zero pan.
    pub fn animate_reset(&mut self, viewport: &SharedViewport, config: AnimationConfig) -> AnimationHandle {
        self.animate_to_viewport(viewport, ViewportSnapshot::default(), config)
    }
}

fn pan_change_below_threshold(a: Point2, b: Point2) -> bool {
    (a.x - b.x).abs() < MIN_PAN_CHANGE && (a.y - b.y).abs() < MIN_PAN_CHANGE
}
