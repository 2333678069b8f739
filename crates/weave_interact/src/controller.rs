//! Interaction controller: the façade hosts talk to.
//!
//! Owns the viewport, the gesture recognizer, the animation system, the
//! node snapshot with its spatial index, and the selection. Hosts feed it
//! [`RawInput`] and call [`InteractionController::tick`] once per frame; it
//! pushes transforms and highlights to the [`Renderer`] and publishes
//! [`InteractionEvent`]s.
//!
//! # Frame loop
//! ```ignore
//! controller.initialize(Box::new(renderer), 1280.0, 720.0)?;
//! controller.update_nodes(layout_positions);
//! loop {
//!     for input in host.drain_input() {
//!         controller.handle_input(input);
//!     }
//!     let keep_ticking = controller.tick();
//!     host.present();
//! }
//! ```

use crate::animation::{
    AnimationConfig, AnimationHandle, AnimationOutcome, AnimationSystem, VIEWPORT_PAN_ANIMATION,
    VIEWPORT_TRANSFORM_ANIMATION, VIEWPORT_ZOOM_ANIMATION,
};
use crate::config::InteractionConfig;
use crate::error::InteractionError;
use crate::events::{InteractionEvent, ViewportChangeReason};
use crate::renderer::{Renderer, RendererKind, Transform};
use crate::selection::{SelectionDiff, SelectionMode, SelectionSnapshot};
use crate::spatial::{LinearIndex, PositionedNode, SpatialIndex};
use crate::state::{InteractionState, PointerMode};
use crate::viewport::{SharedViewport, ViewportSnapshot, ViewportState};
use weave_core::{
    Bounds, CallbackResult, Emitter, ListenerId, NodeId, Point2, Rect, SharedClock, SystemClock,
    Throttle,
};
use weave_events::{EventBus, Topic};
use weave_input::{
    Gesture, GestureEvent, GesturePhase, GestureRecognizer, KeyCode, KeyModifiers, MouseButton,
    RawInput,
};

/// Where the last gesture-producing input came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputSource {
    Mouse,
    Touch,
}

/// Viewport state and node snapshot a memoized query was answered against.
#[derive(Debug, Clone, Copy, PartialEq)]
struct QueryEpoch {
    viewport: ViewportSnapshot,
    nodes_version: u64,
}

#[derive(Debug, Clone)]
struct Memo<Q, R> {
    query: Q,
    epoch: QueryEpoch,
    result: R,
}

/// Memoized spatial query.
///
/// The last answer is reused while the query, the viewport and the node
/// snapshot are all unchanged.
#[derive(Debug, Clone)]
struct QueryCache<Q, R> {
    last: Option<Memo<Q, R>>,
}

impl<Q: PartialEq, R: Clone> QueryCache<Q, R> {
    fn new() -> Self {
        Self { last: None }
    }

    fn lookup(&self, query: &Q, epoch: QueryEpoch) -> Option<R> {
        self.last
            .as_ref()
            .filter(|memo| memo.epoch == epoch && memo.query == *query)
            .map(|memo| memo.result.clone())
    }

    fn store(&mut self, query: Q, epoch: QueryEpoch, result: R) {
        self.last = Some(Memo {
            query,
            epoch,
            result,
        });
    }

    fn clear(&mut self) {
        self.last = None;
    }
}

/// Bookkeeping for animation-driven viewport changes.
#[derive(Debug, Clone, Copy)]
struct ViewportAnimation {
    last: ViewportSnapshot,
    reason: ViewportChangeReason,
}

const VIEWPORT_ANIMATIONS: [&str; 3] = [
    VIEWPORT_ZOOM_ANIMATION,
    VIEWPORT_PAN_ANIMATION,
    VIEWPORT_TRANSFORM_ANIMATION,
];

/// Renderer-agnostic interaction controller.
pub struct InteractionController {
    config: InteractionConfig,
    clock: SharedClock,
    viewport: SharedViewport,
    gestures: GestureRecognizer,
    animations: AnimationSystem,
    renderer: Option<Box<dyn Renderer>>,
    index: Option<Box<dyn SpatialIndex>>,
    fallback: LinearIndex,
    nodes: Vec<PositionedNode>,
    nodes_version: u64,
    state: InteractionState,
    events: Emitter<InteractionEvent>,
    bus: Option<EventBus<InteractionEvent>>,
    point_queries: QueryCache<Point2, Option<NodeId>>,
    region_queries: QueryCache<Rect, Vec<NodeId>>,
    hover_throttle: Throttle,
    /// Latest pointer position whose hover check the throttle held back.
    pending_hover: Option<Point2>,
    viewport_animation: Option<ViewportAnimation>,
    last_gesture_source: InputSource,
    initialized: bool,
}

impl std::fmt::Debug for InteractionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionController")
            .field("initialized", &self.initialized)
            .field("viewport", &self.viewport.borrow().snapshot())
            .field("nodes", &self.nodes.len())
            .field("selected", &self.state.selection.len())
            .field("renderer", &self.renderer.as_ref().map(|r| r.kind()))
            .field("indexed", &self.index.is_some())
            .finish_non_exhaustive()
    }
}

impl InteractionController {
    pub fn new(config: InteractionConfig, clock: SharedClock) -> Result<Self, InteractionError> {
        config.validate()?;

        let mut viewport = ViewportState::default();
        viewport.set_zoom_limits(config.viewport.min_zoom, config.viewport.max_zoom)?;
        viewport.set_pan_bounds(config.viewport.pan_bounds);
        viewport.reset(config.viewport.initial_zoom, config.viewport.initial_pan);

        let mut animations = AnimationSystem::with_defaults(clock.clone(), config.animation.transition);
        animations.set_reduced_motion(config.animation.reduced_motion);
        animations.set_motion_reduction_threshold(config.animation.motion_reduction_threshold_ms);

        let throttle_ms = config.behavior.throttle_ms;
        Ok(Self {
            gestures: GestureRecognizer::with_config(config.gestures.clone()),
            viewport: viewport.shared(),
            animations,
            clock,
            renderer: None,
            index: None,
            fallback: LinearIndex::new(),
            nodes: Vec::new(),
            nodes_version: 0,
            state: InteractionState::default(),
            events: Emitter::new("interaction"),
            bus: None,
            point_queries: QueryCache::new(),
            region_queries: QueryCache::new(),
            hover_throttle: Throttle::new(throttle_ms),
            pending_hover: None,
            viewport_animation: None,
            last_gesture_source: InputSource::Mouse,
            initialized: false,
            config,
        })
    }

    /// Controller on the wall clock.
    pub fn with_system_clock(config: InteractionConfig) -> Result<Self, InteractionError> {
        Self::new(config, SystemClock::shared())
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Bind the renderer and container size. Returns `Ok(false)` if already
    /// initialized.
    pub fn initialize(
        &mut self,
        renderer: Box<dyn Renderer>,
        width: f64,
        height: f64,
    ) -> Result<bool, InteractionError> {
        if self.initialized {
            return Ok(false);
        }
        self.viewport.borrow_mut().update_dimensions(width, height)?;
        tracing::info!(renderer = %renderer.kind(), width, height, "interaction controller initialized");
        self.renderer = Some(renderer);
        self.initialized = true;
        self.check_renderer_capacity();
        self.update_renderer();
        Ok(true)
    }

    /// Stop animations, reset gestures and release the renderer, index,
    /// nodes and listeners. Returns `false` if not initialized.
    pub fn destroy(&mut self) -> bool {
        if !self.initialized {
            return false;
        }
        self.animations.cancel_all();
        self.viewport_animation = None;
        self.gestures.reset();
        if let Some(mut bus) = self.bus.take() {
            bus.flush_all();
        }
        self.renderer = None;
        self.index = None;
        self.fallback = LinearIndex::new();
        self.nodes.clear();
        self.nodes_version += 1;
        self.point_queries.clear();
        self.region_queries.clear();
        self.hover_throttle.reset();
        self.pending_hover = None;
        self.state = InteractionState::default();
        self.events.clear();
        self.initialized = false;
        tracing::info!("interaction controller destroyed");
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Advance one frame: gesture timers, animations, event batches.
    /// Returns whether another frame is needed.
    pub fn tick(&mut self) -> bool {
        if !self.initialized {
            return false;
        }
        let now = self.clock.now_ms();
        let events = self.gestures.tick(now);
        self.apply_gestures(events, self.last_gesture_source);

        if let Some(pos) = self.pending_hover {
            if !matches!(self.state.pointer, PointerMode::Idle) {
                self.pending_hover = None;
            } else if self.hover_throttle.ready(now) {
                self.update_hover(pos);
            }
        }

        self.animations.tick();
        self.sync_animated_viewport();
        self.state.is_animating = self.animations.is_animating();

        if let Some(bus) = self.bus.as_mut() {
            bus.tick();
            bus.record_frame();
        }
        self.animations.needs_frame() || self.gestures.has_pending_timers() || self.pending_hover.is_some()
    }

    // =========================================================================
    // CONFIGURATION & ACCESSORS
    // =========================================================================

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    /// Replace the configuration. The current transform is kept (re-clamped).
    pub fn set_config(&mut self, config: InteractionConfig) -> Result<(), InteractionError> {
        config.validate()?;
        let previous = self.snapshot();
        {
            let mut vp = self.viewport.borrow_mut();
            vp.set_zoom_limits(config.viewport.min_zoom, config.viewport.max_zoom)?;
            vp.set_pan_bounds(config.viewport.pan_bounds);
        }
        self.gestures.set_config(config.gestures.clone());
        self.animations.set_defaults(config.animation.transition);
        self.animations.set_reduced_motion(config.animation.reduced_motion);
        self.animations
            .set_motion_reduction_threshold(config.animation.motion_reduction_threshold_ms);
        self.point_queries.clear();
        self.region_queries.clear();
        self.hover_throttle = Throttle::new(config.behavior.throttle_ms);
        self.config = config;
        self.commit_viewport(previous, ViewportChangeReason::Programmatic);
        Ok(())
    }

    /// Shared handle to the viewport.
    pub fn viewport(&self) -> SharedViewport {
        self.viewport.clone()
    }

    pub fn viewport_snapshot(&self) -> ViewportSnapshot {
        self.snapshot()
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn gestures_mut(&mut self) -> &mut GestureRecognizer {
        &mut self.gestures
    }

    pub fn animations(&self) -> &AnimationSystem {
        &self.animations
    }

    pub fn animations_mut(&mut self) -> &mut AnimationSystem {
        &mut self.animations
    }

    pub fn nodes(&self) -> &[PositionedNode] {
        &self.nodes
    }

    pub fn renderer_kind(&self) -> Option<RendererKind> {
        self.renderer.as_ref().map(|r| r.kind())
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Listen to every controller event.
    pub fn on_event<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&InteractionEvent) -> CallbackResult + 'static,
    {
        self.events.on(listener)
    }

    /// Listen to one topic (`"viewportChange"`, `"tap"`, ...).
    pub fn on<F>(&mut self, topic: &'static str, mut listener: F) -> ListenerId
    where
        F: FnMut(&InteractionEvent) -> CallbackResult + 'static,
    {
        self.events.on(move |event: &InteractionEvent| {
            if event.topic() == topic {
                listener(event)
            } else {
                Ok(())
            }
        })
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    /// Also publish every event through `bus` (ticked with the controller).
    pub fn attach_event_bus(&mut self, bus: EventBus<InteractionEvent>) {
        self.bus = Some(bus);
    }

    pub fn event_bus_mut(&mut self) -> Option<&mut EventBus<InteractionEvent>> {
        self.bus.as_mut()
    }

    fn emit(&mut self, event: InteractionEvent) {
        self.events.emit(&event);
        if let Some(bus) = self.bus.as_mut() {
            bus.publish(event);
        }
    }

    fn announce(&mut self, message: String) {
        if self.config.accessibility.announce_changes {
            tracing::debug!(%message, "announcement");
            self.emit(InteractionEvent::Announcement { message });
        }
    }

    // =========================================================================
    // NODES & SPATIAL QUERIES
    // =========================================================================

    /// Replace the node snapshot and rebuild the index.
    pub fn update_nodes(&mut self, nodes: Vec<PositionedNode>) {
        self.nodes = nodes;
        self.nodes_version += 1;
        match self.index.as_mut() {
            Some(index) => index.build(&self.nodes),
            None => self.fallback.build(&self.nodes),
        }
        if let Some(hovered) = self.state.hovered_node.clone() {
            if !self.nodes.iter().any(|n| n.id == hovered) {
                self.state.hovered_node = None;
                self.emit(InteractionEvent::NodeHover {
                    node: None,
                    previous: Some(hovered),
                });
            }
        }
        tracing::debug!(nodes = self.nodes.len(), indexed = self.index.is_some(), "node snapshot updated");
        self.check_renderer_capacity();
    }

    /// Inject (or remove) a spatial index. Without one, queries scan linearly.
    pub fn set_spatial_index(&mut self, index: Option<Box<dyn SpatialIndex>>) {
        self.index = index;
        match self.index.as_mut() {
            Some(index) => {
                index.build(&self.nodes);
                self.fallback = LinearIndex::new();
            }
            None => self.fallback.build(&self.nodes),
        }
        self.nodes_version += 1;
    }

    fn index(&self) -> &dyn SpatialIndex {
        match &self.index {
            Some(index) => index.as_ref(),
            None => &self.fallback,
        }
    }

    fn epoch(&self) -> QueryEpoch {
        QueryEpoch {
            viewport: self.snapshot(),
            nodes_version: self.nodes_version,
        }
    }

    /// Topmost node under a screen point (memoized).
    pub fn get_node_at(&mut self, x: f64, y: f64) -> Option<NodeId> {
        let screen = Point2::new(x, y);
        let epoch = self.epoch();
        if let Some(hit) = self.point_queries.lookup(&screen, epoch) {
            return hit;
        }
        let hit = self.hit_test(screen);
        self.point_queries.store(screen, epoch, hit.clone());
        hit
    }

    /// Nodes intersecting a screen rectangle, by id (memoized).
    pub fn get_nodes_in_region(&mut self, rect: Rect) -> Vec<NodeId> {
        let epoch = self.epoch();
        if let Some(ids) = self.region_queries.lookup(&rect, epoch) {
            return ids;
        }
        let ids = self.nodes_in_region(rect);
        self.region_queries.store(rect, epoch, ids.clone());
        ids
    }

    fn hit_test(&self, screen: Point2) -> Option<NodeId> {
        let (world, tolerance) = {
            let vp = self.viewport.borrow();
            (vp.screen_to_world(screen), self.config.behavior.hit_tolerance / vp.zoom())
        };
        self.index()
            .query_point(world, tolerance)
            .first()
            .map(|node| node.id.clone())
    }

    fn nodes_in_region(&self, screen_rect: Rect) -> Vec<NodeId> {
        let world = self.viewport.borrow().screen_rect_to_world(screen_rect);
        self.index()
            .query_region(&world)
            .into_iter()
            .map(|node| node.id.clone())
            .collect()
    }

    fn content_bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.nodes.iter().flat_map(|n| {
            let r = n.effective_radius();
            [
                Point2::new(n.x - r, n.y - r),
                Point2::new(n.x + r, n.y + r),
            ]
        }))
    }

    fn check_renderer_capacity(&self) {
        let Some(renderer) = self.renderer.as_ref() else {
            return;
        };
        let kind = renderer.kind();
        let caps = kind.capabilities();
        if self.nodes.len() > caps.recommended_max_nodes {
            tracing::warn!(
                renderer = %kind,
                nodes = self.nodes.len(),
                recommended_max = caps.recommended_max_nodes,
                suggested = %RendererKind::recommend(self.nodes.len(), false),
                "node count exceeds renderer capacity"
            );
        }
        if !caps.supports_3d && self.nodes.iter().any(|n| n.z.is_some()) {
            tracing::debug!(renderer = %kind, "renderer ignores z coordinates");
        }
    }

    // =========================================================================
    // VIEWPORT API
    // =========================================================================

    fn snapshot(&self) -> ViewportSnapshot {
        self.viewport.borrow().snapshot()
    }

    fn transition(&self) -> AnimationConfig {
        self.config.animation.transition
    }

    fn use_animation(&self, animated: bool) -> bool {
        animated && self.config.features.animated_transitions
    }

    /// Push transform and highlights to the renderer.
    pub fn update_renderer(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let snapshot = self.viewport.borrow().snapshot();
        renderer.set_transform(Transform {
            x: snapshot.pan.x,
            y: snapshot.pan.y,
            scale: snapshot.zoom,
        });
        renderer.highlight_nodes(&self.state.selection.to_vec());
    }

    /// Emit `viewportChange` if the viewport differs from `previous`.
    fn commit_viewport(&mut self, previous: ViewportSnapshot, reason: ViewportChangeReason) -> bool {
        let current = self.snapshot();
        if current == previous {
            return false;
        }
        if let Some(anim) = self.viewport_animation.as_mut() {
            anim.last = current;
        }
        self.update_renderer();
        tracing::trace!(?reason, zoom = current.zoom, "viewport changed");
        self.emit(InteractionEvent::ViewportChange {
            viewport: current,
            previous,
            reason,
        });
        true
    }

    fn mutate_viewport<F>(&mut self, reason: ViewportChangeReason, mutate: F) -> bool
    where
        F: FnOnce(&mut ViewportState) -> bool,
    {
        let previous = self.snapshot();
        let changed = mutate(&mut self.viewport.borrow_mut());
        changed && self.commit_viewport(previous, reason)
    }

    fn animate_viewport<F>(&mut self, reason: ViewportChangeReason, start: F) -> AnimationHandle
    where
        F: FnOnce(&mut AnimationSystem, &SharedViewport) -> AnimationHandle,
    {
        let last = self.snapshot();
        let anim = self
            .viewport_animation
            .get_or_insert(ViewportAnimation { last, reason });
        anim.reason = reason;
        let handle = start(&mut self.animations, &self.viewport);
        self.sync_animated_viewport();
        self.state.is_animating = self.animations.is_animating();
        handle
    }

    /// Report viewport movement made by animations since the last sync.
    fn sync_animated_viewport(&mut self) {
        let Some(mut anim) = self.viewport_animation.take() else {
            return;
        };
        let current = self.snapshot();
        if current != anim.last {
            self.update_renderer();
            self.emit(InteractionEvent::ViewportChange {
                viewport: current,
                previous: anim.last,
                reason: anim.reason,
            });
            anim.last = current;
        }
        if VIEWPORT_ANIMATIONS.iter().any(|id| self.animations.is_running(id)) {
            self.viewport_animation = Some(anim);
        }
    }

    fn announce_zoom(&mut self, zoom: f64) {
        self.announce(format!("Zoom {:.0}%", zoom * 100.0));
    }

    /// Zoom about `center` (screen space, defaults to the viewport center).
    pub fn set_zoom(&mut self, zoom: f64, center: Option<Point2>, animated: bool) -> AnimationHandle {
        if !self.config.features.zoom {
            return AnimationHandle::ready(AnimationOutcome::Cancelled);
        }
        let (center, target) = {
            let vp = self.viewport.borrow();
            (center.unwrap_or_else(|| vp.screen_center()), vp.clamp_zoom(zoom))
        };
        if self.use_animation(animated) {
            let config = self.transition();
            let handle = self.animate_viewport(ViewportChangeReason::Zoom, |anims, vp| {
                anims.animate_zoom(vp, zoom, Some(center), config)
            });
            self.announce_zoom(target);
            return handle;
        }
        if self.mutate_viewport(ViewportChangeReason::Zoom, |vp| vp.set_zoom(zoom, Some(center))) {
            self.announce_zoom(target);
        }
        AnimationHandle::ready(AnimationOutcome::Completed)
    }

    pub fn set_pan(&mut self, pan: Point2, animated: bool) -> AnimationHandle {
        if !self.config.features.pan {
            return AnimationHandle::ready(AnimationOutcome::Cancelled);
        }
        if self.use_animation(animated) {
            let config = self.transition();
            return self.animate_viewport(ViewportChangeReason::Pan, |anims, vp| {
                anims.animate_pan(vp, pan, config)
            });
        }
        self.mutate_viewport(ViewportChangeReason::Pan, |vp| vp.set_pan(pan));
        AnimationHandle::ready(AnimationOutcome::Completed)
    }

    /// Move to an explicit zoom and pan.
    pub fn set_viewport(&mut self, target: ViewportSnapshot, animated: bool) -> AnimationHandle {
        if self.use_animation(animated) {
            let config = self.transition();
            return self.animate_viewport(ViewportChangeReason::Programmatic, |anims, vp| {
                anims.animate_to_viewport(vp, target, config)
            });
        }
        self.mutate_viewport(ViewportChangeReason::Programmatic, |vp| vp.apply_snapshot(target));
        AnimationHandle::ready(AnimationOutcome::Completed)
    }

    /// Back to the configured initial transform.
    pub fn reset_view(&mut self, animated: bool) -> AnimationHandle {
        let target = ViewportSnapshot {
            zoom: self.config.viewport.initial_zoom,
            pan: self.config.viewport.initial_pan,
        };
        let handle = if self.use_animation(animated) {
            let config = self.transition();
            self.animate_viewport(ViewportChangeReason::Reset, |anims, vp| {
                anims.animate_to_viewport(vp, target, config)
            })
        } else {
            self.mutate_viewport(ViewportChangeReason::Reset, |vp| vp.apply_snapshot(target));
            AnimationHandle::ready(AnimationOutcome::Completed)
        };
        self.announce("View reset".to_string());
        handle
    }

    /// Fit every node (with its radius) into the viewport.
    pub fn fit_to_graph(&mut self, animated: bool) -> AnimationHandle {
        let Some(bounds) = self.content_bounds() else {
            return AnimationHandle::ready(AnimationOutcome::Completed);
        };
        let padding = self.config.behavior.fit_padding;
        if self.use_animation(animated) {
            let config = self.transition();
            return self.animate_viewport(ViewportChangeReason::Fit, |anims, vp| {
                anims.animate_to_fit(vp, bounds, padding, config)
            });
        }
        self.mutate_viewport(ViewportChangeReason::Fit, |vp| vp.fit_to_bounds(bounds, padding));
        AnimationHandle::ready(AnimationOutcome::Completed)
    }

    /// Center `id` on the viewport at `zoom_level` (or the configured focus zoom).
    pub fn zoom_to_node(
        &mut self,
        id: &str,
        zoom_level: Option<f64>,
        animated: bool,
    ) -> Result<AnimationHandle, InteractionError> {
        let node = self
            .nodes
            .iter()
            .find(|n| n.id == id)
            .map(PositionedNode::center)
            .ok_or_else(|| InteractionError::NodeNotFound(id.to_string()))?;
        let level = zoom_level.unwrap_or(self.config.behavior.focus_zoom);

        if self.use_animation(animated) {
            let (zoom, pan) = {
                let vp = self.viewport.borrow();
                let zoom = vp.clamp_zoom(level);
                (zoom, vp.screen_center() - node * zoom)
            };
            let config = self.transition();
            return Ok(self.animate_viewport(ViewportChangeReason::Programmatic, |anims, vp| {
                let zooming = anims.animate_zoom(vp, zoom, None, config);
                let panning = anims.animate_pan(vp, pan, config);
                AnimationHandle::join([zooming, panning])
            }));
        }

        self.mutate_viewport(ViewportChangeReason::Programmatic, |vp| {
            let center = vp.screen_center();
            let panned = vp.adjust_pan(center - vp.world_to_screen(node));
            let zoomed = vp.set_zoom(level, Some(center));
            panned || zoomed
        });
        Ok(AnimationHandle::ready(AnimationOutcome::Completed))
    }

    /// Resize the container.
    pub fn resize(&mut self, width: f64, height: f64) -> Result<bool, InteractionError> {
        let changed = self.viewport.borrow_mut().update_dimensions(width, height)?;
        if changed {
            self.update_renderer();
        }
        Ok(changed)
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    pub fn selection(&self) -> &SelectionSnapshot {
        &self.state.selection
    }

    pub fn selected_nodes(&self) -> Vec<NodeId> {
        self.state.selection.to_vec()
    }

    /// Combine `ids` with the selection. Returns whether it changed.
    pub fn select_nodes(&mut self, ids: &[NodeId], mode: SelectionMode) -> bool {
        if !self.config.features.selection {
            return false;
        }
        let mode = if self.config.features.multi_select {
            mode
        } else {
            SelectionMode::Set
        };
        let (next, diff) = self.state.selection.apply(ids, mode);
        self.commit_selection(next, diff)
    }

    /// Deselect everything. No event when already empty.
    pub fn clear_selection(&mut self) -> bool {
        let (next, diff) = self.state.selection.cleared();
        self.commit_selection(next, diff)
    }

    fn commit_selection(&mut self, next: SelectionSnapshot, diff: SelectionDiff) -> bool {
        if diff.is_empty() {
            return false;
        }
        self.state.selection = next;
        self.update_renderer();
        let selected = self.state.selection.to_vec();
        let message = match selected.as_slice() {
            [] => "Selection cleared".to_string(),
            [only] => format!("Node {} selected", only),
            many => format!("{} nodes selected", many.len()),
        };
        tracing::debug!(
            selected = selected.len(),
            added = diff.added.len(),
            removed = diff.removed.len(),
            "selection changed"
        );
        self.emit(InteractionEvent::SelectionChange {
            selected,
            added: diff.added,
            removed: diff.removed,
        });
        self.announce(message);
        true
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    /// Route one raw input. Returns whether the controller acted on it.
    pub fn handle_input(&mut self, input: RawInput) -> bool {
        if !self.initialized {
            return false;
        }
        if input.is_touch() && !self.config.features.touch {
            return false;
        }
        let now = self.clock.now_ms();
        match &input {
            RawInput::TouchStart { .. } => self.last_gesture_source = InputSource::Touch,
            RawInput::MouseDown { .. } => self.last_gesture_source = InputSource::Mouse,
            _ => {}
        }
        match input {
            RawInput::MouseDown {
                button: MouseButton::Primary,
                pos,
                modifiers,
            } => self.on_mouse_down(pos, modifiers, now),
            RawInput::MouseDown { .. } => false,
            RawInput::MouseMove { pos, .. } => self.on_mouse_move(pos, now),
            RawInput::MouseUp {
                button: MouseButton::Primary,
                pos,
                modifiers,
            } => self.on_mouse_up(pos, modifiers, now),
            RawInput::MouseUp { .. } => false,
            RawInput::MouseLeave => self.on_mouse_leave(),
            RawInput::Wheel { pos, delta_y, .. } => self.on_wheel(pos, delta_y),
            RawInput::TouchStart { touches } => {
                let events = self.gestures.touch_start(&touches, now);
                self.apply_gestures(events, InputSource::Touch);
                true
            }
            RawInput::TouchMove { touches } => {
                let events = self.gestures.touch_move(&touches, now);
                self.apply_gestures(events, InputSource::Touch);
                true
            }
            RawInput::TouchEnd { touches } => {
                let events = self.gestures.touch_end(&touches, now);
                self.apply_gestures(events, InputSource::Touch);
                if self.gestures.touch_count() == 0 {
                    self.state.is_zooming = false;
                }
                true
            }
            RawInput::TouchCancel => {
                self.gestures.touch_cancel();
                self.state.end_pointer();
                true
            }
            RawInput::KeyDown { key, modifiers } => self.on_key_down(key, modifiers),
            RawInput::Resized { width, height } => match self.resize(width, height) {
                Ok(changed) => changed,
                Err(err) => {
                    tracing::warn!(error = %err, "ignoring resize");
                    false
                }
            },
        }
    }

    fn on_mouse_down(&mut self, pos: Point2, modifiers: KeyModifiers, now: f64) -> bool {
        let events = self.gestures.mouse_down(pos, now);
        self.apply_gestures(events, InputSource::Mouse);

        self.state.last_pointer_position = Some(pos);
        self.state.pointer_down_position = Some(pos);

        let features = &self.config.features;
        let (region_select, pan, node_drag, selection) = (
            features.region_select && features.selection,
            features.pan,
            features.node_drag,
            features.selection,
        );

        if let Some(node) = self.hit_test(pos) {
            self.emit(InteractionEvent::NodeClick {
                node: node.clone(),
                position: pos,
                modifiers,
            });
            if selection {
                if modifiers.command() {
                    self.select_nodes(&[node.clone()], SelectionMode::Toggle);
                } else if !(node_drag && self.state.selection.contains(&node)) {
                    self.select_nodes(&[node.clone()], SelectionMode::Set);
                }
            }
            if node_drag {
                self.state.pointer = PointerMode::NodePressed { node, origin: pos };
            }
        } else if modifiers.shift() && region_select {
            self.state.pointer = PointerMode::Selecting {
                origin: pos,
                current: pos,
            };
        } else if pan {
            self.state.pointer = PointerMode::Panning;
        }
        true
    }

    fn on_mouse_move(&mut self, pos: Point2, now: f64) -> bool {
        let events = self.gestures.mouse_move(pos, now);
        self.apply_gestures(events, InputSource::Mouse);

        let last = self.state.last_pointer_position.unwrap_or(pos);
        self.state.last_pointer_position = Some(pos);
        let delta = pos - last;

        match self.state.pointer.clone() {
            PointerMode::Idle => {
                if self.config.features.hover {
                    self.update_hover(pos);
                }
                false
            }
            PointerMode::Panning => self.mutate_viewport(ViewportChangeReason::Pan, |vp| vp.adjust_pan(delta)),
            PointerMode::Selecting { origin, .. } => {
                self.state.pointer = PointerMode::Selecting {
                    origin,
                    current: pos,
                };
                true
            }
            PointerMode::NodePressed { node, origin } => {
                if pos.distance(origin) <= self.gestures.config().pan_threshold {
                    return false;
                }
                let nodes = if self.state.selection.contains(&node) {
                    self.state.selection.to_vec()
                } else {
                    vec![node]
                };
                tracing::debug!(nodes = nodes.len(), "node drag started");
                let world_delta = (pos - origin) / self.viewport.borrow().zoom();
                self.state.pointer = PointerMode::Dragging { nodes: nodes.clone() };
                self.emit(InteractionEvent::NodeDrag { nodes, world_delta });
                true
            }
            PointerMode::Dragging { nodes } => {
                let world_delta = delta / self.viewport.borrow().zoom();
                self.emit(InteractionEvent::NodeDrag { nodes, world_delta });
                true
            }
        }
    }

    fn on_mouse_up(&mut self, pos: Point2, modifiers: KeyModifiers, now: f64) -> bool {
        let events = self.gestures.mouse_up(pos, now);
        self.apply_gestures(events, InputSource::Mouse);

        let down = self.state.pointer_down_position.unwrap_or(pos);
        match self.state.pointer.clone() {
            PointerMode::Selecting { origin, .. } => {
                let ids = self.nodes_in_region(Rect::from_corners(origin, pos));
                let mode = if modifiers.command() {
                    SelectionMode::Add
                } else {
                    SelectionMode::Set
                };
                self.select_nodes(&ids, mode);
            }
            PointerMode::Dragging { nodes } => {
                tracing::debug!(nodes = nodes.len(), "node drag ended");
                self.emit(InteractionEvent::NodeDragEnd { nodes });
            }
            PointerMode::Panning => {
                let clicked = pos.distance(down) <= self.gestures.config().tap_max_distance;
                if clicked && !modifiers.command() {
                    self.clear_selection();
                }
            }
            PointerMode::Idle | PointerMode::NodePressed { .. } => {}
        }
        self.state.end_pointer();
        self.state.last_pointer_position = Some(pos);
        true
    }

    fn on_mouse_leave(&mut self) -> bool {
        if let PointerMode::Dragging { nodes } = self.state.pointer.clone() {
            self.emit(InteractionEvent::NodeDragEnd { nodes });
        }
        self.state.end_pointer();
        self.state.last_pointer_position = None;
        self.pending_hover = None;
        if self.gestures.touch_count() > 0 {
            self.gestures.touch_cancel();
        }
        match self.state.hovered_node.take() {
            Some(previous) => {
                self.emit(InteractionEvent::NodeHover {
                    node: None,
                    previous: Some(previous),
                });
                true
            }
            None => false,
        }
    }

    /// Hover checks run at most once per throttle window; the latest
    /// position held back is picked up by `tick`.
    fn update_hover(&mut self, pos: Point2) {
        if !self.hover_throttle.try_pass(self.clock.now_ms()) {
            self.pending_hover = Some(pos);
            return;
        }
        self.pending_hover = None;
        let hovered = self.get_node_at(pos.x, pos.y);
        if hovered != self.state.hovered_node {
            let previous = std::mem::replace(&mut self.state.hovered_node, hovered.clone());
            self.emit(InteractionEvent::NodeHover {
                node: hovered,
                previous,
            });
        }
    }

    fn on_wheel(&mut self, pos: Point2, delta_y: f64) -> bool {
        let features = &self.config.features;
        if !(features.zoom && features.wheel_zoom) || delta_y == 0.0 {
            return false;
        }
        let step = self.config.behavior.wheel_zoom_step;
        let factor = if delta_y > 0.0 { 1.0 - step } else { 1.0 + step };
        self.mutate_viewport(ViewportChangeReason::Zoom, |vp| vp.adjust_zoom(factor, Some(pos)))
    }

    fn on_key_down(&mut self, key: KeyCode, modifiers: KeyModifiers) -> bool {
        if !self.config.features.keyboard {
            return false;
        }
        let (reset_key, fit_key) = (self.config.behavior.shortcuts.reset, self.config.behavior.shortcuts.fit);
        if key == reset_key || key == KeyCode::Home {
            self.reset_view(true);
            return true;
        }
        if key == fit_key {
            self.fit_to_graph(true);
            return true;
        }

        let behavior = &self.config.behavior;
        let step = if modifiers.shift() {
            behavior.keyboard_pan_step * behavior.keyboard_pan_boost
        } else {
            behavior.keyboard_pan_step
        };
        let zoom_factor = behavior.keyboard_zoom_factor;

        match key {
            KeyCode::ArrowUp | KeyCode::ArrowDown | KeyCode::ArrowLeft | KeyCode::ArrowRight => {
                if !self.config.features.pan {
                    return false;
                }
                let delta = match key {
                    KeyCode::ArrowUp => Point2::new(0.0, step),
                    KeyCode::ArrowDown => Point2::new(0.0, -step),
                    KeyCode::ArrowLeft => Point2::new(step, 0.0),
                    _ => Point2::new(-step, 0.0),
                };
                self.mutate_viewport(ViewportChangeReason::Pan, |vp| vp.adjust_pan(delta));
                true
            }
            KeyCode::Plus | KeyCode::Minus => {
                if !self.config.features.zoom {
                    return false;
                }
                let zoom = self.viewport.borrow().zoom();
                let target = if key == KeyCode::Plus {
                    zoom * zoom_factor
                } else {
                    zoom / zoom_factor
                };
                self.set_zoom(target, None, true);
                true
            }
            KeyCode::Escape => {
                self.animations.cancel_all();
                self.sync_animated_viewport();
                self.state.is_animating = false;
                self.state.end_pointer();
                self.clear_selection();
                true
            }
            KeyCode::Tab if self.config.accessibility.keyboard_focus_visible => {
                self.move_focus(modifiers.shift())
            }
            KeyCode::Enter | KeyCode::Space => match self.state.focused_node.clone() {
                Some(id) => self.select_nodes(&[id], SelectionMode::Toggle),
                None => false,
            },
            _ => false,
        }
    }

    /// Cycle keyboard focus through nodes in id order.
    fn move_focus(&mut self, backwards: bool) -> bool {
        let mut ids: Vec<&NodeId> = self.nodes.iter().map(|n| &n.id).collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return false;
        }
        let len = ids.len();
        let current = self
            .state
            .focused_node
            .as_ref()
            .and_then(|focused| ids.iter().position(|id| *id == focused));
        let next = match (current, backwards) {
            (Some(i), false) => (i + 1) % len,
            (Some(i), true) => (i + len - 1) % len,
            (None, false) => 0,
            (None, true) => len - 1,
        };
        let id = ids[next].clone();
        self.state.focused_node = Some(id.clone());
        self.announce(format!("Focused node {}", id));
        true
    }

    // =========================================================================
    // GESTURE BINDINGS
    // =========================================================================

    fn apply_gestures(&mut self, events: Vec<GestureEvent>, source: InputSource) {
        for event in events {
            self.emit(InteractionEvent::Gesture(event.clone()));
            match source {
                InputSource::Touch => self.apply_touch_binding(&event),
                // mouse pans, clicks and selection are handled directly
                InputSource::Mouse => {
                    if let Gesture::DoubleTap { pos } = event.gesture {
                        self.double_tap_zoom(pos);
                    }
                }
            }
        }
    }

    fn apply_touch_binding(&mut self, event: &GestureEvent) {
        match event.gesture {
            Gesture::Tap { pos } => self.tap_at(pos),
            Gesture::DoubleTap { pos } => self.double_tap_zoom(pos),
            Gesture::Pinch {
                center, scale_delta, ..
            } => {
                if !self.config.features.zoom {
                    return;
                }
                self.state.is_zooming = event.phase != GesturePhase::End;
                self.mutate_viewport(ViewportChangeReason::Zoom, |vp| {
                    vp.adjust_zoom(scale_delta, Some(center))
                });
            }
            Gesture::Pan { delta, .. }
            | Gesture::TwoFingerPan { delta, .. }
            | Gesture::MultiFingerPan { delta, .. } => {
                if self.config.features.pan {
                    self.state.touch_panning = event.phase != GesturePhase::End;
                    self.mutate_viewport(ViewportChangeReason::Pan, |vp| vp.adjust_pan(delta));
                }
            }
            Gesture::LongPress { .. } | Gesture::ThreeFingerTap { .. } | Gesture::Swipe { .. } => {}
        }
    }

    fn tap_at(&mut self, pos: Point2) {
        match self.hit_test(pos) {
            Some(node) => {
                self.emit(InteractionEvent::NodeClick {
                    node: node.clone(),
                    position: pos,
                    modifiers: KeyModifiers::NONE,
                });
                self.select_nodes(&[node], SelectionMode::Set);
            }
            None => {
                self.clear_selection();
            }
        }
    }

    fn double_tap_zoom(&mut self, pos: Point2) {
        if !self.config.features.zoom {
            return;
        }
        let zoom = self.viewport.borrow().zoom() * self.config.behavior.double_tap_zoom_factor;
        self.set_zoom(zoom, Some(pos), true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RecordingRenderer;
    use crate::spatial::RTreeIndex;
    use std::cell::RefCell;
    use std::rc::Rc;
    use weave_core::VirtualClock;
    use weave_input::TouchPoint;

    fn nodes() -> Vec<PositionedNode> {
        vec![
            PositionedNode::new("a", 100.0, 100.0).with_radius(10.0),
            PositionedNode::new("b", 200.0, 100.0).with_radius(10.0),
            PositionedNode::new("c", 300.0, 300.0).with_radius(10.0),
        ]
    }

    fn controller_with(config: InteractionConfig) -> (InteractionController, VirtualClock, Rc<RefCell<Vec<InteractionEvent>>>) {
        let clock = VirtualClock::new();
        let mut controller = InteractionController::new(config, clock.shared()).unwrap();
        controller
            .initialize(Box::new(RecordingRenderer::default()), 800.0, 600.0)
            .unwrap();
        controller.update_nodes(nodes());
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        controller.on_event(move |e| {
            sink.borrow_mut().push(e.clone());
            Ok(())
        });
        (controller, clock, log)
    }

    fn controller() -> (InteractionController, VirtualClock, Rc<RefCell<Vec<InteractionEvent>>>) {
        controller_with(InteractionConfig::default())
    }

    fn topics(log: &Rc<RefCell<Vec<InteractionEvent>>>) -> Vec<&'static str> {
        log.borrow().iter().map(|e| e.topic()).collect()
    }

    fn ids(list: &[&str]) -> Vec<NodeId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_initialize_and_destroy_are_idempotent() {
        let (mut c, _clock, _log) = controller();
        assert!(!c.initialize(Box::new(RecordingRenderer::default()), 10.0, 10.0).unwrap());
        assert_eq!(c.viewport().borrow().width(), 800.0);
        assert!(c.destroy());
        assert!(!c.destroy());
        assert!(c.nodes().is_empty());
        assert!(!c.handle_input(RawInput::mouse_down(0.0, 0.0)));
        assert!(!c.tick());
    }

    #[test]
    fn test_rejects_invalid_dimensions() {
        let mut c = InteractionController::new(InteractionConfig::default(), VirtualClock::new().shared()).unwrap();
        let err = c.initialize(Box::new(RecordingRenderer::default()), 0.0, 600.0).unwrap_err();
        assert!(matches!(err, InteractionError::InvalidDimensions { .. }));
        assert!(!c.is_initialized());
    }

    #[test]
    fn test_immediate_zoom_emits_viewport_change() {
        let (mut c, _clock, log) = controller();
        c.set_zoom(2.0, Some(Point2::ZERO), false);
        assert_eq!(c.viewport_snapshot().zoom, 2.0);
        match &log.borrow()[0] {
            InteractionEvent::ViewportChange {
                viewport,
                previous,
                reason,
            } => {
                assert_eq!(viewport.zoom, 2.0);
                assert_eq!(previous.zoom, 1.0);
                assert_eq!(*reason, ViewportChangeReason::Zoom);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(topics(&log), vec!["viewportChange", "announcement"]);

        log.borrow_mut().clear();
        c.set_zoom(2.0, None, false);
        assert!(log.borrow().is_empty(), "no-op zoom is silent");
    }

    #[test]
    fn test_animated_zoom_reports_each_frame() {
        let (mut c, clock, log) = controller();
        let mut handle = c.set_zoom(3.0, None, true);
        assert!(c.state().is_animating);
        for _ in 0..20 {
            clock.advance(20.0);
            c.tick();
        }
        assert_eq!(handle.try_outcome(), Some(AnimationOutcome::Completed));
        assert_eq!(c.viewport_snapshot().zoom, 3.0);
        assert!(!c.state().is_animating);
        let changes = log
            .borrow()
            .iter()
            .filter(|e| matches!(e, InteractionEvent::ViewportChange { reason: ViewportChangeReason::Zoom, .. }))
            .count();
        assert!(changes >= 10, "got {} changes", changes);
    }

    #[test]
    fn test_zoom_to_node_centers_node() {
        let (mut c, clock, _log) = controller();
        c.zoom_to_node("c", Some(2.0), false).unwrap();
        let screen = c.viewport().borrow().world_to_screen(Point2::new(300.0, 300.0));
        assert!(screen.approx_eq(Point2::new(400.0, 300.0), 1e-6));
        assert_eq!(c.viewport_snapshot().zoom, 2.0);

        c.zoom_to_node("a", Some(4.0), true).unwrap();
        clock.advance(1000.0);
        c.tick();
        let screen = c.viewport().borrow().world_to_screen(Point2::new(100.0, 100.0));
        assert!(screen.approx_eq(Point2::new(400.0, 300.0), 1e-6));
        assert_eq!(c.viewport_snapshot().zoom, 4.0);

        assert!(matches!(
            c.zoom_to_node("zz", None, false),
            Err(InteractionError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_fit_to_graph() {
        let (mut c, _clock, log) = controller();
        c.fit_to_graph(false);
        let vp = c.viewport();
        let vp = vp.borrow();
        // content 90..310 square, 700x500 available
        assert!((vp.zoom() - 500.0 / 220.0).abs() < 1e-9);
        assert!(vp.is_point_visible(Point2::new(310.0, 310.0), 0.0));
        assert!(matches!(
            log.borrow()[0],
            InteractionEvent::ViewportChange { reason: ViewportChangeReason::Fit, .. }
        ));
    }

    #[test]
    fn test_selection_modes_and_idempotent_clear() {
        let (mut c, _clock, log) = controller();
        assert!(!c.clear_selection());
        assert!(log.borrow().is_empty());

        assert!(c.select_nodes(&ids(&["a", "b"]), SelectionMode::Set));
        assert!(c.select_nodes(&ids(&["b", "c"]), SelectionMode::Toggle));
        assert_eq!(c.selected_nodes(), ids(&["a", "c"]));
        assert!(!c.select_nodes(&ids(&["a"]), SelectionMode::Add));

        match &log.borrow()[2] {
            InteractionEvent::SelectionChange { selected, added, removed } => {
                assert_eq!(selected, &ids(&["a", "c"]));
                assert_eq!(added, &ids(&["c"]));
                assert_eq!(removed, &ids(&["b"]));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(c.clear_selection());
        log.borrow_mut().clear();
        assert!(!c.clear_selection());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_single_select_mode_when_multi_disabled() {
        let mut config = InteractionConfig::default();
        config.features.multi_select = false;
        let (mut c, _clock, _log) = controller_with(config);
        c.select_nodes(&ids(&["a"]), SelectionMode::Set);
        c.select_nodes(&ids(&["b"]), SelectionMode::Add);
        assert_eq!(c.selected_nodes(), ids(&["b"]));
    }

    #[test]
    fn test_spatial_queries_convert_screen_to_world() {
        let (mut c, _clock, _log) = controller();
        c.set_pan(Point2::new(50.0, 0.0), false);
        assert_eq!(c.get_node_at(150.0, 100.0), Some("a".to_string()));
        assert_eq!(c.get_nodes_in_region(Rect::new(0.0, 0.0, 300.0, 150.0)), ids(&["a", "b"]));
    }

    #[test]
    fn test_index_and_fallback_agree() {
        let (mut c, clock, _log) = controller();
        let linear = c.get_nodes_in_region(Rect::new(0.0, 0.0, 800.0, 600.0));
        c.set_spatial_index(Some(Box::new(RTreeIndex::new())));
        clock.advance(100.0);
        let indexed = c.get_nodes_in_region(Rect::new(0.0, 0.0, 800.0, 600.0));
        assert_eq!(linear, indexed);
        assert_eq!(c.get_node_at(205.0, 100.0), Some("b".to_string()));
    }

    #[test]
    fn test_point_query_answers_each_point() {
        let (mut c, _clock, _log) = controller();
        assert_eq!(c.get_node_at(100.0, 100.0), Some("a".to_string()));
        assert_eq!(c.get_node_at(200.0, 100.0), Some("b".to_string()));
        assert_eq!(c.get_node_at(100.0, 100.0), Some("a".to_string()));
        // a new node snapshot invalidates the memo
        c.update_nodes(vec![PositionedNode::new("z", 100.0, 100.0)]);
        assert_eq!(c.get_node_at(100.0, 100.0), Some("z".to_string()));
    }

    #[test]
    fn test_hover_is_throttled_and_caught_up_on_tick() {
        let (mut c, clock, log) = controller();
        let hovers = |log: &Rc<RefCell<Vec<InteractionEvent>>>| -> Vec<Option<NodeId>> {
            log.borrow()
                .iter()
                .filter_map(|e| match e {
                    InteractionEvent::NodeHover { node, .. } => Some(node.clone()),
                    _ => None,
                })
                .collect()
        };
        c.handle_input(RawInput::mouse_move(100.0, 100.0));
        c.handle_input(RawInput::mouse_move(200.0, 100.0));
        assert_eq!(hovers(&log), vec![Some("a".to_string())]);
        assert!(c.tick(), "held-back hover needs another frame");

        clock.advance(20.0);
        c.tick();
        assert_eq!(hovers(&log), vec![Some("a".to_string()), Some("b".to_string())]);
        assert_eq!(c.state().hovered_node.as_deref(), Some("b"));
    }

    #[test]
    fn test_mouse_pan_and_background_click() {
        let (mut c, _clock, log) = controller();
        c.select_nodes(&ids(&["a"]), SelectionMode::Set);
        log.borrow_mut().clear();

        c.handle_input(RawInput::mouse_down(500.0, 500.0));
        c.handle_input(RawInput::mouse_move(520.0, 510.0));
        assert_eq!(c.viewport_snapshot().pan, Point2::new(20.0, 10.0));
        c.handle_input(RawInput::mouse_up(520.0, 510.0));
        assert_eq!(c.selected_nodes(), ids(&["a"]), "a drag is not a click");
        assert!(!c.state().is_panning());

        c.handle_input(RawInput::mouse_down(600.0, 20.0));
        c.handle_input(RawInput::mouse_up(601.0, 20.0));
        assert!(c.selected_nodes().is_empty());
        assert!(topics(&log).contains(&"selectionChange"));
    }

    #[test]
    fn test_mouse_down_on_node_selects_instead_of_panning() {
        let (mut c, _clock, log) = controller();
        c.handle_input(RawInput::mouse_down(100.0, 100.0));
        assert!(!c.state().is_panning());
        assert_eq!(c.selected_nodes(), ids(&["a"]));
        assert_eq!(log.borrow()[0].topic(), "nodeClick");

        c.handle_input(RawInput::mouse_up(100.0, 100.0));
        c.handle_input(RawInput::MouseDown {
            button: MouseButton::Primary,
            pos: Point2::new(200.0, 100.0),
            modifiers: KeyModifiers::CTRL,
        });
        assert_eq!(c.selected_nodes(), ids(&["a", "b"]));
    }

    #[test]
    fn test_region_selection_with_modifier() {
        let (mut c, _clock, _log) = controller();
        c.handle_input(RawInput::MouseDown {
            button: MouseButton::Primary,
            pos: Point2::new(50.0, 50.0),
            modifiers: KeyModifiers::SHIFT,
        });
        assert!(c.state().is_selecting());
        c.handle_input(RawInput::mouse_move(250.0, 150.0));
        assert_eq!(c.state().selection_rect(), Some(Rect::new(50.0, 50.0, 200.0, 100.0)));
        c.handle_input(RawInput::mouse_up(250.0, 150.0));
        assert_eq!(c.selected_nodes(), ids(&["a", "b"]));
        assert_eq!(c.viewport_snapshot().pan, Point2::ZERO);
    }

    #[test]
    fn test_hover_changes_only_on_id_change() {
        let (mut c, clock, log) = controller();
        c.handle_input(RawInput::mouse_move(100.0, 100.0));
        clock.advance(20.0);
        c.handle_input(RawInput::mouse_move(102.0, 101.0));
        clock.advance(20.0);
        c.handle_input(RawInput::mouse_move(500.0, 500.0));
        let hovers: Vec<_> = log
            .borrow()
            .iter()
            .filter_map(|e| match e {
                InteractionEvent::NodeHover { node, previous } => Some((node.clone(), previous.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(hovers, vec![(Some("a".into()), None), (None, Some("a".into()))]);
    }

    #[test]
    fn test_wheel_zooms_about_cursor() {
        let (mut c, _clock, _log) = controller();
        let cursor = Point2::new(100.0, 100.0);
        c.handle_input(RawInput::wheel(cursor.x, cursor.y, -120.0));
        let vp = c.viewport();
        assert!((vp.borrow().zoom() - 1.1).abs() < 1e-12);
        // world point under the cursor stays put
        assert!(vp.borrow().world_to_screen(Point2::new(100.0, 100.0)).approx_eq(cursor, 1e-9));
    }

    #[test]
    fn test_node_drag() {
        let mut config = InteractionConfig::default();
        config.features.node_drag = true;
        let (mut c, _clock, log) = controller_with(config);
        c.handle_input(RawInput::mouse_down(100.0, 100.0));
        c.handle_input(RawInput::mouse_move(104.0, 100.0));
        assert!(!c.state().is_dragging());
        c.handle_input(RawInput::mouse_move(130.0, 100.0));
        assert!(c.state().is_dragging());
        assert_eq!(c.state().dragged_nodes(), ids(&["a"]).as_slice());
        c.handle_input(RawInput::mouse_up(130.0, 100.0));

        let drag: Vec<_> = log
            .borrow()
            .iter()
            .filter(|e| matches!(e.topic(), "nodeDrag" | "nodeDragEnd"))
            .cloned()
            .collect();
        assert_eq!(
            drag,
            vec![
                InteractionEvent::NodeDrag {
                    nodes: ids(&["a"]),
                    world_delta: Point2::new(30.0, 0.0),
                },
                InteractionEvent::NodeDragEnd { nodes: ids(&["a"]) },
            ]
        );
        assert_eq!(c.viewport_snapshot().pan, Point2::ZERO);
    }

    #[test]
    fn test_touch_tap_selects_after_double_tap_window() {
        let (mut c, clock, log) = controller();
        c.handle_input(RawInput::touch_start(vec![TouchPoint::new(1, 200.0, 100.0)]));
        clock.advance(50.0);
        c.handle_input(RawInput::touch_end(vec![TouchPoint::new(1, 200.0, 100.0)]));
        assert!(c.selected_nodes().is_empty());
        clock.advance(400.0);
        c.tick();
        assert_eq!(c.selected_nodes(), ids(&["b"]));
        assert!(topics(&log).contains(&"tap"));
    }

    #[test]
    fn test_touch_pan_and_pinch() {
        let (mut c, clock, _log) = controller();
        c.handle_input(RawInput::touch_start(vec![TouchPoint::new(1, 400.0, 300.0)]));
        for i in 1..=5 {
            clock.advance(20.0);
            c.handle_input(RawInput::touch_move(vec![TouchPoint::new(1, 400.0 + 10.0 * i as f64, 300.0)]));
        }
        assert!(c.state().is_panning());
        clock.advance(200.0);
        c.handle_input(RawInput::touch_end(vec![TouchPoint::new(1, 450.0, 300.0)]));
        assert_eq!(c.viewport_snapshot().pan, Point2::new(50.0, 0.0));
        assert!(!c.state().is_panning());

        clock.advance(500.0);
        c.handle_input(RawInput::touch_start(vec![
            TouchPoint::new(2, 300.0, 300.0),
            TouchPoint::new(3, 500.0, 300.0),
        ]));
        clock.advance(20.0);
        c.handle_input(RawInput::touch_move(vec![
            TouchPoint::new(2, 250.0, 300.0),
            TouchPoint::new(3, 550.0, 300.0),
        ]));
        assert!((c.viewport_snapshot().zoom - 1.5).abs() < 1e-9);
        assert!(c.state().is_zooming);
    }

    #[test]
    fn test_keyboard_bindings() {
        let (mut c, _clock, _log) = controller();
        c.handle_input(RawInput::key_down(KeyCode::ArrowLeft));
        assert_eq!(c.viewport_snapshot().pan, Point2::new(50.0, 0.0));
        c.handle_input(RawInput::key_down_with(KeyCode::ArrowUp, KeyModifiers::SHIFT));
        assert_eq!(c.viewport_snapshot().pan, Point2::new(50.0, 200.0));

        c.set_config({
            let mut cfg = c.config().clone();
            cfg.features.animated_transitions = false;
            cfg
        })
        .unwrap();
        c.handle_input(RawInput::key_down(KeyCode::Plus));
        assert!((c.viewport_snapshot().zoom - 1.2).abs() < 1e-12);
        c.handle_input(RawInput::key_down(KeyCode::Char('0')));
        assert_eq!(c.viewport_snapshot(), ViewportSnapshot::default());

        c.select_nodes(&ids(&["a"]), SelectionMode::Set);
        c.handle_input(RawInput::key_down(KeyCode::Escape));
        assert!(c.selected_nodes().is_empty());
    }

    #[test]
    fn test_escape_cancels_animations() {
        let (mut c, clock, _log) = controller();
        let mut handle = c.fit_to_graph(true);
        clock.advance(50.0);
        c.tick();
        c.handle_input(RawInput::key_down(KeyCode::Escape));
        assert_eq!(handle.try_outcome(), Some(AnimationOutcome::Cancelled));
        assert!(!c.animations().is_animating());
    }

    #[test]
    fn test_focus_traversal_and_toggle() {
        let (mut c, _clock, log) = controller();
        c.handle_input(RawInput::key_down(KeyCode::Tab));
        c.handle_input(RawInput::key_down(KeyCode::Tab));
        assert_eq!(c.state().focused_node.as_deref(), Some("b"));
        c.handle_input(RawInput::key_down_with(KeyCode::Tab, KeyModifiers::SHIFT));
        c.handle_input(RawInput::key_down_with(KeyCode::Tab, KeyModifiers::SHIFT));
        assert_eq!(c.state().focused_node.as_deref(), Some("c"));
        c.handle_input(RawInput::key_down(KeyCode::Enter));
        assert_eq!(c.selected_nodes(), ids(&["c"]));

        let announcements: Vec<String> = log
            .borrow()
            .iter()
            .filter_map(|e| match e {
                InteractionEvent::Announcement { message } => Some(message.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(announcements.last().map(String::as_str), Some("Node c selected"));
    }

    #[test]
    fn test_announcements_can_be_disabled() {
        let mut config = InteractionConfig::default();
        config.accessibility.announce_changes = false;
        let (mut c, _clock, log) = controller_with(config);
        c.select_nodes(&ids(&["a"]), SelectionMode::Set);
        assert_eq!(topics(&log), vec!["selectionChange"]);
    }

    #[test]
    fn test_renderer_receives_transform_and_highlights() {
        let clock = VirtualClock::new();
        let mut c = InteractionController::new(InteractionConfig::default(), clock.shared()).unwrap();
        let renderer = Rc::new(RefCell::new(RecordingRenderer::default()));

        struct Shared(Rc<RefCell<RecordingRenderer>>);
        impl Renderer for Shared {
            fn kind(&self) -> RendererKind {
                self.0.borrow().kind()
            }
            fn set_transform(&mut self, transform: Transform) {
                self.0.borrow_mut().set_transform(transform)
            }
            fn highlight_nodes(&mut self, ids: &[NodeId]) {
                self.0.borrow_mut().highlight_nodes(ids)
            }
        }

        c.initialize(Box::new(Shared(renderer.clone())), 800.0, 600.0).unwrap();
        c.update_nodes(nodes());
        c.set_pan(Point2::new(10.0, 20.0), false);
        c.select_nodes(&ids(&["b"]), SelectionMode::Set);
        let r = renderer.borrow();
        assert_eq!(
            r.last_transform(),
            Some(Transform {
                x: 10.0,
                y: 20.0,
                scale: 1.0
            })
        );
        assert_eq!(r.last_highlight(), Some(&ids(&["b"])[..]));
    }

    #[test]
    fn test_listener_failure_is_contained() {
        let (mut c, _clock, log) = controller();
        c.on("selectionChange", |_| anyhow::bail!("host exploded"));
        assert!(c.select_nodes(&ids(&["a"]), SelectionMode::Set));
        assert_eq!(c.selected_nodes(), ids(&["a"]));
        assert!(topics(&log).contains(&"selectionChange"));
    }

    #[test]
    fn test_event_bus_receives_events() {
        let (mut c, clock, _log) = controller();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut bus = EventBus::new(clock.shared());
        bus.subscribe("viewportChange", move |e: &InteractionEvent| {
            sink.borrow_mut().push(e.topic());
            Ok(())
        });
        c.attach_event_bus(bus);
        c.set_zoom(2.0, None, false);
        c.tick();
        assert_eq!(*seen.borrow(), vec!["viewportChange"]);
        assert_eq!(c.event_bus_mut().map(|b| b.stats().published), Some(2));
    }
}
