//! Viewport state: zoom, pan and container dimensions.
//!
//! The transform is `screen = world * zoom + pan`. Every mutator clamps and
//! reports whether anything changed, so callers emit change events only for
//! real changes.

use crate::error::InteractionError;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use weave_core::{Bounds, Point2, Rect};

pub const DEFAULT_MIN_ZOOM: f64 = 0.1;
pub const DEFAULT_MAX_ZOOM: f64 = 10.0;
pub const DEFAULT_FIT_PADDING: f64 = 50.0;

/// Viewport shared between the controller and running animations.
pub type SharedViewport = Rc<RefCell<ViewportState>>;

/// Allowed pan range (screen-space translation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl PanBounds {
    pub fn clamp(&self, p: Point2) -> Point2 {
        Point2::new(
            p.x.clamp(self.min_x.min(self.max_x), self.max_x.max(self.min_x)),
            p.y.clamp(self.min_y.min(self.max_y), self.max_y.max(self.min_y)),
        )
    }
}

/// Zoom and pan without limits or dimensions; the animatable part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSnapshot {
    pub zoom: f64,
    pub pan: Point2,
}

impl Default for ViewportSnapshot {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Point2::ZERO,
        }
    }
}

/// Current zoom/pan/dimension state mapping world space to screen space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    zoom: f64,
    pan: Point2,
    min_zoom: f64,
    max_zoom: f64,
    pan_bounds: Option<PanBounds>,
    width: f64,
    height: f64,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

impl ViewportState {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            zoom: 1.0,
            pan: Point2::ZERO,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            pan_bounds: None,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn shared(self) -> SharedViewport {
        Rc::new(RefCell::new(self))
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan(&self) -> Point2 {
        self.pan
    }

    pub fn min_zoom(&self) -> f64 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> f64 {
        self.max_zoom
    }

    pub fn pan_bounds(&self) -> Option<PanBounds> {
        self.pan_bounds
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Center of the container in screen coordinates.
    pub fn screen_center(&self) -> Point2 {
        Point2::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn snapshot(&self) -> ViewportSnapshot {
        ViewportSnapshot {
            zoom: self.zoom,
            pan: self.pan,
        }
    }

    /// Clamp a zoom level to the configured limits.
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    fn clamp_pan(&self, pan: Point2) -> Point2 {
        match self.pan_bounds {
            Some(bounds) => bounds.clamp(pan),
            None => pan,
        }
    }

    // =========================================================================
    // MUTATORS
    // =========================================================================

    /// Set zoom, optionally keeping the world point under `center` fixed.
    /// Returns `false` when the clamped zoom equals the current zoom.
    pub fn set_zoom(&mut self, zoom: f64, center: Option<Point2>) -> bool {
        if !zoom.is_finite() {
            return false;
        }
        let new_zoom = self.clamp_zoom(zoom);
        if new_zoom == self.zoom {
            return false;
        }
        if let Some(c) = center {
            let ratio = new_zoom / self.zoom;
            self.pan = self.clamp_pan(c - (c - self.pan) * ratio);
        }
        self.zoom = new_zoom;
        true
    }

    /// Set pan, clamped to the pan bounds if any.
    pub fn set_pan(&mut self, pan: Point2) -> bool {
        if !pan.is_finite() {
            return false;
        }
        let pan = self.clamp_pan(pan);
        if pan == self.pan {
            return false;
        }
        self.pan = pan;
        true
    }

    /// Multiply zoom by `factor`.
    pub fn adjust_zoom(&mut self, factor: f64, center: Option<Point2>) -> bool {
        self.set_zoom(self.zoom * factor, center)
    }

    /// Translate pan by `delta` screen pixels.
    pub fn adjust_pan(&mut self, delta: Point2) -> bool {
        self.set_pan(self.pan + delta)
    }

    /// Apply zoom and pan from a snapshot (zoom first, no zoom center).
    pub fn apply_snapshot(&mut self, snapshot: ViewportSnapshot) -> bool {
        let zoomed = self.set_zoom(snapshot.zoom, None);
        let panned = self.set_pan(snapshot.pan);
        zoomed || panned
    }

    pub fn reset(&mut self, zoom: f64, pan: Point2) -> bool {
        self.apply_snapshot(ViewportSnapshot { zoom, pan })
    }

    /// Reset to zoom 1 and zero pan.
    pub fn reset_default(&mut self) -> bool {
        self.reset(1.0, Point2::ZERO)
    }

    pub fn update_dimensions(&mut self, width: f64, height: f64) -> Result<bool, InteractionError> {
        if !(width.is_finite() && height.is_finite()) || width < 0.0 || height < 0.0 {
            return Err(InteractionError::InvalidDimensions { width, height });
        }
        if width == self.width && height == self.height {
            return Ok(false);
        }
        self.width = width;
        self.height = height;
        Ok(true)
    }

    /// Change the zoom limits and re-clamp the current zoom.
    pub fn set_zoom_limits(&mut self, min: f64, max: f64) -> Result<bool, InteractionError> {
        if !(min.is_finite() && max.is_finite()) || min <= 0.0 || min > max {
            return Err(InteractionError::InvalidZoomLimits { min, max });
        }
        self.min_zoom = min;
        self.max_zoom = max;
        let clamped = self.clamp_zoom(self.zoom);
        if clamped != self.zoom {
            self.zoom = clamped;
            return Ok(true);
        }
        Ok(false)
    }

    /// Set or clear pan bounds and re-clamp the current pan.
    pub fn set_pan_bounds(&mut self, bounds: Option<PanBounds>) -> bool {
        self.pan_bounds = bounds;
        let clamped = self.clamp_pan(self.pan);
        if clamped != self.pan {
            self.pan = clamped;
            return true;
        }
        false
    }

    /// Zoom and center so `content` fits inside the container minus padding.
    /// Empty content resets to zoom 1 and zero pan.
    pub fn fit_to_bounds(&mut self, content: Bounds, padding: f64) -> bool {
        let target = self.fit_snapshot(content, padding);
        self.apply_snapshot(target)
    }

    /// The snapshot `fit_to_bounds` would apply.
    pub fn fit_snapshot(&self, content: Bounds, padding: f64) -> ViewportSnapshot {
        if content.is_empty() {
            return ViewportSnapshot::default();
        }
        let available_w = (self.width - 2.0 * padding).max(1.0);
        let available_h = (self.height - 2.0 * padding).max(1.0);
        let zoom_x = (content.width() > 0.0).then(|| available_w / content.width());
        let zoom_y = (content.height() > 0.0).then(|| available_h / content.height());
        let zoom = match (zoom_x, zoom_y) {
            (Some(x), Some(y)) => x.min(y),
            (Some(z), None) | (None, Some(z)) => z,
            (None, None) => 1.0,
        };
        let zoom = self.clamp_zoom(zoom);
        let pan = self.screen_center() - content.center() * zoom;
        ViewportSnapshot {
            zoom,
            pan: self.clamp_pan(pan),
        }
    }

    // =========================================================================
    // TRANSFORMS
    // =========================================================================

    pub fn screen_to_world(&self, p: Point2) -> Point2 {
        (p - self.pan) / self.zoom
    }

    pub fn world_to_screen(&self, p: Point2) -> Point2 {
        p * self.zoom + self.pan
    }

    pub fn screen_rect_to_world(&self, rect: Rect) -> Rect {
        let origin = self.screen_to_world(Point2::new(rect.x, rect.y));
        Rect::new(
            origin.x,
            origin.y,
            rect.width / self.zoom,
            rect.height / self.zoom,
        )
    }

    /// World-space rectangle currently visible.
    pub fn world_bounds(&self) -> Rect {
        self.screen_rect_to_world(Rect::new(0.0, 0.0, self.width, self.height))
    }

    /// Is a world point on screen (with `margin` screen pixels of slack)?
    pub fn is_point_visible(&self, p: Point2, margin: f64) -> bool {
        let s = self.world_to_screen(p);
        s.x >= -margin && s.x <= self.width + margin && s.y >= -margin && s.y <= self.height + margin
    }

    /// Does a world rectangle overlap the visible area?
    pub fn is_rect_visible(&self, rect: Rect) -> bool {
        self.world_bounds().intersects(&rect)
    }

    // =========================================================================
    // COMPARISON / OUTPUT
    // =========================================================================

    pub fn equals(&self, other: &ViewportState, tolerance: f64) -> bool {
        (self.zoom - other.zoom).abs() <= tolerance
            && self.pan.approx_eq(other.pan, tolerance)
            && (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }

    /// CSS `transform` value for DOM-based renderers.
    pub fn to_css_transform(&self) -> String {
        format!(
            "translate({}px, {}px) scale({})",
            self.pan.x, self.pan.y, self.zoom
        )
    }
}
