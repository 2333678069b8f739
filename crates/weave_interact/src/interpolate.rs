//! Typed interpolation between animation endpoints.

use crate::viewport::ViewportSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use weave_core::Point2;

/// Values the animation system can tween.
pub trait Interpolate: Clone {
    /// Value at eased progress `t` (0 = `self`, 1 = `target`). `t` may
    /// leave `[0,1]` for overshooting curves.
    fn interpolate(&self, target: &Self, t: f64) -> Self;
}

impl Interpolate for f64 {
    fn interpolate(&self, target: &Self, t: f64) -> Self {
        if t == 1.0 {
            return *target;
        }
        self + (target - self) * t
    }
}

impl Interpolate for Point2 {
    fn interpolate(&self, target: &Self, t: f64) -> Self {
        Point2::new(self.x.interpolate(&target.x, t), self.y.interpolate(&target.y, t))
    }
}

impl Interpolate for ViewportSnapshot {
    fn interpolate(&self, target: &Self, t: f64) -> Self {
        ViewportSnapshot {
            zoom: self.zoom.interpolate(&target.zoom, t),
            pan: self.pan.interpolate(&target.pan, t),
        }
    }
}

/// Dynamically shaped animation value.
///
/// Composite values interpolate property by property: numbers and points
/// tween, anything else (text, flags, shape mismatches, keys missing from
/// the start value) takes the target's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnimValue {
    Number(f64),
    Point(Point2),
    Flag(bool),
    Text(String),
    Composite(BTreeMap<String, AnimValue>),
}

impl AnimValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AnimValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_point(&self) -> Option<Point2> {
        match self {
            AnimValue::Point(p) => Some(*p),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&AnimValue> {
        match self {
            AnimValue::Composite(map) => map.get(key),
            _ => None,
        }
    }

    /// Build a composite from `(key, value)` pairs.
    pub fn composite<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, AnimValue)>,
        K: Into<String>,
    {
        AnimValue::Composite(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<f64> for AnimValue {
    fn from(n: f64) -> Self {
        AnimValue::Number(n)
    }
}

impl From<Point2> for AnimValue {
    fn from(p: Point2) -> Self {
        AnimValue::Point(p)
    }
}

impl From<ViewportSnapshot> for AnimValue {
    fn from(s: ViewportSnapshot) -> Self {
        AnimValue::composite([("zoom", AnimValue::Number(s.zoom)), ("pan", AnimValue::Point(s.pan))])
    }
}

impl Interpolate for AnimValue {
    fn interpolate(&self, target: &Self, t: f64) -> Self {
        match (self, target) {
            (AnimValue::Number(a), AnimValue::Number(b)) => AnimValue::Number(a.interpolate(b, t)),
            (AnimValue::Point(a), AnimValue::Point(b)) => AnimValue::Point(a.interpolate(b, t)),
            (AnimValue::Composite(a), AnimValue::Composite(b)) => AnimValue::Composite(
                b.iter()
                    .map(|(key, end)| {
                        let value = match a.get(key) {
                            Some(start) => start.interpolate(end, t),
                            None => end.clone(),
                        };
                        (key.clone(), value)
                    })
                    .collect(),
            ),
            _ => target.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn numbers_and_points() {
        assert_eq!(0.0f64.interpolate(&100.0, 0.25), 25.0);
        assert_eq!(
            Point2::new(0.0, 10.0).interpolate(&Point2::new(10.0, 0.0), 0.5),
            Point2::new(5.0, 5.0)
        );
        // overshoot is allowed
        assert!((0.0f64.interpolate(&10.0, 1.2) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn composite_tweens_numeric_and_copies_the_rest() {
        let start = AnimValue::composite([
            ("opacity", AnimValue::Number(0.0)),
            ("offset", AnimValue::Point(Point2::ZERO)),
            ("label", AnimValue::Text("a".into())),
        ]);
        let end = AnimValue::composite([
            ("opacity", AnimValue::Number(1.0)),
            ("offset", AnimValue::Point(Point2::new(4.0, 8.0))),
            ("label", AnimValue::Text("b".into())),
            ("visible", AnimValue::Flag(true)),
        ]);
        let mid = start.interpolate(&end, 0.5);
        assert_eq!(
            mid,
            AnimValue::composite([
                ("opacity", AnimValue::Number(0.5)),
                ("offset", AnimValue::Point(Point2::new(2.0, 4.0))),
                ("label", AnimValue::Text("b".into())),
                ("visible", AnimValue::Flag(true)),
            ])
        );
        assert_eq!(start.interpolate(&end, 1.0), end);
    }

    #[test]
    fn viewport_snapshot_interpolates_both_fields() {
        let a = ViewportSnapshot::default();
        let b = ViewportSnapshot {
            zoom: 3.0,
            pan: Point2::new(-20.0, 40.0),
        };
        let mid = a.interpolate(&b, 0.5);
        assert_eq!(mid.zoom, 2.0);
        assert_eq!(mid.pan, Point2::new(-10.0, 20.0));
        assert_eq!(AnimValue::from(b).get("zoom").and_then(AnimValue::as_number), Some(3.0));
    }
}
