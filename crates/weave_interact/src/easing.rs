//! Easing curves mapping linear progress `t ∈ [0,1]` to eased progress.
//!
//! Every curve satisfies `apply(0) == 0` and `apply(1) == 1`; elastic,
//! spring and bounce curves may overshoot in between.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Span of simulated time a spring curve covers (seconds).
const SPRING_SPAN_SECS: f64 = 1.0;

/// Easing curve.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Easing {
    Linear,
    EaseInQuad,
    EaseOutQuad,
    EaseInOutQuad,
    EaseInCubic,
    #[default]
    EaseOutCubic,
    EaseInOutCubic,
    EaseOutElastic,
    /// Damped harmonic oscillator settling on the target.
    Spring { tension: f64, friction: f64 },
    /// Decaying bounces against the target.
    Bounce { bounces: u32, decay: f64 },
}

impl Easing {
    /// Spring with react-style defaults (critically damped).
    pub fn spring() -> Self {
        Easing::Spring {
            tension: 170.0,
            friction: 26.0,
        }
    }

    pub fn spring_with(tension: f64, friction: f64) -> Self {
        Easing::Spring {
            tension: tension.max(f64::EPSILON),
            friction: friction.max(0.0),
        }
    }

    pub fn bounce(bounces: u32, decay: f64) -> Self {
        Easing::Bounce {
            bounces: bounces.max(1),
            decay: decay.max(0.0),
        }
    }

    /// Look up a curve by its conventional camelCase name.
    pub fn from_name(name: &str) -> Option<Easing> {
        let easing = match name {
            "linear" => Easing::Linear,
            "easeInQuad" => Easing::EaseInQuad,
            "easeOutQuad" => Easing::EaseOutQuad,
            "easeInOutQuad" => Easing::EaseInOutQuad,
            "easeInCubic" => Easing::EaseInCubic,
            "easeOutCubic" => Easing::EaseOutCubic,
            "easeInOutCubic" => Easing::EaseInOutCubic,
            "easeOutElastic" => Easing::EaseOutElastic,
            "spring" => Easing::spring(),
            "bounce" => Easing::bounce(3, 3.0),
            _ => return None,
        };
        Some(easing)
    }

    /// Eased progress for linear progress `t` (clamped to `[0,1]`).
    pub fn apply(&self, t: f64) -> f64 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        if t == 0.0 || t == 1.0 {
            return t;
        }
        match *self {
            Easing::Linear => t,
            Easing::EaseInQuad => t * t,
            Easing::EaseOutQuad => t * (2.0 - t),
            Easing::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::EaseInCubic => t * t * t,
            Easing::EaseOutCubic => {
                let u = t - 1.0;
                u * u * u + 1.0
            }
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = 2.0 * t - 2.0;
                    (t - 1.0) * u * u + 1.0
                }
            }
            Easing::EaseOutElastic => {
                let c4 = (2.0 * PI) / 3.0;
                2f64.powf(-10.0 * t) * ((t * 10.0 - 0.75) * c4).sin() + 1.0
            }
            Easing::Spring { tension, friction } => spring_curve(tension, friction, t),
            Easing::Bounce { bounces, decay } => {
                let n = bounces.max(1) as f64;
                1.0 - (t * PI * (n + 0.5)).cos().abs() * (-decay * t).exp()
            }
        }
    }
}

fn spring_curve(tension: f64, friction: f64, t: f64) -> f64 {
    let omega = tension.max(f64::EPSILON).sqrt();
    let zeta = friction / (2.0 * omega);
    let s = t * SPRING_SPAN_SECS;
    if zeta < 1.0 {
        let wd = omega * (1.0 - zeta * zeta).sqrt();
        1.0 - (-zeta * omega * s).exp() * ((wd * s).cos() + (zeta * omega / wd) * (wd * s).sin())
    } else {
        // critically damped or heavier: no oscillation
        1.0 - (-omega * s).exp() * (1.0 + omega * s)
    }
}
