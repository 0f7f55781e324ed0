//! Gain ramp shapes
//!
//! Transport fades (the 100 ms ramp on play and pause) are linear by default,
//! but the shape is configurable so a gentler curve can be used for very quiet
//! narration.

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};

/// Shape of a gain ramp
///
/// - Linear: constant rate of change
/// - Exponential: slow start, fast finish
/// - Logarithmic: fast start, slow finish
/// - SCurve: eased at both ends
/// - EqualPower: constant perceived loudness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// v(t) = t
    #[default]
    Linear,
    /// v(t) = t²
    Exponential,
    /// v(t) = √t rising, (1-t)² falling
    Logarithmic,
    /// v(t) = 0.5 × (1 - cos(π t))
    SCurve,
    /// v(t) = sin(t × π/2)
    EqualPower,
}

impl FadeCurve {
    /// Multiplier for a rising ramp, `position` normalized to 0.0..=1.0
    pub fn calculate_fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::Exponential => t * t,
            FadeCurve::Logarithmic => t.sqrt(),
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Multiplier for a falling ramp: 1.0 at `position` 0.0, 0.0 at 1.0
    pub fn calculate_fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::Exponential | FadeCurve::Logarithmic => {
                let inv = 1.0 - t;
                inv * inv
            }
            FadeCurve::SCurve => 0.5 * (1.0 + (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// Gain between `from` and `to` at normalized `position`
    ///
    /// Rising ramps use the fade-in shape, falling ramps the fade-out shape,
    /// so a ramp always lands exactly on `to` at position 1.0.
    pub fn interpolate(&self, from: f32, to: f32, position: f32) -> f32 {
        if to >= from {
            from + (to - from) * self.calculate_fade_in(position)
        } else {
            to + (from - to) * self.calculate_fade_out(position)
        }
    }

    /// Parse from a configuration string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(FadeCurve::Linear),
            "exponential" => Some(FadeCurve::Exponential),
            "logarithmic" => Some(FadeCurve::Logarithmic),
            "cosine" | "scurve" | "s-curve" | "s_curve" => Some(FadeCurve::SCurve),
            "equal_power" | "equalpower" => Some(FadeCurve::EqualPower),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "Linear",
            FadeCurve::Exponential => "Exponential",
            FadeCurve::Logarithmic => "Logarithmic",
            FadeCurve::SCurve => "S-Curve",
            FadeCurve::EqualPower => "Equal Power",
        }
    }

    pub fn all_variants() -> &'static [FadeCurve] {
        &[
            FadeCurve::Linear,
            FadeCurve::Exponential,
            FadeCurve::Logarithmic,
            FadeCurve::SCurve,
            FadeCurve::EqualPower,
        ]
    }
}

impl std::fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
