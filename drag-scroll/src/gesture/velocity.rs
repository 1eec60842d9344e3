//! Velocity Estimation
//!
//! Turns the recent sample history into a smoothed 2D velocity, measured in
//! pointer units per sample. Each sample is weighted by age: very fresh
//! samples get a fixed bonus weight, older ones fall off linearly and vanish
//! at the end of the window. The weighted mean is then blended with the
//! previous velocity, asymmetrically:
//!
//! - on a direction reversal the new estimate dominates, so flicking back
//!   feels immediate;
//! - otherwise the blend is conservative, which suppresses sensor jitter.

use super::history::SampleHistory;
use super::tuning::Tuning;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Smoothed pointer velocity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f64,
    pub vy: f64,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity { vx: 0.0, vy: 0.0 };

    pub const fn new(vx: f64, vy: f64) -> Self {
        Self { vx, vy }
    }

    /// Euclidean magnitude.
    pub fn magnitude(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    /// True if either axis is strictly above `threshold` in absolute value.
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.vx.abs() > threshold || self.vy.abs() > threshold
    }

    /// True if either axis reaches `threshold` in absolute value.
    pub fn reaches(&self, threshold: f64) -> bool {
        self.vx.abs() >= threshold || self.vy.abs() >= threshold
    }

    pub fn is_zero(&self) -> bool {
        self.vx == 0.0 && self.vy == 0.0
    }

    pub fn scaled(&self, factor: f64) -> Velocity {
        Velocity::new(self.vx * factor, self.vy * factor)
    }

    /// Replace non-finite components with zero.
    fn sanitized(self) -> Velocity {
        let clean = |v: f64| if v.is_finite() { v } else { 0.0 };
        Velocity::new(clean(self.vx), clean(self.vy))
    }
}

/// Velocity estimator bound to the current tuning.
pub struct VelocityEstimator<'a> {
    tuning: &'a Tuning,
}

impl<'a> VelocityEstimator<'a> {
    pub fn new(tuning: &'a Tuning) -> Self {
        Self { tuning }
    }

    /// Weight of a sample `age` seconds old.
    pub fn weight(&self, age: f64) -> f64 {
        let v = &self.tuning.velocity;
        if age < v.fresh_secs {
            v.fresh_weight
        } else {
            (1.0 - age / v.window_secs).max(0.0)
        }
    }

    /// Time-weighted mean delta per axis, or `None` when no sample carries
    /// any weight.
    pub fn weighted_average(&self, history: &SampleHistory, now: Timestamp) -> Option<Velocity> {
        let mut total_weight = 0.0;
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;

        for sample in history.iter() {
            let w = self.weight(now.seconds_since(sample.timestamp));
            if w <= 0.0 {
                continue;
            }
            total_weight += w;
            sum_x += sample.dx * w;
            sum_y += sample.dy * w;
        }

        if total_weight > 0.0 {
            Some(Velocity::new(sum_x / total_weight, sum_y / total_weight))
        } else {
            None
        }
    }

    /// Fold the history into `velocity`.
    ///
    /// With nothing to weigh (empty history or every sample outside the
    /// window) the current velocity decays by the deceleration rate instead.
    pub fn update(&self, velocity: &mut Velocity, history: &SampleHistory, now: Timestamp) {
        let Some(raw) = self.weighted_average(history, now) else {
            *velocity = velocity.scaled(self.tuning.deceleration).sanitized();
            return;
        };

        let blended = Velocity::new(
            self.blend_axis(velocity.vx, raw.vx),
            self.blend_axis(velocity.vy, raw.vy),
        );
        *velocity = blended.scaled(self.tuning.momentum_strength).sanitized();
    }

    fn blend_axis(&self, current: f64, estimate: f64) -> f64 {
        let reversal = current * estimate < 0.0;
        let alpha = if reversal {
            self.tuning.velocity.reversal_blend
        } else {
            self.tuning.velocity.smoothing_blend
        };
        alpha * estimate + (1.0 - alpha) * current
    }
}
