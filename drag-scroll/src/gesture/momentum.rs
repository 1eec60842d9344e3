//! Momentum Simulation
//!
//! After release (or a detected pause) the session velocity keeps feeding the
//! emitter, shrinking by a constant factor every tick until both axes are at
//! or below the stop threshold.

use super::tuning::Tuning;
use super::velocity::Velocity;

/// Result of one momentum tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MomentumStep {
    /// Forward this (unscaled) delta to the emitter
    Emit(Velocity),
    /// Velocity fell below the stop threshold and has been zeroed
    Finished,
}

/// Decay loop bound to the current tuning. Operates on the session velocity.
pub struct MomentumSimulator<'a> {
    tuning: &'a Tuning,
}

impl<'a> MomentumSimulator<'a> {
    pub fn new(tuning: &'a Tuning) -> Self {
        Self { tuning }
    }

    /// One-time launch boost for a glide starting at `magnitude`.
    ///
    /// Slow drags get a little more push to make up for smoothing lag; fast
    /// flicks get almost none.
    pub fn boost_factor(&self, magnitude: f64) -> f64 {
        let m = &self.tuning.momentum;
        (m.boost_base - m.boost_slope * magnitude).clamp(m.boost_min, m.boost_max)
    }

    /// Whether `velocity` is fast enough to glide at all.
    pub fn can_launch(&self, velocity: Velocity) -> bool {
        velocity.reaches(self.tuning.momentum.start_threshold)
    }

    /// Apply the launch boost. Returns false, leaving `velocity` untouched,
    /// when the velocity is below the start threshold.
    pub fn launch(&self, velocity: &mut Velocity) -> bool {
        if !self.can_launch(*velocity) {
            return false;
        }
        let boost = self.boost_factor(velocity.magnitude());
        *velocity = velocity.scaled(boost);
        true
    }

    /// Advance one tick.
    pub fn tick(&self, velocity: &mut Velocity) -> MomentumStep {
        *velocity = velocity.scaled(self.tuning.deceleration);
        if velocity.exceeds(self.tuning.momentum.stop_threshold) {
            MomentumStep::Emit(*velocity)
        } else {
            *velocity = Velocity::ZERO;
            MomentumStep::Finished
        }
    }

    /// Number of ticks a glide starting at `velocity` takes to finish,
    /// counting the final non-emitting tick.
    pub fn ticks_to_halt(&self, velocity: Velocity) -> u32 {
        let peak = velocity.vx.abs().max(velocity.vy.abs());
        let stop = self.tuning.momentum.stop_threshold;
        if peak.is_nan() || peak <= stop {
            return 1;
        }
        let n = (stop / peak).ln() / self.tuning.deceleration.ln();
        n.ceil().max(1.0) as u32
    }
}
