//! Tunable Parameters
//!
//! All numeric knobs of the gesture core. The pause window and the launch
//! boost are empirically tuned; changing them changes the feel of a glide.

use serde::{Deserialize, Serialize};

/// Top-level tuning, mutable at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Multiplier applied to every delta handed to the emitter
    pub sensitivity: f64,
    /// Multiplier applied to the raw velocity estimate
    pub momentum_strength: f64,
    /// Per-tick velocity retention in (0, 1); closer to 1 glides longer
    pub deceleration: f64,
    /// Deltas at or below this on both axes are not forwarded while dragging
    pub min_movement: f64,
    /// Motion needed on either axis to abort a running glide
    pub momentum_cancel_threshold: f64,
    /// Number of recent samples kept for velocity estimation
    pub history_capacity: usize,
    pub velocity: VelocityTuning,
    pub pause: PauseTuning,
    pub momentum: MomentumTuning,
}

/// Velocity estimator weights and smoothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityTuning {
    /// Samples older than this contribute nothing (seconds)
    pub window_secs: f64,
    /// Samples younger than this get `fresh_weight` (seconds)
    pub fresh_secs: f64,
    pub fresh_weight: f64,
    /// Weight of the new estimate when an axis reverses direction
    pub reversal_blend: f64,
    /// Weight of the new estimate otherwise
    pub smoothing_blend: f64,
}

/// Pause detection window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PauseTuning {
    /// Exclusive lower bound on time since the last significant move (seconds)
    pub min_secs: f64,
    /// Exclusive upper bound on time since the last significant move (seconds)
    pub max_secs: f64,
    /// Velocity needed on either axis to launch from a pause
    pub velocity_threshold: f64,
    pub probe_hz: f64,
}

/// Momentum loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumTuning {
    /// Velocity needed on either axis for a glide to start
    pub start_threshold: f64,
    /// A glide ends once both axes fall to this value or below
    pub stop_threshold: f64,
    pub tick_hz: f64,
    pub boost_base: f64,
    pub boost_slope: f64,
    pub boost_min: f64,
    pub boost_max: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            momentum_strength: 1.0,
            deceleration: 0.95,
            min_movement: 0.5,
            momentum_cancel_threshold: 1.0,
            history_capacity: 5,
            velocity: VelocityTuning::default(),
            pause: PauseTuning::default(),
            momentum: MomentumTuning::default(),
        }
    }
}

impl Default for VelocityTuning {
    fn default() -> Self {
        Self {
            window_secs: 0.08,
            fresh_secs: 0.016,
            fresh_weight: 1.5,
            reversal_blend: 0.95,
            smoothing_blend: 0.8,
        }
    }
}

impl Default for PauseTuning {
    fn default() -> Self {
        Self {
            min_secs: 0.03,
            max_secs: 0.2,
            velocity_threshold: 5.0,
            probe_hz: 60.0,
        }
    }
}

impl Default for MomentumTuning {
    fn default() -> Self {
        Self {
            start_threshold: 1.0,
            stop_threshold: 0.1,
            tick_hz: 120.0,
            boost_base: 1.2,
            boost_slope: 0.01,
            boost_min: 1.02,
            boost_max: 1.15,
        }
    }
}

impl Tuning {
    /// Check every value is usable by the estimator and simulators.
    pub fn validate(&self) -> Result<(), crate::Error> {
        fn positive(name: &str, value: f64) -> Result<(), crate::Error> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(crate::Error::Config(format!("{name} must be > 0, got {value}")))
            }
        }
        fn non_negative(name: &str, value: f64) -> Result<(), crate::Error> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(crate::Error::Config(format!("{name} must be >= 0, got {value}")))
            }
        }
        fn unit(name: &str, value: f64) -> Result<(), crate::Error> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(crate::Error::Config(format!("{name} must be in [0, 1], got {value}")))
            }
        }

        positive("sensitivity", self.sensitivity)?;
        positive("momentum_strength", self.momentum_strength)?;
        if !(self.deceleration > 0.0 && self.deceleration < 1.0) {
            return Err(crate::Error::Config(format!(
                "deceleration must be in (0, 1), got {}",
                self.deceleration
            )));
        }
        non_negative("min_movement", self.min_movement)?;
        non_negative("momentum_cancel_threshold", self.momentum_cancel_threshold)?;
        if self.history_capacity == 0 {
            return Err(crate::Error::Config("history_capacity must be > 0".to_string()));
        }

        positive("velocity.window_secs", self.velocity.window_secs)?;
        non_negative("velocity.fresh_secs", self.velocity.fresh_secs)?;
        positive("velocity.fresh_weight", self.velocity.fresh_weight)?;
        unit("velocity.reversal_blend", self.velocity.reversal_blend)?;
        unit("velocity.smoothing_blend", self.velocity.smoothing_blend)?;

        non_negative("pause.min_secs", self.pause.min_secs)?;
        positive("pause.max_secs", self.pause.max_secs)?;
        if self.pause.min_secs >= self.pause.max_secs {
            return Err(crate::Error::Config(format!(
                "pause window is empty: min_secs {} >= max_secs {}",
                self.pause.min_secs, self.pause.max_secs
            )));
        }
        non_negative("pause.velocity_threshold", self.pause.velocity_threshold)?;
        positive("pause.probe_hz", self.pause.probe_hz)?;

        non_negative("momentum.start_threshold", self.momentum.start_threshold)?;
        positive("momentum.stop_threshold", self.momentum.stop_threshold)?;
        positive("momentum.tick_hz", self.momentum.tick_hz)?;
        positive("momentum.boost_min", self.momentum.boost_min)?;
        if self.momentum.boost_min > self.momentum.boost_max {
            return Err(crate::Error::Config(format!(
                "momentum.boost_min {} exceeds boost_max {}",
                self.momentum.boost_min, self.momentum.boost_max
            )));
        }
        Ok(())
    }

    /// Period of the pause probe.
    pub fn pause_probe_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.pause.probe_hz)
    }

    /// Period of the momentum loop.
    pub fn momentum_tick_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.momentum.tick_hz)
    }
}
