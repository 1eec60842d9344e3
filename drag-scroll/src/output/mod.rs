//! Scroll output
//!
//! The [`ScrollEmitter`] trait is the only way the gesture core affects the
//! outside world. On macOS deltas become Quartz scroll-wheel events; other
//! platforms have no injector and report [`crate::Error::Unavailable`].

pub mod emitter;
#[cfg(target_os = "macos")]
pub mod quartz;

pub use emitter::{EmittedDelta, NullEmitter, RecordingEmitter, ScrollEmitter};
#[cfg(target_os = "macos")]
pub use quartz::QuartzScrollEmitter;

use serde::{Deserialize, Serialize};

/// Unit of injected scroll events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScrollUnit {
    /// Continuous pixel scrolling, like a trackpad
    #[default]
    Pixel,
    /// Discrete line steps, like a notched wheel
    Line,
}

/// Converts fractional deltas into whole wheel steps without losing the
/// remainder, so a slow glide still adds up to the right distance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeltaAccumulator {
    residual_x: f64,
    residual_y: f64,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a delta and take out the whole steps now available.
    pub fn push(&mut self, dx: f64, dy: f64) -> (i32, i32) {
        let take = |residual: &mut f64, delta: f64| -> i32 {
            if delta.is_finite() {
                *residual += delta;
            }
            let whole = residual.trunc().clamp(i32::MIN as f64, i32::MAX as f64);
            *residual -= whole;
            whole as i32
        };
        let x = take(&mut self.residual_x, dx);
        let y = take(&mut self.residual_y, dy);
        (x, y)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn residual(&self) -> (f64, f64) {
        (self.residual_x, self.residual_y)
    }
}

/// The scroll injector for this platform.
#[cfg(target_os = "macos")]
pub fn platform_emitter(unit: ScrollUnit, invert: bool) -> crate::Result<Box<dyn ScrollEmitter>> {
    Ok(Box::new(QuartzScrollEmitter::new(unit, invert)))
}

/// The scroll injector for this platform.
#[cfg(not(target_os = "macos"))]
pub fn platform_emitter(_unit: ScrollUnit, _invert: bool) -> crate::Result<Box<dyn ScrollEmitter>> {
    Err(crate::Error::Unavailable(
        "scroll injection is only implemented for macOS".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_carries_fractions() {
        let mut acc = DeltaAccumulator::new();
        assert_eq!(acc.push(0.4, 0.0), (0, 0));
        assert_eq!(acc.push(0.4, 0.0), (0, 0));
        assert_eq!(acc.push(0.4, 0.0), (1, 0));
        let (rx, _) = acc.residual();
        assert!((rx - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_accumulator_handles_negative_deltas() {
        let mut acc = DeltaAccumulator::new();
        assert_eq!(acc.push(0.0, -2.75), (0, -2));
        assert_eq!(acc.push(0.0, -0.5), (0, -1));
        let (_, ry) = acc.residual();
        assert!((ry + 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_accumulator_ignores_non_finite() {
        let mut acc = DeltaAccumulator::new();
        assert_eq!(acc.push(f64::NAN, f64::INFINITY), (0, 0));
        assert_eq!(acc.residual(), (0.0, 0.0));
    }

    #[test]
    fn test_accumulator_reset() {
        let mut acc = DeltaAccumulator::new();
        acc.push(0.9, 0.9);
        acc.reset();
        assert_eq!(acc.residual(), (0.0, 0.0));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_platform_emitter_unavailable_off_macos() {
        assert!(matches!(
            platform_emitter(ScrollUnit::Pixel, false),
            Err(crate::Error::Unavailable(_))
        ));
    }
}
