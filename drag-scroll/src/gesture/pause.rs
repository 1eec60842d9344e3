//! Pause Detection
//!
//! Distinguishes "still moving, between two samples" from "stopped while the
//! key is still held". A drag that goes quiet for longer than the lower
//! bound but not yet the upper bound, while still carrying real velocity, is
//! launched into momentum without waiting for key release.

use super::tuning::PauseTuning;
use super::velocity::Velocity;
use crate::time::Timestamp;

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseVerdict {
    /// No significant move recorded yet
    NoReference,
    /// Motion is too recent to call it a pause
    StillMoving,
    /// Pause is long enough but the drag was too slow to glide
    TooSlow,
    /// The window has passed; the drag simply stopped
    Expired,
    /// Launch momentum now
    Launch,
}

/// Probe logic bound to the current pause tuning.
pub struct PauseDetector<'a> {
    tuning: &'a PauseTuning,
}

impl<'a> PauseDetector<'a> {
    pub fn new(tuning: &'a PauseTuning) -> Self {
        Self { tuning }
    }

    /// Evaluate one probe at `now`.
    pub fn probe(
        &self,
        last_significant_move: Option<Timestamp>,
        velocity: Velocity,
        now: Timestamp,
    ) -> PauseVerdict {
        let Some(last) = last_significant_move else {
            return PauseVerdict::NoReference;
        };

        let elapsed = now.seconds_since(last);
        if elapsed <= self.tuning.min_secs {
            PauseVerdict::StillMoving
        } else if elapsed >= self.tuning.max_secs {
            PauseVerdict::Expired
        } else if velocity.exceeds(self.tuning.velocity_threshold) {
            PauseVerdict::Launch
        } else {
            PauseVerdict::TooSlow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(elapsed_ms: u64, velocity: Velocity) -> PauseVerdict {
        let tuning = PauseTuning::default();
        PauseDetector::new(&tuning).probe(
            Some(Timestamp::from_millis(1_000)),
            velocity,
            Timestamp::from_millis(1_000 + elapsed_ms),
        )
    }

    #[test]
    fn test_fast_drag_paused_launches() {
        assert_eq!(probe(100, Velocity::new(6.0, 0.0)), PauseVerdict::Launch);
        assert_eq!(probe(100, Velocity::new(0.0, -6.0)), PauseVerdict::Launch);
    }

    #[test]
    fn test_slow_drag_paused_does_not_launch() {
        assert_eq!(probe(100, Velocity::new(2.0, 0.0)), PauseVerdict::TooSlow);
        assert_eq!(probe(100, Velocity::new(5.0, 5.0)), PauseVerdict::TooSlow);
    }

    #[test]
    fn test_window_bounds_are_exclusive() {
        let fast = Velocity::new(20.0, 0.0);
        assert_eq!(probe(10, fast), PauseVerdict::StillMoving);
        assert_eq!(probe(30, fast), PauseVerdict::StillMoving);
        assert_eq!(probe(31, fast), PauseVerdict::Launch);
        assert_eq!(probe(199, fast), PauseVerdict::Launch);
        assert_eq!(probe(200, fast), PauseVerdict::Expired);
        assert_eq!(probe(2_000, fast), PauseVerdict::Expired);
    }

    #[test]
    fn test_no_reference_never_launches() {
        let tuning = PauseTuning::default();
        let verdict = PauseDetector::new(&tuning).probe(
            None,
            Velocity::new(50.0, 0.0),
            Timestamp::from_millis(100),
        );
        assert_eq!(verdict, PauseVerdict::NoReference);
    }
}
