//! Gesture session state.

use super::history::SampleHistory;
use super::velocity::Velocity;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Lifecycle phase of the live session.
///
/// `Primed` is the key-held flavour of idle: the trigger key is down but no
/// pointer sample has arrived yet. Dragging and momentum are variants of one
/// enum, so they can never be active together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GesturePhase {
    #[default]
    Idle,
    Primed,
    Dragging,
    Momentum,
}

impl GesturePhase {
    /// Dragging or gliding.
    pub fn is_active(&self) -> bool {
        matches!(self, GesturePhase::Dragging | GesturePhase::Momentum)
    }
}

/// The single live drag context.
#[derive(Debug, Clone)]
pub struct GestureSession {
    pub phase: GesturePhase,
    /// Absent until the first sample after activation
    pub last_location: Option<(f64, f64)>,
    pub last_move: Option<Timestamp>,
    /// Last move that cleared the minimum-movement threshold
    pub last_significant_move: Option<Timestamp>,
    pub history: SampleHistory,
    pub velocity: Velocity,
}

impl GestureSession {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            phase: GesturePhase::Idle,
            last_location: None,
            last_move: None,
            last_significant_move: None,
            history: SampleHistory::with_capacity(history_capacity),
            velocity: Velocity::ZERO,
        }
    }

    /// Forget everything about the previous drag, keeping the phase.
    pub fn clear_motion(&mut self) {
        self.last_location = None;
        self.last_move = None;
        self.last_significant_move = None;
        self.history.clear();
        self.velocity = Velocity::ZERO;
    }

    pub fn is_dragging(&self) -> bool {
        self.phase == GesturePhase::Dragging
    }

    pub fn is_momentum(&self) -> bool {
        self.phase == GesturePhase::Momentum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::history::Sample;

    #[test]
    fn test_new_session_is_idle_and_empty() {
        let session = GestureSession::new(5);
        assert_eq!(session.phase, GesturePhase::Idle);
        assert!(session.last_location.is_none());
        assert!(session.history.is_empty());
        assert!(session.velocity.is_zero());
    }

    #[test]
    fn test_clear_motion_keeps_phase() {
        let mut session = GestureSession::new(5);
        session.phase = GesturePhase::Dragging;
        session.last_location = Some((1.0, 2.0));
        session.last_significant_move = Some(Timestamp::from_millis(5));
        session.history.push(Sample::new(1.0, 1.0, Timestamp::from_millis(5)));
        session.velocity = Velocity::new(3.0, 3.0);

        session.clear_motion();
        assert_eq!(session.phase, GesturePhase::Dragging);
        assert!(session.last_location.is_none());
        assert!(session.last_significant_move.is_none());
        assert!(session.history.is_empty());
        assert!(session.velocity.is_zero());
    }

    #[test]
    fn test_phase_predicates() {
        assert!(GesturePhase::Dragging.is_active());
        assert!(GesturePhase::Momentum.is_active());
        assert!(!GesturePhase::Primed.is_active());
    }
}
