//! Gesture State Machine
//!
//! Interprets trigger key transitions and pointer samples, forwards drag
//! motion to the emitter, and owns the momentum and pause logic. Every
//! handler takes `&mut self`; the engine itself never spawns timers. The host
//! calls [`GestureEngine::on_pause_probe`] and
//! [`GestureEngine::on_momentum_tick`] at the configured rates while the
//! phase asks for them (see `runtime::controller`).
//!
//! ```text
//!            key down               first sample
//!   Idle ───────────────▶ Primed ───────────────▶ Dragging
//!    ▲                      │ key up                 │  │
//!    └──────────────────────┘                        │  │ key up / pause
//!    ▲              velocity below start threshold   │  ▼
//!    └───────────────────────────────────────────────┘ Momentum
//!    ▲                                                   │
//!    └─────────────── velocity below stop threshold ─────┘
//! ```

use super::momentum::{MomentumSimulator, MomentumStep};
use super::pause::{PauseDetector, PauseVerdict};
use super::session::{GesturePhase, GestureSession};
use super::tuning::Tuning;
use super::velocity::{Velocity, VelocityEstimator};
use super::history::Sample;
use crate::capture::types::InputEvent;
use crate::output::ScrollEmitter;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Why a glide was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchReason {
    KeyReleased,
    /// A pointer sample arrived with the key already up
    ReleaseObservedOnMove,
    Paused,
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub pointer_samples: u64,
    pub drag_deltas: u64,
    pub momentum_deltas: u64,
    pub momentum_launches: u64,
    pub momentum_cancels: u64,
    pub emit_failures: u64,
}

/// Read-only snapshot for the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub enabled: bool,
    pub trigger_down: bool,
    pub phase: GesturePhase,
    pub gesture_active: bool,
    pub last_motion: Option<Timestamp>,
    pub velocity: Velocity,
    pub emitter_available: bool,
}

/// The drag-to-scroll state machine.
pub struct GestureEngine<E: ScrollEmitter> {
    tuning: Tuning,
    session: GestureSession,
    emitter: E,
    enabled: bool,
    trigger_down: bool,
    last_motion: Option<Timestamp>,
    emitter_available: bool,
    stats: EngineStats,
}

impl<E: ScrollEmitter> GestureEngine<E> {
    /// Create an engine. The tuning is expected to be validated already; use
    /// [`GestureEngine::set_tuning`] for checked updates.
    pub fn new(tuning: Tuning, emitter: E) -> Self {
        let session = GestureSession::new(tuning.history_capacity);
        Self {
            tuning,
            session,
            emitter,
            enabled: true,
            trigger_down: false,
            last_motion: None,
            emitter_available: true,
            stats: EngineStats::default(),
        }
    }

    pub fn phase(&self) -> GesturePhase {
        self.session.phase
    }

    pub fn session(&self) -> &GestureSession {
        &self.session
    }

    pub fn velocity(&self) -> Velocity {
        self.session.velocity
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            enabled: self.enabled,
            trigger_down: self.trigger_down,
            phase: self.session.phase,
            gesture_active: self.session.phase.is_active(),
            last_motion: self.last_motion,
            velocity: self.session.velocity,
            emitter_available: self.emitter_available,
        }
    }

    /// Replace the tuning after validating it.
    pub fn set_tuning(&mut self, tuning: Tuning) -> crate::Result<()> {
        tuning.validate()?;
        self.session.history.set_capacity(tuning.history_capacity);
        self.tuning = tuning;
        Ok(())
    }

    /// Apply an in-place edit to the tuning; rejected edits leave it unchanged.
    pub fn update_tuning(&mut self, edit: impl FnOnce(&mut Tuning)) -> crate::Result<()> {
        let mut tuning = self.tuning.clone();
        edit(&mut tuning);
        self.set_tuning(tuning)
    }

    /// Turn the engine on or off. Disabling stops any glide immediately and
    /// drops the session; while disabled every event is ignored.
    pub fn set_enabled(&mut self, enabled: bool) -> GesturePhase {
        if self.enabled == enabled {
            return self.session.phase;
        }
        self.enabled = enabled;
        if !enabled {
            self.trigger_down = false;
            self.transition(GesturePhase::Idle, "disabled");
            self.session.clear_motion();
        }
        debug!(enabled, "gesture engine enable flag changed");
        self.session.phase
    }

    /// Drop the session and return to idle, keeping configuration.
    pub fn reset(&mut self) {
        self.trigger_down = false;
        self.transition(GesturePhase::Idle, "reset");
        self.session.clear_motion();
    }

    /// Dispatch one input event.
    pub fn handle(&mut self, event: &InputEvent) -> GesturePhase {
        match *event {
            InputEvent::Trigger { down, timestamp } => self.on_trigger(down, timestamp),
            InputEvent::Pointer { x, y, timestamp } => self.on_pointer(x, y, timestamp),
        }
    }

    /// Trigger key transition.
    pub fn on_trigger(&mut self, down: bool, at: Timestamp) -> GesturePhase {
        if !self.enabled || down == self.trigger_down {
            return self.session.phase;
        }
        self.trigger_down = down;
        trace!(down, at = at.as_nanos(), "trigger key");

        if down {
            if self.session.is_momentum() {
                self.stats.momentum_cancels += 1;
            }
            self.transition(GesturePhase::Primed, "trigger down");
            self.session.clear_motion();
            return self.session.phase;
        }

        match self.session.phase {
            GesturePhase::Dragging => self.start_momentum(LaunchReason::KeyReleased),
            // A glide launched by a pause keeps going after release
            GesturePhase::Momentum => {}
            GesturePhase::Primed | GesturePhase::Idle => {
                self.transition(GesturePhase::Idle, "trigger up");
                self.session.clear_motion();
            }
        }
        self.session.phase
    }

    /// Absolute pointer position.
    pub fn on_pointer(&mut self, x: f64, y: f64, at: Timestamp) -> GesturePhase {
        if !self.enabled {
            return self.session.phase;
        }
        if !x.is_finite() || !y.is_finite() {
            trace!(x, y, "ignoring non-finite pointer sample");
            return self.session.phase;
        }
        self.stats.pointer_samples += 1;

        if !self.trigger_down {
            // Missed key-up: the drag is over, glide from where it was
            if self.session.is_dragging() {
                self.start_momentum(LaunchReason::ReleaseObservedOnMove);
            }
            return self.session.phase;
        }

        match self.session.phase {
            GesturePhase::Idle => {}
            GesturePhase::Primed => {
                self.anchor(x, y, at);
                self.transition(GesturePhase::Dragging, "first sample");
            }
            GesturePhase::Dragging => self.drag_to(x, y, at),
            GesturePhase::Momentum => self.move_during_momentum(x, y, at),
        }
        self.session.phase
    }

    /// Pause probe; only acts while dragging.
    pub fn on_pause_probe(&mut self, now: Timestamp) -> GesturePhase {
        if !self.enabled || !self.session.is_dragging() {
            return self.session.phase;
        }
        let verdict = PauseDetector::new(&self.tuning.pause).probe(
            self.session.last_significant_move,
            self.session.velocity,
            now,
        );
        if verdict == PauseVerdict::Launch {
            self.start_momentum(LaunchReason::Paused);
        }
        self.session.phase
    }

    /// Momentum tick; only acts while gliding.
    pub fn on_momentum_tick(&mut self, now: Timestamp) -> GesturePhase {
        if !self.enabled || !self.session.is_momentum() {
            return self.session.phase;
        }
        let step = MomentumSimulator::new(&self.tuning).tick(&mut self.session.velocity);
        match step {
            MomentumStep::Emit(delta) => {
                self.stats.momentum_deltas += 1;
                self.last_motion = Some(now);
                self.forward(delta.vx, delta.vy);
            }
            MomentumStep::Finished => {
                // Key still held after a pause launch: the next sample re-anchors
                let next = if self.trigger_down {
                    GesturePhase::Primed
                } else {
                    GesturePhase::Idle
                };
                self.transition(next, "momentum finished");
                self.session.clear_motion();
            }
        }
        self.session.phase
    }

    fn anchor(&mut self, x: f64, y: f64, at: Timestamp) {
        self.session.last_location = Some((x, y));
        self.session.last_move = Some(at);
    }

    fn drag_to(&mut self, x: f64, y: f64, at: Timestamp) {
        let Some((lx, ly)) = self.session.last_location else {
            self.anchor(x, y, at);
            return;
        };
        let (dx, dy) = (x - lx, y - ly);
        self.anchor(x, y, at);

        self.session.history.push(Sample::new(dx, dy, at));
        VelocityEstimator::new(&self.tuning).update(
            &mut self.session.velocity,
            &self.session.history,
            at,
        );

        let min = self.tuning.min_movement;
        if dx.abs() > min || dy.abs() > min {
            self.session.last_significant_move = Some(at);
            self.last_motion = Some(at);
            self.stats.drag_deltas += 1;
            self.forward(dx, dy);
        }
    }

    fn move_during_momentum(&mut self, x: f64, y: f64, at: Timestamp) {
        let Some((lx, ly)) = self.session.last_location else {
            self.anchor(x, y, at);
            return;
        };
        let (dx, dy) = (x - lx, y - ly);
        self.anchor(x, y, at);

        let cancel = self.tuning.momentum_cancel_threshold;
        if dx.abs() > cancel || dy.abs() > cancel {
            self.stats.momentum_cancels += 1;
            self.session.clear_motion();
            self.anchor(x, y, at);
            self.transition(GesturePhase::Dragging, "motion during momentum");
        }
    }

    fn start_momentum(&mut self, reason: LaunchReason) {
        let sim = MomentumSimulator::new(&self.tuning);
        let before = self.session.velocity;
        if sim.launch(&mut self.session.velocity) {
            self.stats.momentum_launches += 1;
            self.session.history.clear();
            debug!(
                ?reason,
                vx = self.session.velocity.vx,
                vy = self.session.velocity.vy,
                boost = self.session.velocity.magnitude() / before.magnitude(),
                expected_ticks = sim.ticks_to_halt(self.session.velocity),
                "momentum launched"
            );
            self.transition(GesturePhase::Momentum, "launch");
        } else {
            trace!(?reason, vx = before.vx, vy = before.vy, "too slow to glide");
            self.transition(GesturePhase::Idle, "too slow to glide");
            self.session.clear_motion();
        }
    }

    fn forward(&mut self, dx: f64, dy: f64) {
        let s = self.tuning.sensitivity;
        match self.emitter.emit(dx * s, dy * s) {
            Ok(()) => {
                if !self.emitter_available {
                    debug!(emitter = self.emitter.name(), "scroll emitter recovered");
                    self.emitter_available = true;
                }
            }
            Err(e) => {
                self.stats.emit_failures += 1;
                if self.emitter_available {
                    warn!(emitter = self.emitter.name(), error = %e, "scroll emission failed; scrolling has no effect until it recovers");
                    self.emitter_available = false;
                }
            }
        }
    }

    fn transition(&mut self, to: GesturePhase, reason: &'static str) {
        let from = self.session.phase;
        if from != to {
            debug!(?from, ?to, reason, "gesture phase changed");
            self.session.phase = to;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RecordingEmitter;

    fn engine() -> (GestureEngine<RecordingEmitter>, RecordingEmitter) {
        let emitter = RecordingEmitter::new();
        (GestureEngine::new(Tuning::default(), emitter.clone()), emitter)
    }

    fn ms(v: u64) -> Timestamp {
        Timestamp::from_millis(v)
    }

    /// Key down, then a horizontal drag of `steps` samples `step` apart every 8ms.
    fn drag(engine: &mut GestureEngine<RecordingEmitter>, step: f64, steps: u64) -> u64 {
        engine.on_trigger(true, ms(0));
        engine.on_pointer(100.0, 100.0, ms(8));
        let mut t = 8;
        for i in 1..=steps {
            t = 8 + i * 8;
            engine.on_pointer(100.0 + step * i as f64, 100.0, ms(t));
        }
        t
    }

    #[test]
    fn test_first_sample_is_anchor_only() {
        let (mut engine, emitter) = engine();
        assert_eq!(engine.on_trigger(true, ms(0)), GesturePhase::Primed);
        assert_eq!(engine.on_pointer(500.0, 500.0, ms(8)), GesturePhase::Dragging);
        assert!(emitter.is_empty());
        assert!(engine.session().history.is_empty());
    }

    #[test]
    fn test_drag_forwards_deltas_one_to_one() {
        let (mut engine, emitter) = engine();
        drag(&mut engine, 4.0, 3);
        let deltas = emitter.deltas();
        assert_eq!(deltas.len(), 3);
        assert!(deltas.iter().all(|d| d.dx == 4.0 && d.dy == 0.0));
        assert_eq!(engine.stats().drag_deltas, 3);
    }

    #[test]
    fn test_sensitivity_scales_both_axes() {
        let (mut engine, emitter) = engine();
        engine.update_tuning(|t| t.sensitivity = 2.5).unwrap();
        engine.on_trigger(true, ms(0));
        engine.on_pointer(0.0, 0.0, ms(8));
        engine.on_pointer(2.0, -4.0, ms(16));
        assert_eq!(emitter.total(), (5.0, -10.0));
    }

    #[test]
    fn test_sub_threshold_motion_not_forwarded() {
        let (mut engine, emitter) = engine();
        engine.on_trigger(true, ms(0));
        engine.on_pointer(0.0, 0.0, ms(8));
        engine.on_pointer(0.3, 0.5, ms(16));
        assert!(emitter.is_empty());
        assert_eq!(engine.session().history.len(), 1);
        assert!(engine.session().last_significant_move.is_none());
    }

    #[test]
    fn test_pointer_without_key_is_ignored() {
        let (mut engine, emitter) = engine();
        engine.on_pointer(0.0, 0.0, ms(0));
        engine.on_pointer(50.0, 0.0, ms(8));
        assert_eq!(engine.phase(), GesturePhase::Idle);
        assert!(emitter.is_empty());
    }

    #[test]
    fn test_release_with_velocity_glides() {
        let (mut engine, _emitter) = engine();
        let t = drag(&mut engine, 10.0, 5);
        assert!(!engine.velocity().is_zero());
        assert_eq!(engine.on_trigger(false, ms(t + 1)), GesturePhase::Momentum);
        assert_eq!(engine.stats().momentum_launches, 1);
    }

    #[test]
    fn test_release_without_velocity_goes_idle() {
        let (mut engine, emitter) = engine();
        engine.on_trigger(true, ms(0));
        engine.on_pointer(10.0, 10.0, ms(8));
        assert_eq!(engine.on_trigger(false, ms(16)), GesturePhase::Idle);
        assert!(emitter.is_empty());
        assert!(engine.session().last_location.is_none());
    }

    #[test]
    fn test_slow_release_never_enters_momentum() {
        let (mut engine, emitter) = engine();
        engine.update_tuning(|t| t.min_movement = 0.1).unwrap();
        drag(&mut engine, 0.5, 5);
        let drag_emits = emitter.len();
        assert_eq!(engine.on_trigger(false, ms(100)), GesturePhase::Idle);
        engine.on_momentum_tick(ms(108));
        assert_eq!(emitter.len(), drag_emits);
        assert_eq!(engine.stats().momentum_launches, 0);
    }

    #[test]
    fn test_missed_key_up_launches_on_next_move() {
        let (mut engine, _emitter) = engine();
        let t = drag(&mut engine, 10.0, 5);
        // Pretend the key-up got lost: force the flag without a transition
        engine.trigger_down = false;
        assert_eq!(engine.on_pointer(0.0, 0.0, ms(t + 8)), GesturePhase::Momentum);
    }

    #[test]
    fn test_momentum_emits_then_finishes() {
        let (mut engine, emitter) = engine();
        let t = drag(&mut engine, 10.0, 5);
        engine.on_trigger(false, ms(t));
        let drag_emits = emitter.len();

        let mut now = t;
        let mut ticks = 0;
        while engine.phase() == GesturePhase::Momentum {
            now += 8;
            engine.on_momentum_tick(ms(now));
            ticks += 1;
            assert!(ticks < 10_000);
        }
        assert_eq!(engine.phase(), GesturePhase::Idle);
        assert!(engine.velocity().is_zero());
        assert_eq!(emitter.len() - drag_emits, ticks - 1);

        engine.on_momentum_tick(ms(now + 8));
        assert_eq!(emitter.len() - drag_emits, ticks - 1);
    }

    #[test]
    fn test_key_down_cancels_momentum() {
        let (mut engine, _emitter) = engine();
        let t = drag(&mut engine, 10.0, 5);
        engine.on_trigger(false, ms(t));
        assert_eq!(engine.on_trigger(true, ms(t + 20)), GesturePhase::Primed);
        assert!(engine.velocity().is_zero());
        assert_eq!(engine.stats().momentum_cancels, 1);
    }

    #[test]
    fn test_motion_during_pause_launch_cancels_glide() {
        let (mut engine, emitter) = engine();
        let t = drag(&mut engine, 10.0, 5);
        assert_eq!(engine.on_pause_probe(ms(t + 100)), GesturePhase::Momentum);
        engine.on_momentum_tick(ms(t + 108));
        let before = emitter.len();

        // Small jitter does not cancel
        assert_eq!(engine.on_pointer(150.5, 100.0, ms(t + 110)), GesturePhase::Momentum);
        // Real motion does
        assert_eq!(engine.on_pointer(160.0, 100.0, ms(t + 112)), GesturePhase::Dragging);
        assert!(engine.session().history.is_empty());
        assert!(engine.velocity().is_zero());
        assert_eq!(emitter.len(), before);
    }

    #[test]
    fn test_pause_probe_respects_velocity_threshold() {
        let (mut fast, _) = engine();
        let t = drag(&mut fast, 10.0, 5);
        assert!(fast.velocity().vx > 5.0);
        assert_eq!(fast.on_pause_probe(ms(t + 100)), GesturePhase::Momentum);

        let (mut slow, _) = engine();
        let t = drag(&mut slow, 2.0, 5);
        assert!(slow.velocity().vx < 5.0);
        assert_eq!(slow.on_pause_probe(ms(t + 100)), GesturePhase::Dragging);
    }

    #[test]
    fn test_key_release_keeps_pause_launched_glide() {
        let (mut engine, _) = engine();
        let t = drag(&mut engine, 10.0, 5);
        engine.on_pause_probe(ms(t + 100));
        assert_eq!(engine.on_trigger(false, ms(t + 110)), GesturePhase::Momentum);
    }

    #[test]
    fn test_glide_finishing_with_key_held_rearms() {
        let (mut engine, _) = engine();
        let t = drag(&mut engine, 10.0, 5);
        engine.on_pause_probe(ms(t + 100));
        let mut now = t + 100;
        while engine.phase() == GesturePhase::Momentum {
            now += 8;
            engine.on_momentum_tick(ms(now));
        }
        assert_eq!(engine.phase(), GesturePhase::Primed);
    }

    #[test]
    fn test_disable_stops_momentum_and_ignores_events() {
        let (mut engine, emitter) = engine();
        let t = drag(&mut engine, 10.0, 5);
        engine.on_trigger(false, ms(t));
        engine.on_momentum_tick(ms(t + 8));
        let before = emitter.len();

        assert_eq!(engine.set_enabled(false), GesturePhase::Idle);
        assert!(engine.velocity().is_zero());
        engine.on_momentum_tick(ms(t + 16));
        engine.on_trigger(true, ms(t + 20));
        engine.on_pointer(0.0, 0.0, ms(t + 24));
        engine.on_pointer(40.0, 0.0, ms(t + 32));
        assert_eq!(emitter.len(), before);
        assert_eq!(engine.phase(), GesturePhase::Idle);

        engine.set_enabled(true);
        engine.on_trigger(true, ms(t + 40));
        assert_eq!(engine.phase(), GesturePhase::Primed);
    }

    #[test]
    fn test_invalid_tuning_rejected_and_kept() {
        let (mut engine, _) = engine();
        assert!(engine.update_tuning(|t| t.deceleration = 1.5).is_err());
        assert_eq!(engine.tuning().deceleration, 0.95);
    }

    #[test]
    fn test_status_snapshot() {
        let (mut engine, _) = engine();
        drag(&mut engine, 10.0, 2);
        let status = engine.status();
        assert!(status.enabled);
        assert!(status.trigger_down);
        assert!(status.gesture_active);
        assert_eq!(status.phase, GesturePhase::Dragging);
        assert_eq!(status.last_motion, Some(ms(24)));
        assert!(status.emitter_available);
    }

    struct FailingEmitter;

    impl ScrollEmitter for FailingEmitter {
        fn emit(&mut self, _dx: f64, _dy: f64) -> crate::Result<()> {
            Err(crate::Error::Emit("no window server".into()))
        }
    }

    #[test]
    fn test_emit_failure_degrades_without_panicking() {
        let mut engine = GestureEngine::new(Tuning::default(), FailingEmitter);
        engine.on_trigger(true, ms(0));
        engine.on_pointer(0.0, 0.0, ms(8));
        engine.on_pointer(10.0, 0.0, ms(16));
        engine.on_pointer(20.0, 0.0, ms(24));
        assert!(!engine.status().emitter_available);
        assert_eq!(engine.stats().emit_failures, 2);
        assert_eq!(engine.phase(), GesturePhase::Dragging);
    }
}
