//! Offline trace playback
//!
//! Drives a [`GestureEngine`] from a [`Trace`] on a virtual clock. Timers
//! follow the same rules as the live controller: the pause probe runs while
//! dragging and the momentum ticker while gliding, each first firing one
//! period after its phase was entered. Between two events every due timer
//! fires in time order; after the last event the engine is run until nothing
//! more can happen.

use super::trace::Trace;
use crate::gesture::{EngineStats, GestureEngine, GesturePhase, Tuning};
use crate::output::RecordingEmitter;
use crate::time::Timestamp;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Upper bound on timer firings after the last event.
const MAX_SETTLE_FIRINGS: usize = 1_000_000;

/// What produced an emitted delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaOrigin {
    Drag,
    Momentum,
}

/// One emitted scroll delta with its virtual time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimedDelta {
    pub at: Timestamp,
    pub dx: f64,
    pub dy: f64,
    pub origin: DeltaOrigin,
}

/// Result of replaying a trace.
#[derive(Debug, Clone, Serialize)]
pub struct Playback {
    pub deltas: Vec<TimedDelta>,
    pub stats: EngineStats,
    pub final_phase: GesturePhase,
    /// Virtual time when playback settled
    pub ended_at: Timestamp,
}

impl Playback {
    pub fn total(&self) -> (f64, f64) {
        self.deltas
            .iter()
            .fold((0.0, 0.0), |(x, y), d| (x + d.dx, y + d.dy))
    }

    pub fn count(&self, origin: DeltaOrigin) -> usize {
        self.deltas.iter().filter(|d| d.origin == origin).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    Probe,
    Tick,
}

/// Replays traces against a fresh engine.
#[derive(Debug, Clone, Default)]
pub struct TracePlayer {
    tuning: Tuning,
}

struct Run {
    engine: GestureEngine<RecordingEmitter>,
    emitter: RecordingEmitter,
    probe_period: Duration,
    tick_period: Duration,
    next_probe: Option<Timestamp>,
    next_tick: Option<Timestamp>,
    deltas: Vec<TimedDelta>,
    now: Timestamp,
}

impl Run {
    fn collect(&mut self, at: Timestamp, origin: DeltaOrigin) {
        for d in self.emitter.take() {
            self.deltas.push(TimedDelta {
                at,
                dx: d.dx,
                dy: d.dy,
                origin,
            });
        }
    }

    fn sync_timers(&mut self, at: Timestamp) {
        let phase = self.engine.phase();
        match (phase == GesturePhase::Dragging, self.next_probe.is_some()) {
            (true, false) => self.next_probe = Some(at + self.probe_period),
            (false, true) => self.next_probe = None,
            _ => {}
        }
        match (phase == GesturePhase::Momentum, self.next_tick.is_some()) {
            (true, false) => self.next_tick = Some(at + self.tick_period),
            (false, true) => self.next_tick = None,
            _ => {}
        }
    }

    fn next_due(&self) -> Option<(Timer, Timestamp)> {
        match (self.next_probe, self.next_tick) {
            (Some(p), Some(t)) if t < p => Some((Timer::Tick, t)),
            (Some(p), _) => Some((Timer::Probe, p)),
            (None, Some(t)) => Some((Timer::Tick, t)),
            (None, None) => None,
        }
    }

    fn fire(&mut self, timer: Timer, at: Timestamp) {
        self.now = at;
        match timer {
            Timer::Probe => {
                self.next_probe = Some(at + self.probe_period);
                self.engine.on_pause_probe(at);
                self.collect(at, DeltaOrigin::Drag);
            }
            Timer::Tick => {
                self.next_tick = Some(at + self.tick_period);
                self.engine.on_momentum_tick(at);
                self.collect(at, DeltaOrigin::Momentum);
            }
        }
        self.sync_timers(at);
    }

    /// Fire timers strictly before `until`.
    fn run_until(&mut self, until: Timestamp) {
        while let Some((timer, at)) = self.next_due() {
            if !until.is_after(at) {
                break;
            }
            self.fire(timer, at);
        }
    }

    /// A probe can only act while the last significant move is inside the
    /// pause window.
    fn probe_can_still_launch(&self, at: Timestamp) -> bool {
        match self.engine.session().last_significant_move {
            Some(reference) => at.seconds_since(reference) < self.engine.tuning().pause.max_secs,
            None => false,
        }
    }
}

impl TracePlayer {
    pub fn new(tuning: Tuning) -> crate::Result<Self> {
        tuning.validate()?;
        Ok(Self { tuning })
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn play(&self, trace: &Trace) -> crate::Result<Playback> {
        let emitter = RecordingEmitter::new();
        let mut run = Run {
            engine: GestureEngine::new(self.tuning.clone(), emitter.clone()),
            emitter,
            probe_period: self.tuning.pause_probe_period(),
            tick_period: self.tuning.momentum_tick_period(),
            next_probe: None,
            next_tick: None,
            deltas: Vec::new(),
            now: trace.first_timestamp().unwrap_or_default(),
        };

        for event in &trace.events {
            let at = event.timestamp();
            if run.now.is_after(at) {
                return Err(crate::Error::Trace(format!(
                    "event at {}ns precedes virtual time {}ns",
                    at.as_nanos(),
                    run.now.as_nanos()
                )));
            }
            run.run_until(at);
            run.now = at;
            run.engine.handle(event);
            run.collect(at, DeltaOrigin::Drag);
            run.sync_timers(at);
        }

        let mut firings = 0;
        while let Some((timer, at)) = run.next_due() {
            if run.next_tick.is_none() && !run.probe_can_still_launch(at) {
                break;
            }
            firings += 1;
            if firings > MAX_SETTLE_FIRINGS {
                return Err(crate::Error::Trace(
                    "playback did not settle after the last event".into(),
                ));
            }
            run.fire(timer, at);
        }

        debug!(
            events = trace.len(),
            deltas = run.deltas.len(),
            settle_firings = firings,
            "trace playback finished"
        );
        Ok(Playback {
            stats: run.engine.stats(),
            final_phase: run.engine.phase(),
            ended_at: run.now,
            deltas: run.deltas,
        })
    }
}
