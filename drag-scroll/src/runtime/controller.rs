//! Scroll controller
//!
//! Owns the gesture engine behind a single mutex and wires it to the outside
//! world: an [`EventSource`] feeds a lock-free queue, a dispatcher thread
//! drains it into the engine, and two periodic timers (pause probe and
//! momentum ticker) are started and cancelled as the phase changes.
//!
//! Lock order: the engine lock may be held while scheduling or cancelling a
//! timer, never while joining a thread.

use super::scheduler::{CancellationToken, Scheduler};
use crate::capture::event_queue::{event_queue, EventConsumer, QueueSnapshot, QueueStats, DEFAULT_CAPACITY};
use crate::capture::source::EventSource;
use crate::capture::types::InputEvent;
use crate::gesture::{EngineStats, EngineStatus, GestureEngine, GesturePhase, Tuning};
use crate::output::ScrollEmitter;
use crate::time::Timestamp;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Scheduler task name of the pause probe.
pub const PAUSE_PROBE_TASK: &str = "pause-probe";
/// Scheduler task name of the momentum ticker.
pub const MOMENTUM_TASK: &str = "momentum";

const DISPATCH_BATCH: usize = 64;
const DISPATCH_IDLE_WAIT: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    PauseProbe,
    Momentum,
}

impl TimerKind {
    fn task_name(self) -> &'static str {
        match self {
            TimerKind::PauseProbe => PAUSE_PROBE_TASK,
            TimerKind::Momentum => MOMENTUM_TASK,
        }
    }
}

struct Core<E: ScrollEmitter> {
    engine: GestureEngine<E>,
    probe: Option<CancellationToken>,
    ticker: Option<CancellationToken>,
    closing: bool,
    timer_failure_logged: bool,
}

impl<E: ScrollEmitter> Core<E> {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<CancellationToken> {
        match kind {
            TimerKind::PauseProbe => &mut self.probe,
            TimerKind::Momentum => &mut self.ticker,
        }
    }

    fn cancel_timers(&mut self) {
        for token in [self.probe.take(), self.ticker.take()].into_iter().flatten() {
            token.cancel();
        }
    }
}

struct Shared<E: ScrollEmitter> {
    core: Mutex<Core<E>>,
    scheduler: Arc<dyn Scheduler>,
}

impl<E: ScrollEmitter + 'static> Shared<E> {
    fn dispatch(self: &Arc<Self>, event: &InputEvent) -> GesturePhase {
        let mut core = self.core.lock();
        if core.closing {
            return core.engine.phase();
        }
        let phase = core.engine.handle(event);
        self.sync_timers(&mut core);
        phase
    }

    /// Make the running timers match the phase: the probe runs exactly while
    /// dragging and the ticker exactly while gliding.
    fn sync_timers(self: &Arc<Self>, core: &mut Core<E>) {
        let phase = core.engine.phase();
        for (kind, wanted) in [
            (TimerKind::PauseProbe, phase == GesturePhase::Dragging),
            (TimerKind::Momentum, phase == GesturePhase::Momentum),
        ] {
            let running = core.slot(kind).is_some();
            if wanted && !running && !core.closing {
                let period = match kind {
                    TimerKind::PauseProbe => core.engine.tuning().pause_probe_period(),
                    TimerKind::Momentum => core.engine.tuning().momentum_tick_period(),
                };
                match self.schedule(kind, period) {
                    Ok(token) => {
                        trace!(task = kind.task_name(), "timer started");
                        *core.slot(kind) = Some(token);
                    }
                    Err(e) => {
                        if !core.timer_failure_logged {
                            warn!(task = kind.task_name(), error = %e, "failed to start timer");
                            core.timer_failure_logged = true;
                        }
                    }
                }
            } else if !wanted && running {
                if let Some(token) = core.slot(kind).take() {
                    token.cancel();
                    trace!(task = kind.task_name(), "timer cancelled");
                }
            }
        }
    }

    fn schedule(self: &Arc<Self>, kind: TimerKind, period: Duration) -> crate::Result<CancellationToken> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let own: Arc<OnceLock<CancellationToken>> = Arc::new(OnceLock::new());
        let task_token = Arc::clone(&own);

        let token = self.scheduler.schedule_periodic(
            kind.task_name(),
            period,
            Box::new(move |now: Timestamp| {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                let mut core = shared.core.lock();
                // The caller holds the lock until the token is published, so
                // an unset token here means the schedule call failed
                match task_token.get() {
                    Some(token) if !token.is_cancelled() => {}
                    _ => return,
                }
                match kind {
                    TimerKind::PauseProbe => core.engine.on_pause_probe(now),
                    TimerKind::Momentum => core.engine.on_momentum_tick(now),
                };
                shared.sync_timers(&mut core);
            }),
        )?;
        let _ = own.set(token.clone());
        Ok(token)
    }
}

struct Dispatcher {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
    stats: Arc<QueueStats>,
}

/// Live drag-to-scroll service.
pub struct ScrollController<E: ScrollEmitter + 'static> {
    shared: Arc<Shared<E>>,
    source: Option<Box<dyn EventSource>>,
    dispatcher: Option<Dispatcher>,
    queue_capacity: usize,
    shut_down: bool,
}

impl<E: ScrollEmitter + 'static> ScrollController<E> {
    pub fn new(tuning: Tuning, emitter: E, scheduler: Arc<dyn Scheduler>) -> crate::Result<Self> {
        tuning.validate()?;
        let core = Core {
            engine: GestureEngine::new(tuning, emitter),
            probe: None,
            ticker: None,
            closing: false,
            timer_failure_logged: false,
        };
        Ok(Self {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                scheduler,
            }),
            source: None,
            dispatcher: None,
            queue_capacity: DEFAULT_CAPACITY,
            shut_down: false,
        })
    }

    /// Capacity of the event queue created by [`ScrollController::start`].
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Connect `source` and begin dispatching its events.
    pub fn start(&mut self, mut source: Box<dyn EventSource>) -> crate::Result<()> {
        if self.shut_down {
            return Err(crate::Error::Capture("controller has been shut down".into()));
        }
        if self.dispatcher.is_some() {
            return Err(crate::Error::Capture("controller already started".into()));
        }

        let (mut producer, consumer) = event_queue(self.queue_capacity)?;
        let dispatcher = self.spawn_dispatcher(consumer)?;
        producer.set_waker(dispatcher.handle.thread().clone());

        if let Err(e) = source.start(producer) {
            Self::stop_dispatcher(dispatcher);
            return Err(e);
        }

        info!(
            source = source.name(),
            queue_capacity = self.queue_capacity,
            "scroll controller started"
        );
        self.source = Some(source);
        self.dispatcher = Some(dispatcher);
        Ok(())
    }

    fn spawn_dispatcher(&self, mut consumer: EventConsumer) -> crate::Result<Dispatcher> {
        let stop = Arc::new(AtomicBool::new(false));
        let stats = consumer.stats();
        let shared = Arc::clone(&self.shared);
        let thread_stop = Arc::clone(&stop);
        let thread_stats = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name("gesture-dispatch".into())
            .spawn(move || {
                let mut dropped_seen = 0;
                while !thread_stop.load(Ordering::Acquire) {
                    let batch = consumer.pop_batch(DISPATCH_BATCH);
                    if batch.is_empty() {
                        consumer.wait(DISPATCH_IDLE_WAIT);
                        continue;
                    }
                    for event in &batch {
                        shared.dispatch(event);
                    }
                    let dropped = thread_stats.events_dropped.load(Ordering::Relaxed);
                    if dropped > dropped_seen {
                        warn!(dropped, "event queue overflowed; input was lost");
                        dropped_seen = dropped;
                    }
                }
                debug!("dispatcher exiting");
            })
            .map_err(|e| crate::Error::Capture(format!("failed to spawn dispatcher: {}", e)))?;

        Ok(Dispatcher {
            handle,
            stop,
            stats,
        })
    }

    fn stop_dispatcher(dispatcher: Dispatcher) {
        dispatcher.stop.store(true, Ordering::Release);
        dispatcher.handle.thread().unpark();
        if dispatcher.handle.join().is_err() {
            warn!("dispatcher thread panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.dispatcher.is_some()
    }

    /// Feed one event directly, bypassing the queue. Ignored after shutdown.
    pub fn handle_event(&self, event: &InputEvent) -> GesturePhase {
        self.shared.dispatch(event)
    }

    pub fn set_enabled(&self, enabled: bool) -> GesturePhase {
        let mut core = self.shared.core.lock();
        let phase = core.engine.set_enabled(enabled);
        self.shared.sync_timers(&mut core);
        info!(enabled, "drag scrolling enable flag changed");
        phase
    }

    pub fn set_sensitivity(&self, sensitivity: f64) -> crate::Result<()> {
        self.update_tuning(|t| t.sensitivity = sensitivity)
    }

    pub fn set_momentum_strength(&self, strength: f64) -> crate::Result<()> {
        self.update_tuning(|t| t.momentum_strength = strength)
    }

    pub fn set_deceleration(&self, deceleration: f64) -> crate::Result<()> {
        self.update_tuning(|t| t.deceleration = deceleration)
    }

    /// Replace the whole tuning. Running timers restart at the new rates.
    pub fn set_tuning(&self, tuning: Tuning) -> crate::Result<()> {
        self.update_tuning(move |t| *t = tuning)
    }

    fn update_tuning(&self, edit: impl FnOnce(&mut Tuning)) -> crate::Result<()> {
        let mut core = self.shared.core.lock();
        let before = core.engine.tuning().clone();
        core.engine.update_tuning(edit)?;
        let after = core.engine.tuning();
        if before.pause_probe_period() != after.pause_probe_period()
            || before.momentum_tick_period() != after.momentum_tick_period()
        {
            core.cancel_timers();
        }
        self.shared.sync_timers(&mut core);
        Ok(())
    }

    pub fn status(&self) -> EngineStatus {
        self.shared.core.lock().engine.status()
    }

    pub fn stats(&self) -> EngineStats {
        self.shared.core.lock().engine.stats()
    }

    pub fn phase(&self) -> GesturePhase {
        self.shared.core.lock().engine.phase()
    }

    pub fn tuning(&self) -> Tuning {
        self.shared.core.lock().engine.tuning().clone()
    }

    pub fn queue_stats(&self) -> Option<QueueSnapshot> {
        self.dispatcher.as_ref().map(|d| d.stats.snapshot())
    }

    /// Which timers are currently scheduled: (pause probe, momentum).
    pub fn timers_active(&self) -> (bool, bool) {
        let core = self.shared.core.lock();
        (core.probe.is_some(), core.ticker.is_some())
    }

    /// Stop the source, cancel both timers and join every worker thread.
    /// Idempotent; also run on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if let Some(mut source) = self.source.take() {
            source.stop();
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            Self::stop_dispatcher(dispatcher);
        }
        let stats = {
            let mut core = self.shared.core.lock();
            core.closing = true;
            core.cancel_timers();
            core.engine.reset();
            core.engine.stats()
        };
        self.shared.scheduler.shutdown();
        info!(?stats, "scroll controller stopped");
    }
}

impl<E: ScrollEmitter + 'static> Drop for ScrollController<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
