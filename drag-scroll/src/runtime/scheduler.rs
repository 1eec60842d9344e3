//! Periodic task scheduling
//!
//! The gesture engine needs two timers, a pause probe and a momentum ticker,
//! each started and stopped as the phase changes. A [`Scheduler`] runs a task
//! at a fixed period until its [`CancellationToken`] is cancelled.
//!
//! Cancelling only raises a flag and wakes the timer; it never joins, so it is
//! safe to cancel from inside a task or while holding the engine lock.
//! [`Scheduler::shutdown`] is the only call that joins threads.

use crate::time::Timestamp;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// A task run once per period with the time it fired.
pub type PeriodicTask = Box<dyn FnMut(Timestamp) + Send + 'static>;

/// Cloneable cancellation flag shared between a timer and its owner.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    notify: Condvar,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake any waiter. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        let _guard = self.inner.lock.lock();
        self.inner.notify.notify_all();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Block until cancelled or `timeout` elapses. Returns true if cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock.lock();
        while !self.is_cancelled() {
            if self.inner.notify.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        self.is_cancelled()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Runs periodic tasks.
pub trait Scheduler: Send + Sync {
    /// Run `task` every `period` until the returned token is cancelled.
    fn schedule_periodic(
        &self,
        name: &str,
        period: Duration,
        task: PeriodicTask,
    ) -> crate::Result<CancellationToken>;

    /// Cancel every task and wait for them to finish. Further scheduling fails.
    fn shutdown(&self);
}

fn check_period(name: &str, period: Duration) -> crate::Result<()> {
    if period.is_zero() {
        return Err(crate::Error::Scheduler(format!(
            "task '{}' needs a non-zero period",
            name
        )));
    }
    Ok(())
}

struct TimerThread {
    name: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// One named OS thread per task, sleeping on its token between firings.
#[derive(Default)]
pub struct ThreadScheduler {
    timers: Mutex<Vec<TimerThread>>,
    closed: AtomicBool,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks whose thread is still running.
    pub fn active_count(&self) -> usize {
        self.timers
            .lock()
            .iter()
            .filter(|t| !t.handle.is_finished())
            .count()
    }

    fn run_timer(name: &str, period: Duration, token: CancellationToken, mut task: PeriodicTask) {
        trace!(task = name, ?period, "timer thread started");
        let mut next = Instant::now() + period;
        loop {
            let wait = next.saturating_duration_since(Instant::now());
            if token.wait_timeout(wait) {
                break;
            }
            task(Timestamp::now());
            next += period;
            let now = Instant::now();
            if next < now {
                // Fell behind; skip missed firings rather than bursting
                next = now + period;
            }
        }
        trace!(task = name, "timer thread exiting");
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule_periodic(
        &self,
        name: &str,
        period: Duration,
        task: PeriodicTask,
    ) -> crate::Result<CancellationToken> {
        check_period(name, period)?;
        let mut timers = self.timers.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(crate::Error::Scheduler("scheduler is shut down".into()));
        }

        // Reap timers whose token was cancelled and whose thread has exited
        let (finished, running): (Vec<_>, Vec<_>) =
            timers.drain(..).partition(|t| t.handle.is_finished());
        *timers = running;
        for timer in finished {
            let _ = timer.handle.join();
        }

        let token = CancellationToken::new();
        let thread_token = token.clone();
        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(format!("timer-{}", name))
            .spawn(move || Self::run_timer(&thread_name, period, thread_token, task))
            .map_err(|e| {
                crate::Error::Scheduler(format!("failed to spawn timer '{}': {}", name, e))
            })?;

        timers.push(TimerThread {
            name: name.to_string(),
            token: token.clone(),
            handle,
        });
        Ok(token)
    }

    fn shutdown(&self) {
        let timers = {
            let mut timers = self.timers.lock();
            self.closed.store(true, Ordering::Release);
            std::mem::take(&mut *timers)
        };
        for timer in &timers {
            timer.token.cancel();
        }
        let current = thread::current().id();
        for timer in timers {
            if timer.handle.thread().id() == current {
                continue;
            }
            if timer.handle.join().is_err() {
                warn!(task = %timer.name, "timer thread panicked");
            }
        }
        debug!("thread scheduler shut down");
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct ManualEntry {
    name: String,
    period: Duration,
    next_due: Timestamp,
    token: CancellationToken,
    task: Arc<Mutex<PeriodicTask>>,
}

#[derive(Default)]
struct ManualState {
    now: Timestamp,
    entries: Vec<ManualEntry>,
    closed: bool,
}

/// Scheduler driven by an explicit virtual clock.
///
/// Nothing fires until [`ManualScheduler::advance_to`] or
/// [`ManualScheduler::fire`] is called. Tasks run on the caller's thread
/// without the scheduler lock held, so they may schedule or cancel other
/// tasks.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Timestamp {
        self.state.lock().now
    }

    /// Live (not cancelled) tasks with this name.
    pub fn is_active(&self, name: &str) -> bool {
        self.state
            .lock()
            .entries
            .iter()
            .any(|e| e.name == name && !e.token.is_cancelled())
    }

    pub fn active_count(&self) -> usize {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|e| !e.token.is_cancelled())
            .count()
    }

    /// Move the clock forward to `target`, firing every due task at its due
    /// time in chronological order. Returns the number of firings.
    pub fn advance_to(&self, target: Timestamp) -> usize {
        let mut fired = 0;
        loop {
            let due = {
                let mut state = self.state.lock();
                state.entries.retain(|e| !e.token.is_cancelled());
                let next = state
                    .entries
                    .iter_mut()
                    .filter(|e| e.next_due <= target)
                    .min_by_key(|e| e.next_due);
                match next {
                    Some(entry) => {
                        let at = entry.next_due;
                        entry.next_due = at + entry.period;
                        let job = (at, entry.token.clone(), Arc::clone(&entry.task));
                        state.now = at;
                        Some(job)
                    }
                    None => {
                        if target.is_after(state.now) {
                            state.now = target;
                        }
                        None
                    }
                }
            };
            let Some((at, token, task)) = due else {
                return fired;
            };
            if !token.is_cancelled() {
                let mut task = task.lock();
                (*task)(at);
                fired += 1;
            }
        }
    }

    /// Advance the clock by `by`. See [`ManualScheduler::advance_to`].
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        self.advance_to(target)
    }

    /// Fire every live task named `name` once, at the current time, without
    /// moving the clock or their schedule.
    pub fn fire(&self, name: &str) -> usize {
        let (now, jobs): (Timestamp, Vec<_>) = {
            let state = self.state.lock();
            let jobs = state
                .entries
                .iter()
                .filter(|e| e.name == name && !e.token.is_cancelled())
                .map(|e| (e.token.clone(), Arc::clone(&e.task)))
                .collect();
            (state.now, jobs)
        };
        let mut fired = 0;
        for (token, task) in jobs {
            if !token.is_cancelled() {
                let mut task = task.lock();
                (*task)(now);
                fired += 1;
            }
        }
        fired
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_periodic(
        &self,
        name: &str,
        period: Duration,
        task: PeriodicTask,
    ) -> crate::Result<CancellationToken> {
        check_period(name, period)?;
        let mut state = self.state.lock();
        if state.closed {
            return Err(crate::Error::Scheduler("scheduler is shut down".into()));
        }
        let token = CancellationToken::new();
        let next_due = state.now + period;
        state.entries.push(ManualEntry {
            name: name.to_string(),
            period,
            next_due,
            token: token.clone(),
            task: Arc::new(Mutex::new(task)),
        });
        Ok(token)
    }

    fn shutdown(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        for entry in state.entries.drain(..) {
            entry.token.cancel();
        }
    }
}
