//! Lock-free input queue
//!
//! SPSC ring buffer between the platform callback (producer) and the
//! dispatcher thread (consumer). The producer never blocks: when the queue is
//! full the event is dropped and counted. After every push the producer
//! unparks the registered waker thread so the dispatcher can sleep while idle.

use super::types::InputEvent;
use rtrb::{Consumer, Producer, RingBuffer};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::Duration;

/// Default queue capacity (must be power of 2)
pub const DEFAULT_CAPACITY: usize = 1024;

/// Queue counters shared by both halves.
#[derive(Debug, Default)]
pub struct QueueStats {
    pub events_pushed: AtomicU64,
    pub events_dropped: AtomicU64,
    pub events_consumed: AtomicU64,
    pub peak_occupancy: AtomicU64,
}

/// Plain copy of [`QueueStats`] for logging and display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub pushed: u64,
    pub dropped: u64,
    pub consumed: u64,
    pub peak: u64,
}

impl QueueStats {
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            pushed: self.events_pushed.load(Ordering::Relaxed),
            dropped: self.events_dropped.load(Ordering::Relaxed),
            consumed: self.events_consumed.load(Ordering::Relaxed),
            peak: self.peak_occupancy.load(Ordering::Relaxed),
        }
    }

    fn record_occupancy(&self, occupied: u64) {
        let mut peak = self.peak_occupancy.load(Ordering::Relaxed);
        while occupied > peak {
            match self.peak_occupancy.compare_exchange_weak(
                peak,
                occupied,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }
}

/// Create a connected producer/consumer pair.
///
/// `capacity` must be a non-zero power of two.
pub fn event_queue(capacity: usize) -> crate::Result<(EventProducer, EventConsumer)> {
    if !capacity.is_power_of_two() {
        return Err(crate::Error::Config(format!(
            "event queue capacity must be a power of 2, got {}",
            capacity
        )));
    }
    let (producer, consumer) = RingBuffer::new(capacity);
    let stats = Arc::new(QueueStats::default());
    Ok((
        EventProducer {
            inner: producer,
            stats: Arc::clone(&stats),
            capacity,
            waker: None,
        },
        EventConsumer {
            inner: consumer,
            stats,
        },
    ))
}

/// Producer half, owned by the capture callback.
pub struct EventProducer {
    inner: Producer<InputEvent>,
    stats: Arc<QueueStats>,
    capacity: usize,
    waker: Option<Thread>,
}

impl EventProducer {
    /// Thread to unpark after each successful push.
    pub fn set_waker(&mut self, thread: Thread) {
        self.waker = Some(thread);
    }

    /// Push an event. Never blocks; returns false if the event was dropped.
    #[inline]
    pub fn push(&mut self, event: InputEvent) -> bool {
        match self.inner.push(event) {
            Ok(()) => {
                self.stats.events_pushed.fetch_add(1, Ordering::Relaxed);
                let occupied = self.capacity - self.inner.slots();
                self.stats.record_occupancy(occupied as u64);
                if let Some(waker) = &self.waker {
                    waker.unpark();
                }
                true
            }
            Err(_) => {
                self.stats.events_dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

/// Consumer half, owned by the dispatcher.
pub struct EventConsumer {
    inner: Consumer<InputEvent>,
    stats: Arc<QueueStats>,
}

impl EventConsumer {
    #[inline]
    pub fn pop(&mut self) -> Option<InputEvent> {
        let event = self.inner.pop().ok()?;
        self.stats.events_consumed.fetch_add(1, Ordering::Relaxed);
        Some(event)
    }

    /// Pop up to `max_count` events, oldest first.
    pub fn pop_batch(&mut self, max_count: usize) -> Vec<InputEvent> {
        let mut batch = Vec::with_capacity(max_count.min(self.available()));
        while batch.len() < max_count {
            match self.pop() {
                Some(event) => batch.push(event),
                None => break,
            }
        }
        batch
    }

    /// Park the calling thread until an event arrives or `timeout` passes.
    ///
    /// Only useful on the thread registered with [`EventProducer::set_waker`].
    /// Spurious wakeups are possible; callers loop.
    pub fn wait(&self, timeout: Duration) {
        if self.inner.is_empty() {
            thread::park_timeout(timeout);
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.inner.slots()
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}
