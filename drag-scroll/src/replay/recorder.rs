//! Capture input from a live source into a [`Trace`].

use super::trace::Trace;
use crate::capture::event_queue::event_queue;
use crate::capture::source::EventSource;
use crate::capture::types::TriggerKey;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Options for [`record`].
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub name: String,
    pub trigger: TriggerKey,
    /// Stop after this long; `None` records until `stop` is raised
    pub duration: Option<Duration>,
    pub queue_capacity: usize,
}

/// Record events from `source` until the duration passes or `stop` is set.
///
/// Runs on the calling thread, which parks between events.
pub fn record(
    source: &mut dyn EventSource,
    options: &RecordOptions,
    stop: &Arc<AtomicBool>,
) -> crate::Result<Trace> {
    let (mut producer, mut consumer) = event_queue(options.queue_capacity)?;
    producer.set_waker(thread::current());
    let stats = producer.stats();
    source.start(producer)?;
    info!(source = source.name(), "recording started");

    let mut trace = Trace::new(options.name.clone(), options.trigger);
    let deadline = options.duration.map(|d| Instant::now() + d);
    let mut rejected = 0usize;

    loop {
        for event in consumer.pop_batch(256) {
            if trace.push(event).is_err() {
                rejected += 1;
            }
        }
        if stop.load(Ordering::Acquire) {
            break;
        }
        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                POLL_INTERVAL.min(deadline - now)
            }
            None => POLL_INTERVAL,
        };
        consumer.wait(wait);
    }

    source.stop();
    for event in consumer.pop_batch(usize::MAX) {
        if trace.push(event).is_err() {
            rejected += 1;
        }
    }
    trace.finalize();

    let dropped = stats.snapshot().dropped;
    if dropped > 0 || rejected > 0 {
        warn!(dropped, rejected, "some events were not recorded");
    }
    info!(events = trace.len(), "recording finished");
    Ok(trace)
}
