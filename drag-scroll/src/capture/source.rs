//! Input sources
//!
//! An [`EventSource`] owns whatever platform hook produces input and pushes
//! [`InputEvent`]s into the producer half of the event queue. The live
//! source is the macOS event tap; [`ManualSource`] lets tests and tools feed
//! events by hand through the same path.

use super::event_queue::EventProducer;
use super::types::{InputEvent, TriggerKey};
use parking_lot::Mutex;
use std::sync::Arc;

/// Producer of input events.
pub trait EventSource: Send {
    /// Begin delivering events into `producer`.
    fn start(&mut self, producer: EventProducer) -> crate::Result<()>;

    /// Stop delivering events. Idempotent.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    fn name(&self) -> &'static str {
        "event-source"
    }
}

impl<T: EventSource + ?Sized> EventSource for Box<T> {
    fn start(&mut self, producer: EventProducer) -> crate::Result<()> {
        (**self).start(producer)
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Source driven by [`ManualSourceHandle::send`].
pub struct ManualSource {
    slot: Arc<Mutex<Option<EventProducer>>>,
}

/// Sending side of a [`ManualSource`]. Cloneable.
#[derive(Clone)]
pub struct ManualSourceHandle {
    slot: Arc<Mutex<Option<EventProducer>>>,
}

impl ManualSource {
    pub fn new() -> (Self, ManualSourceHandle) {
        let slot = Arc::new(Mutex::new(None));
        (
            Self {
                slot: Arc::clone(&slot),
            },
            ManualSourceHandle { slot },
        )
    }
}

impl EventSource for ManualSource {
    fn start(&mut self, producer: EventProducer) -> crate::Result<()> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(crate::Error::Capture("manual source already running".into()));
        }
        *slot = Some(producer);
        Ok(())
    }

    fn stop(&mut self) {
        self.slot.lock().take();
    }

    fn is_running(&self) -> bool {
        self.slot.lock().is_some()
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

impl ManualSourceHandle {
    /// Push one event. Returns false if the source is stopped or the queue
    /// is full.
    pub fn send(&self, event: InputEvent) -> bool {
        match self.slot.lock().as_mut() {
            Some(producer) => producer.push(event),
            None => false,
        }
    }
}

/// The live input source for this platform.
#[cfg(target_os = "macos")]
pub fn platform_event_source(trigger: TriggerKey) -> crate::Result<Box<dyn EventSource>> {
    Ok(Box::new(super::event_tap::EventTap::new(trigger)?))
}

/// The live input source for this platform.
#[cfg(not(target_os = "macos"))]
pub fn platform_event_source(_trigger: TriggerKey) -> crate::Result<Box<dyn EventSource>> {
    Err(crate::Error::Unavailable(
        "global input capture is only implemented for macOS".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::event_queue::event_queue;
    use crate::time::Timestamp;

    #[test]
    fn test_manual_source_delivers_after_start() {
        let (mut source, handle) = ManualSource::new();
        let (producer, mut consumer) = event_queue(8).unwrap();

        assert!(!handle.send(InputEvent::trigger_down(Timestamp::from_millis(1))));
        source.start(producer).unwrap();
        assert!(source.is_running());
        assert!(handle.send(InputEvent::trigger_down(Timestamp::from_millis(2))));
        assert_eq!(
            consumer.pop(),
            Some(InputEvent::trigger_down(Timestamp::from_millis(2)))
        );
    }

    #[test]
    fn test_manual_source_stop_detaches_producer() {
        let (mut source, handle) = ManualSource::new();
        let (producer, _consumer) = event_queue(8).unwrap();
        source.start(producer).unwrap();
        source.stop();
        source.stop();
        assert!(!source.is_running());
        assert!(!handle.send(InputEvent::pointer(0.0, 0.0, Timestamp::from_millis(3))));
    }

    #[test]
    fn test_manual_source_rejects_double_start() {
        let (mut source, _handle) = ManualSource::new();
        let (first, _c1) = event_queue(8).unwrap();
        let (second, _c2) = event_queue(8).unwrap();
        source.start(first).unwrap();
        assert!(source.start(second).is_err());
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_platform_source_unavailable_off_macos() {
        assert!(matches!(
            platform_event_source(TriggerKey::Option),
            Err(crate::Error::Unavailable(_))
        ));
    }
}
