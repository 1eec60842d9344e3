//! Scroll emitter boundary.
//!
//! The gesture engine hands every scroll it decides on to a [`ScrollEmitter`].
//! Deltas arrive already multiplied by the sensitivity setting and are
//! expressed in pointer space: positive `dy` means the pointer moved down, so
//! content should follow it down.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sink for synthetic scroll deltas.
pub trait ScrollEmitter: Send {
    /// Deliver one scroll delta.
    fn emit(&mut self, dx: f64, dy: f64) -> crate::Result<()>;

    /// Short name for logs.
    fn name(&self) -> &'static str {
        "scroll-emitter"
    }
}

impl<T: ScrollEmitter + ?Sized> ScrollEmitter for Box<T> {
    fn emit(&mut self, dx: f64, dy: f64) -> crate::Result<()> {
        (**self).emit(dx, dy)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// One delivered delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmittedDelta {
    pub dx: f64,
    pub dy: f64,
}

/// Emitter that appends every delta to a shared log.
///
/// Clones share the same log, so a host can keep one handle while the engine
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingEmitter {
    log: Arc<Mutex<Vec<EmittedDelta>>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all deltas so far.
    pub fn deltas(&self) -> Vec<EmittedDelta> {
        self.log.lock().clone()
    }

    /// Remove and return all deltas so far.
    pub fn take(&self) -> Vec<EmittedDelta> {
        std::mem::take(&mut *self.log.lock())
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    /// Sum of all deltas per axis.
    pub fn total(&self) -> (f64, f64) {
        self.log
            .lock()
            .iter()
            .fold((0.0, 0.0), |(x, y), d| (x + d.dx, y + d.dy))
    }
}

impl ScrollEmitter for RecordingEmitter {
    fn emit(&mut self, dx: f64, dy: f64) -> crate::Result<()> {
        self.log.lock().push(EmittedDelta { dx, dy });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Emitter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEmitter;

impl ScrollEmitter for NullEmitter {
    fn emit(&mut self, _dx: f64, _dy: f64) -> crate::Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_emitter_shares_log_between_clones() {
        let handle = RecordingEmitter::new();
        let mut owned = handle.clone();
        owned.emit(1.0, 2.0).unwrap();
        owned.emit(-0.5, 0.0).unwrap();

        assert_eq!(handle.len(), 2);
        assert_eq!(handle.deltas()[0], EmittedDelta { dx: 1.0, dy: 2.0 });
        assert_eq!(handle.total(), (0.5, 2.0));
    }

    #[test]
    fn test_take_drains() {
        let handle = RecordingEmitter::new();
        let mut owned = handle.clone();
        owned.emit(1.0, 1.0).unwrap();
        assert_eq!(handle.take().len(), 1);
        assert!(handle.is_empty());
    }

    #[test]
    fn test_boxed_emitter_forwards() {
        let handle = RecordingEmitter::new();
        let mut boxed: Box<dyn ScrollEmitter> = Box::new(handle.clone());
        boxed.emit(3.0, 4.0).unwrap();
        assert_eq!(boxed.name(), "recording");
        assert_eq!(handle.len(), 1);
    }

    #[test]
    fn test_null_emitter_accepts_everything() {
        let mut null = NullEmitter;
        assert!(null.emit(f64::NAN, 1e9).is_ok());
    }
}
