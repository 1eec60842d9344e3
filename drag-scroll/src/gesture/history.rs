//! Recent pointer displacements used for velocity estimation.

use crate::time::Timestamp;
use std::collections::VecDeque;

/// One observed pointer displacement since the previous sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub dx: f64,
    pub dy: f64,
    pub timestamp: Timestamp,
}

impl Sample {
    pub fn new(dx: f64, dy: f64, timestamp: Timestamp) -> Self {
        Self { dx, dy, timestamp }
    }
}

/// Fixed-capacity FIFO of samples; pushing into a full buffer evicts the oldest.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SampleHistory {
    /// A capacity of zero is bumped to one so the buffer can always hold the
    /// latest sample.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: Sample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Change capacity, evicting the oldest samples if shrinking.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}
