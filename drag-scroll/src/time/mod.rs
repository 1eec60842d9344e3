//! Monotonic timing
//!
//! Pointer samples, pause probes and momentum ticks all compare instants on
//! the same clock, so every timestamp in the crate is a [`Timestamp`].

pub mod timebase;

pub use timebase::{Timebase, Timestamp};
