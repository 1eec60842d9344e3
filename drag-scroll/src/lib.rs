//! # Drag Scroll
//!
//! Hold a modifier key, move the pointer, and the content under it scrolls.
//! Release the key (or stop moving) and the content keeps gliding with
//! decaying momentum.
//!
//! ## Overview
//!
//! The gesture core is a clock-free state machine: pointer samples and key
//! transitions go in with explicit timestamps, smoothed scroll deltas come out
//! through a [`ScrollEmitter`]. Two periodic timers drive it between events:
//! a pause probe while dragging and a momentum ticker while gliding.
//!
//! ## Quick Start
//!
//! ```no_run
//! use drag_scroll::gesture::{GestureEngine, Tuning};
//! use drag_scroll::output::RecordingEmitter;
//! use drag_scroll::time::Timestamp;
//!
//! let emitter = RecordingEmitter::new();
//! let mut engine = GestureEngine::new(Tuning::default(), emitter.clone());
//!
//! engine.on_trigger(true, Timestamp::from_millis(0));
//! engine.on_pointer(100.0, 100.0, Timestamp::from_millis(8));
//! engine.on_pointer(110.0, 100.0, Timestamp::from_millis(16));
//! engine.on_trigger(false, Timestamp::from_millis(24));
//!
//! // The glide is driven by ticks
//! engine.on_momentum_tick(Timestamp::from_millis(32));
//! println!("{:?}", emitter.total());
//! ```
//!
//! ## Architecture
//!
//! - [`time`]: Monotonic timestamps (mach_absolute_time on macOS)
//! - [`gesture`]: Velocity estimation, pause detection, momentum, state machine
//! - [`capture`]: Lock-free event queue and the Quartz event tap
//! - [`output`]: Scroll emitters, Quartz scroll-wheel injection
//! - [`runtime`]: Periodic scheduler and the live controller
//! - [`replay`]: Trace recording and offline playback
//! - [`app`]: CLI and configuration management
//!
//! ## Event Pipeline
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  CGEventTap │───▶│ Event Queue │───▶│ Dispatcher  │───▶│   Gesture   │
//! │  (capture)  │    │ (lock-free) │    │   thread    │    │   Engine    │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//!                                                            ▲         │
//!                                       ┌─────────────┐      │         ▼
//!                                       │ Pause probe │──────┤  ┌─────────────┐
//!                                       │  Momentum   │──────┘  │  CGEvent    │
//!                                       │   ticker    │         │ scroll-wheel│
//!                                       └─────────────┘         └─────────────┘
//! ```
//!
//! ## Permissions
//!
//! Capture and injection require Accessibility permissions on macOS:
//! System Settings → Privacy & Security → Accessibility

pub mod time;
pub mod capture;
pub mod gesture;
pub mod output;
pub mod runtime;
pub mod replay;
pub mod app;

// Re-export commonly used types
pub use capture::types::{InputEvent, TriggerKey};
pub use gesture::{GestureEngine, GesturePhase, Tuning};
pub use output::{RecordingEmitter, ScrollEmitter};
pub use replay::{Trace, TracePlayer};
pub use runtime::{ManualScheduler, ScrollController, ThreadScheduler};
pub use time::timebase::{Timebase, Timestamp};

/// Result type alias for drag-scroll
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for drag-scroll
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Event capture error: {0}")]
    Capture(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not available on this platform: {0}")]
    Unavailable(String),

    #[error("Scroll emit error: {0}")]
    Emit(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Trace error: {0}")]
    Trace(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
