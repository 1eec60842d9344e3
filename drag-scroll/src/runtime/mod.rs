//! Live runtime: timers and the controller that ties capture, engine and
//! output together.

pub mod scheduler;
pub mod controller;

pub use controller::{ScrollController, MOMENTUM_TASK, PAUSE_PROBE_TASK};
pub use scheduler::{CancellationToken, ManualScheduler, PeriodicTask, Scheduler, ThreadScheduler};
