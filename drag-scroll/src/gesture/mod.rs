//! Gesture interpretation core
//!
//! Pure, clock-free state machine: every handler receives explicit
//! timestamps, so the same code runs under the live controller, the trace
//! player and unit tests.

pub mod tuning;
pub mod history;
pub mod velocity;
pub mod pause;
pub mod momentum;
pub mod session;
pub mod engine;

pub use engine::{EngineStats, EngineStatus, GestureEngine, LaunchReason};
pub use history::{Sample, SampleHistory};
pub use momentum::{MomentumSimulator, MomentumStep};
pub use pause::{PauseDetector, PauseVerdict};
pub use session::{GesturePhase, GestureSession};
pub use tuning::{MomentumTuning, PauseTuning, Tuning, VelocityTuning};
pub use velocity::{Velocity, VelocityEstimator};
