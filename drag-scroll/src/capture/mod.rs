//! Input capture
//!
//! Platform hooks turn raw input into [`InputEvent`]s and push them into a
//! lock-free queue. The callback path never blocks and never touches the
//! gesture engine directly.

pub mod types;
pub mod event_queue;
pub mod source;
#[cfg(target_os = "macos")]
pub mod event_tap;

pub use event_queue::{event_queue, EventConsumer, EventProducer, QueueSnapshot, QueueStats};
#[cfg(target_os = "macos")]
pub use event_tap::EventTap;
pub use source::{platform_event_source, EventSource, ManualSource, ManualSourceHandle};
pub use types::*;

/// Whether this process may observe global input.
#[cfg(target_os = "macos")]
pub fn accessibility_trusted() -> bool {
    event_tap::check_accessibility_permissions()
}

/// Whether this process may observe global input.
#[cfg(not(target_os = "macos"))]
pub fn accessibility_trusted() -> bool {
    false
}

/// Ask the system to grant input access, showing its prompt if needed.
#[cfg(target_os = "macos")]
pub fn request_accessibility() -> bool {
    event_tap::request_accessibility_permissions()
}

/// Ask the system to grant input access, showing its prompt if needed.
#[cfg(not(target_os = "macos"))]
pub fn request_accessibility() -> bool {
    false
}
