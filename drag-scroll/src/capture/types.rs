//! Core types for event capture
//!
//! Defines the input vocabulary the gesture engine understands: trigger key
//! transitions and pointer positions, both stamped on the monotonic clock.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

// CGEventFlags masks
const FLAG_MASK_SHIFT: u64 = 0x0002_0000;
const FLAG_MASK_CONTROL: u64 = 0x0004_0000;
const FLAG_MASK_ALTERNATE: u64 = 0x0008_0000;
const FLAG_MASK_COMMAND: u64 = 0x0010_0000;
const FLAG_MASK_FN: u64 = 0x0080_0000;

/// Modifier key that arms drag-scrolling while held.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKey {
    /// Option / Alt
    #[default]
    Option,
    Command,
    Control,
    Shift,
    /// The fn / globe key
    Function,
}

impl TriggerKey {
    /// CGEventFlags bit for this key.
    pub fn flag_mask(&self) -> u64 {
        match self {
            TriggerKey::Option => FLAG_MASK_ALTERNATE,
            TriggerKey::Command => FLAG_MASK_COMMAND,
            TriggerKey::Control => FLAG_MASK_CONTROL,
            TriggerKey::Shift => FLAG_MASK_SHIFT,
            TriggerKey::Function => FLAG_MASK_FN,
        }
    }

    /// Whether this key is held according to a CGEventFlags bitmask.
    pub fn is_held_in(&self, flags: u64) -> bool {
        flags & self.flag_mask() != 0
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKey::Option => "option",
            TriggerKey::Command => "command",
            TriggerKey::Control => "control",
            TriggerKey::Shift => "shift",
            TriggerKey::Function => "function",
        }
    }
}

impl std::fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One input observation fed to the gesture engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputEvent {
    /// The trigger key went down or up
    Trigger { down: bool, timestamp: Timestamp },
    /// Absolute pointer position in global screen coordinates
    Pointer { x: f64, y: f64, timestamp: Timestamp },
}

impl InputEvent {
    pub fn trigger_down(timestamp: Timestamp) -> Self {
        InputEvent::Trigger {
            down: true,
            timestamp,
        }
    }

    pub fn trigger_up(timestamp: Timestamp) -> Self {
        InputEvent::Trigger {
            down: false,
            timestamp,
        }
    }

    pub fn pointer(x: f64, y: f64, timestamp: Timestamp) -> Self {
        InputEvent::Pointer { x, y, timestamp }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            InputEvent::Trigger { timestamp, .. } | InputEvent::Pointer { timestamp, .. } => {
                *timestamp
            }
        }
    }
}
