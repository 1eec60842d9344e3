//! Input Trace Format
//!
//! A trace is the ordered list of [`InputEvent`]s seen by the engine, plus
//! metadata. Traces are stored as pretty JSON and can be replayed offline.

use crate::capture::types::{InputEvent, TriggerKey};
use crate::time::Timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Current trace format version
pub const CURRENT_FORMAT_VERSION: &str = "1.0";

fn temp_path(final_path: &Path) -> PathBuf {
    final_path.with_extension("json.tmp")
}

/// Trace metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceMetadata {
    pub id: Uuid,
    pub name: String,
    /// Trigger key the events were captured with
    pub trigger: TriggerKey,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub event_count: usize,
    /// Span between the first and last event
    pub duration_ms: u64,
    pub format_version: String,
}

impl TraceMetadata {
    pub fn new(name: impl Into<String>, trigger: TriggerKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            trigger,
            started_at: Utc::now(),
            ended_at: None,
            event_count: 0,
            duration_ms: 0,
            format_version: CURRENT_FORMAT_VERSION.to_string(),
        }
    }
}

impl Default for TraceMetadata {
    fn default() -> Self {
        Self::new(String::new(), TriggerKey::default())
    }
}

/// A recorded stream of input events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub metadata: TraceMetadata,
    pub events: Vec<InputEvent>,
}

impl Trace {
    pub fn new(name: impl Into<String>, trigger: TriggerKey) -> Self {
        Self {
            metadata: TraceMetadata::new(name, trigger),
            events: Vec::new(),
        }
    }

    /// Build a trace from events already in time order.
    pub fn from_events(name: impl Into<String>, events: Vec<InputEvent>) -> crate::Result<Self> {
        let mut trace = Self::new(name, TriggerKey::default());
        trace.events = events;
        trace.check_order()?;
        trace.finalize();
        Ok(trace)
    }

    /// Append an event. Events older than the last one are rejected.
    pub fn push(&mut self, event: InputEvent) -> crate::Result<()> {
        if let Some(last) = self.events.last() {
            if last.timestamp().is_after(event.timestamp()) {
                return Err(crate::Error::Trace(format!(
                    "event at {}ns precedes previous event at {}ns",
                    event.timestamp().as_nanos(),
                    last.timestamp().as_nanos()
                )));
            }
        }
        self.events.push(event);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.events.first().map(InputEvent::timestamp)
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.events.last().map(InputEvent::timestamp)
    }

    /// Stamp the end time and refresh the counters.
    pub fn finalize(&mut self) {
        self.metadata.ended_at = Some(Utc::now());
        self.metadata.event_count = self.events.len();
        self.metadata.duration_ms = match (self.first_timestamp(), self.last_timestamp()) {
            (Some(first), Some(last)) => last.duration_since(first).as_millis() as u64,
            _ => 0,
        };
    }

    /// Shift every timestamp so the first event is at zero.
    pub fn rebased(&self) -> Self {
        let origin = self.first_timestamp().unwrap_or_default();
        let shift = |t: Timestamp| Timestamp::from_nanos(t.as_nanos().saturating_sub(origin.as_nanos()));
        let events = self
            .events
            .iter()
            .map(|event| match *event {
                InputEvent::Trigger { down, timestamp } => InputEvent::Trigger {
                    down,
                    timestamp: shift(timestamp),
                },
                InputEvent::Pointer { x, y, timestamp } => InputEvent::Pointer {
                    x,
                    y,
                    timestamp: shift(timestamp),
                },
            })
            .collect();
        Self {
            metadata: self.metadata.clone(),
            events,
        }
    }

    fn check_order(&self) -> crate::Result<()> {
        for (i, pair) in self.events.windows(2).enumerate() {
            if pair[0].timestamp().is_after(pair[1].timestamp()) {
                return Err(crate::Error::Trace(format!(
                    "events out of order at index {}",
                    i + 1
                )));
            }
        }
        Ok(())
    }

    /// Save as pretty JSON. Writes a temporary file and renames it into place.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let tmp = temp_path(path);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load and check a trace.
    ///
    /// A different format version is logged and loading continues; missing
    /// metadata fields take their defaults.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let trace: Trace = serde_json::from_str(&content)?;
        if trace.metadata.format_version != CURRENT_FORMAT_VERSION {
            tracing::warn!(
                name = %trace.metadata.name,
                found = %trace.metadata.format_version,
                expected = CURRENT_FORMAT_VERSION,
                "Trace has a different format version"
            );
        }
        trace.check_order()?;
        Ok(trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ms(v: u64) -> Timestamp {
        Timestamp::from_millis(v)
    }

    fn sample() -> Trace {
        let mut trace = Trace::new("sample", TriggerKey::Command);
        trace.push(InputEvent::trigger_down(ms(100))).unwrap();
        trace.push(InputEvent::pointer(1.0, 2.0, ms(108))).unwrap();
        trace.push(InputEvent::trigger_up(ms(150))).unwrap();
        trace.finalize();
        trace
    }

    #[test]
    fn test_finalize_counts() {
        let trace = sample();
        assert_eq!(trace.metadata.event_count, 3);
        assert_eq!(trace.metadata.duration_ms, 50);
        assert!(trace.metadata.ended_at.is_some());
        assert_eq!(trace.metadata.format_version, CURRENT_FORMAT_VERSION);
    }

    #[test]
    fn test_push_rejects_out_of_order() {
        let mut trace = sample();
        assert!(matches!(
            trace.push(InputEvent::pointer(0.0, 0.0, ms(10))),
            Err(crate::Error::Trace(_))
        ));
        // Equal timestamps are fine
        trace.push(InputEvent::pointer(0.0, 0.0, ms(150))).unwrap();
    }

    #[test]
    fn test_from_events_checks_order() {
        let events = vec![
            InputEvent::pointer(0.0, 0.0, ms(20)),
            InputEvent::pointer(0.0, 0.0, ms(10)),
        ];
        assert!(Trace::from_events("bad", events).is_err());
    }

    #[test]
    fn test_rebased_starts_at_zero() {
        let trace = sample().rebased();
        assert_eq!(trace.first_timestamp(), Some(ms(0)));
        assert_eq!(trace.last_timestamp(), Some(ms(50)));
        assert_eq!(trace.events[1], InputEvent::pointer(1.0, 2.0, ms(8)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.json");
        let trace = sample();
        trace.save(&path).unwrap();
        assert!(!temp_path(&path).exists());

        let loaded = Trace::load(&path).unwrap();
        assert_eq!(loaded, trace);
        assert_eq!(loaded.metadata.trigger, TriggerKey::Command);
    }

    #[test]
    fn test_load_fills_missing_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("minimal.json");
        std::fs::write(
            &path,
            r#"{"metadata":{"name":"hand written","format_version":"0.9"},
               "events":[{"kind":"trigger","down":true,"timestamp":0}]}"#,
        )
        .unwrap();

        let trace = Trace::load(&path).unwrap();
        assert_eq!(trace.metadata.name, "hand written");
        assert_eq!(trace.metadata.trigger, TriggerKey::Option);
        assert_eq!(trace.len(), 1);
    }

    #[test]
    fn test_load_rejects_unordered_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("unordered.json");
        std::fs::write(
            &path,
            r#"{"metadata":{},"events":[
                {"kind":"pointer","x":0.0,"y":0.0,"timestamp":20},
                {"kind":"pointer","x":0.0,"y":0.0,"timestamp":10}]}"#,
        )
        .unwrap();
        assert!(matches!(Trace::load(&path), Err(crate::Error::Trace(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Trace::load(&dir.path().join("nope.json")),
            Err(crate::Error::Io(_))
        ));
    }
}
