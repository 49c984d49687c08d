//! Outbound UI events. Components push named JSON payloads to an
//! [`EventSink`]; the host decides where they go.

use serde::Serialize;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Mutex;

pub const ZONES_CHANGED: &str = "zones-changed";
pub const ZONES_SAVED: &str = "zones-saved";
pub const OCCUPANCY_UPDATED: &str = "occupancy-updated";
pub const OVERLAY_STATUS_CHANGED: &str = "overlay-status-changed";
pub const STREAM_STATE_CHANGED: &str = "stream-state-changed";
pub const THEME_CHANGED: &str = "theme-changed";

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &str, payload: Value);
}

/// Serialize `payload` and hand it to the sink. Serialization failures are
/// logged and dropped.
pub fn emit_event<T: Serialize>(sink: &dyn EventSink, event: &str, payload: &T) {
    match serde_json::to_value(payload) {
        Ok(value) => sink.emit(event, value),
        Err(err) => log::error!("failed to serialize {event} payload: {err}"),
    }
}

/// Writes `{"event": ..., "payload": ...}` lines to stdout.
pub struct StdoutEventSink;

impl EventSink for StdoutEventSink {
    fn emit(&self, event: &str, payload: Value) {
        let line = json!({ "event": event, "payload": payload });
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        if let Err(err) = writeln!(handle, "{line}") {
            log::error!("failed to write {event} event: {err}");
        }
    }
}

/// Keeps every event in memory; used by tests and by embedders that drain
/// events on their own schedule.
#[derive(Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<(String, Value)>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<(String, Value)> {
        match self.events.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn count(&self, event: &str) -> usize {
        match self.events.lock() {
            Ok(guard) => guard.iter().filter(|(name, _)| name == event).count(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .filter(|(name, _)| name == event)
                .count(),
        }
    }

    pub fn last(&self, event: &str) -> Option<Value> {
        let guard = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .iter()
            .rev()
            .find(|(name, _)| name == event)
            .map(|(_, payload)| payload.clone())
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: &str, payload: Value) {
        match self.events.lock() {
            Ok(mut guard) => guard.push((event.to_string(), payload)),
            Err(poisoned) => poisoned.into_inner().push((event.to_string(), payload)),
        }
    }
}
