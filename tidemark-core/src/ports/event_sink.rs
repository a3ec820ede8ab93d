//! Event sink port - where run events go

use std::sync::Mutex;

use crate::domain::LogEvent;

/// Receives structured events from the runner
///
/// Recording must never fail a run, so implementations swallow their own
/// errors.
pub trait EventSink: Send + Sync {
    fn record(&self, event: LogEvent);
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: LogEvent) {}
}

/// Sink that keeps events in memory, in order
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events
    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Names of recorded events, in order
    pub fn event_names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.event).collect()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: LogEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
