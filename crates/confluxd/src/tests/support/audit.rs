//! Audit sink that keeps every event for assertions.

use std::sync::Mutex;

use crate::audit::{AuditEvent, AuditEventKind, AuditSink};

#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .expect("audit sink mutex poisoned")
            .clone()
    }

    /// Event kinds recorded for `connector_name`, in order.
    pub fn kinds_for(&self, connector_name: &str) -> Vec<AuditEventKind> {
        self.events()
            .into_iter()
            .filter(|event| event.connector_name.as_deref() == Some(connector_name))
            .map(|event| event.kind)
            .collect()
    }

    /// Daemon-level event kinds, in order.
    pub fn daemon_kinds(&self) -> Vec<AuditEventKind> {
        self.events()
            .into_iter()
            .filter(|event| event.connector_name.is_none())
            .map(|event| event.kind)
            .collect()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events
            .lock()
            .expect("audit sink mutex poisoned")
            .push(event.clone());
    }
}
