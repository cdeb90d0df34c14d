//! Append-only event log owned by one case run

use super::types::{SecurityEvent, SecurityEventKind};
use serde::Serialize;

/// Ordered, append-only log of security events for a single case run.
///
/// There is no way to remove or edit an entry. The log is dropped with the
/// case; only derived outcomes are persisted.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct EventLog {
    events: Vec<SecurityEvent>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event without detail
    pub fn record(&mut self, kind: SecurityEventKind) {
        self.push(SecurityEvent::new(kind));
    }

    /// Append an event with an internal-facing detail string
    pub fn record_with_detail(&mut self, kind: SecurityEventKind, detail: impl Into<String>) {
        self.push(SecurityEvent::with_detail(kind, detail));
    }

    fn push(&mut self, event: SecurityEvent) {
        tracing::info!(event = %event, "Security event");
        self.events.push(event);
    }

    /// All events in append order
    pub fn events(&self) -> &[SecurityEvent] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &SecurityEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Event codes in append order
    pub fn codes(&self) -> Vec<String> {
        self.events.iter().map(|e| e.kind.code()).collect()
    }

    /// Whether an event of this kind was recorded
    pub fn contains(&self, kind: SecurityEventKind) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }

    /// Index of the first event of this kind
    pub fn position(&self, kind: SecurityEventKind) -> Option<usize> {
        self.events.iter().position(|e| e.kind == kind)
    }

    /// Number of events of this kind
    pub fn count(&self, kind: SecurityEventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut log = EventLog::new();
        log.record(SecurityEventKind::OutputGuardFailed);
        log.record(SecurityEventKind::OutputGuardSanitized);
        log.record(SecurityEventKind::OutputGuardPassed);

        assert_eq!(
            log.codes(),
            vec![
                "OUTPUT_GUARD_FAILED",
                "OUTPUT_GUARD_SANITIZED",
                "OUTPUT_GUARD_PASSED"
            ]
        );
        assert!(
            log.position(SecurityEventKind::OutputGuardSanitized)
                < log.position(SecurityEventKind::OutputGuardPassed)
        );
    }

    #[test]
    fn test_count_and_contains() {
        let mut log = EventLog::new();
        assert!(log.is_empty());
        log.record_with_detail(SecurityEventKind::ToolCallSucceeded, "get_order_details");
        log.record_with_detail(SecurityEventKind::ToolCallSucceeded, "get_case_history");

        assert_eq!(log.len(), 2);
        assert_eq!(log.count(SecurityEventKind::ToolCallSucceeded), 2);
        assert!(!log.contains(SecurityEventKind::ToolCallFailed));
        assert_eq!(log.events()[1].detail.as_deref(), Some("get_case_history"));
    }

    #[test]
    fn test_serializes_as_array() {
        let mut log = EventLog::new();
        log.record(SecurityEventKind::PiiRedactionNotNeeded);
        let json = serde_json::to_value(&log).unwrap();
        assert!(json.is_array());
        assert_eq!(json.as_array().unwrap().len(), 1);
    }
}
