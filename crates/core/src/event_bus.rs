//! Unified event bus — trait for emitting audit/analytics events from any
//! module.
//!
//! The engine accepts an `Arc<dyn EventSink>` so that runtime outcomes
//! (dispatches, approvals, failures) are always visible to operators and
//! never silently swallowed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// An audit/analytics event emitted by the automation core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub journey_id: Option<Uuid>,
    pub execution_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub node_id: Option<Uuid>,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    JourneyEntered,
    NodeCompleted,
    MessageDispatched,
    DispatchFailed,
    ApprovalRequested,
    ApprovalGranted,
    ApprovalRejected,
    WaitScheduled,
    WaitResumed,
    ExecutionCompleted,
    ExecutionFailed,
    ExecutionCancelled,
}

/// Trait for emitting lifecycle events. Implementations route events to
/// the audit store, analytics pipeline, or operator notifications.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LifecycleEvent);
}

/// No-op sink for tests and modules that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: LifecycleEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().expect("event bus mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().expect("event bus mutex poisoned").len()
    }

    pub fn count_type(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .expect("event bus mutex poisoned")
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().expect("event bus mutex poisoned").clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("event bus mutex poisoned")
            .push(event);
    }
}

/// Convenience builder for creating a `LifecycleEvent` with minimal
/// boilerplate. Node and detail fields are set by the caller when relevant.
pub fn make_event(
    event_type: EventType,
    journey_id: Option<Uuid>,
    execution_id: Option<Uuid>,
    customer_id: Option<Uuid>,
) -> LifecycleEvent {
    LifecycleEvent {
        event_id: Uuid::new_v4(),
        event_type,
        journey_id,
        execution_id,
        customer_id,
        node_id: None,
        detail: None,
        timestamp: Utc::now(),
    }
}

/// Convenience: create a no-op event bus for modules that don't need it.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
