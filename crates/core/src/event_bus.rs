//! Unified event bus: trait for emitting planner events from any module.
//!
//! Components accept an `Arc<dyn EventSink>` so the hosting application can
//! route campaign, entitlement, and asset-generation events wherever it wants.

use crate::types::{EventType, PlannerEvent};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Trait for emitting planner events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PlannerEvent);
}

/// No-op sink for tests and components that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: PlannerEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<PlannerEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<PlannerEvent> {
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
    fn emit(&self, event: PlannerEvent) {
        self.events.lock().expect("event bus mutex poisoned").push(event);
    }
}

/// Convenience builder for creating a `PlannerEvent` with minimal boilerplate.
pub fn make_event(
    event_type: EventType,
    account_id: Option<Uuid>,
    campaign_id: Option<Uuid>,
    channel: Option<String>,
) -> PlannerEvent {
    PlannerEvent {
        event_id: Uuid::new_v4(),
        event_type,
        account_id,
        campaign_id,
        channel,
        detail: None,
        timestamp: Utc::now(),
    }
}

/// Same as [`make_event`] with a free-form detail attached.
pub fn make_event_with_detail(
    event_type: EventType,
    account_id: Option<Uuid>,
    campaign_id: Option<Uuid>,
    channel: Option<String>,
    detail: impl Into<String>,
) -> PlannerEvent {
    PlannerEvent {
        detail: Some(detail.into()),
        ..make_event(event_type, account_id, campaign_id, channel)
    }
}

/// Convenience: create a no-op event bus for components that don't need it.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
