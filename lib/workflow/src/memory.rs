//! In-memory event store.
//!
//! Serves tests and single-process deployments where NATS is not
//! configured. Events are retained per run for replay; work items are
//! retained for inspection (in-process drivers execute work directly and
//! never consume the queue).

use crate::envelope::Envelope;
use crate::execution::ExecutionEvent;
use crate::orchestrator::{EventStore, EventStoreError, WorkItem};
use async_trait::async_trait;
use flowdeck_core::WorkflowRunId;
use std::collections::HashMap;
use std::sync::Mutex;

/// An in-memory `EventStore` implementation.
#[derive(Default)]
pub struct InMemoryEventStore {
    events: Mutex<HashMap<WorkflowRunId, Vec<ExecutionEvent>>>,
    work_items: Mutex<Vec<WorkItem>>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all work items published so far.
    #[must_use]
    pub fn work_items(&self) -> Vec<WorkItem> {
        self.work_items.lock().expect("event store lock").clone()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn publish(&self, event: Envelope<ExecutionEvent>) -> Result<(), EventStoreError> {
        let event = event.into_payload();
        self.events
            .lock()
            .expect("event store lock")
            .entry(event.run_id())
            .or_default()
            .push(event);
        Ok(())
    }

    async fn load_events(
        &self,
        run_id: WorkflowRunId,
    ) -> Result<Vec<ExecutionEvent>, EventStoreError> {
        Ok(self
            .events
            .lock()
            .expect("event store lock")
            .get(&run_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn publish_work_item(&self, item: Envelope<WorkItem>) -> Result<(), EventStoreError> {
        self.work_items
            .lock()
            .expect("event store lock")
            .push(item.into_payload());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flowdeck_core::WorkflowId;

    #[tokio::test]
    async fn events_replay_per_run() {
        let store = InMemoryEventStore::new();
        let run_id = WorkflowRunId::new();
        let other_run = WorkflowRunId::new();

        store
            .publish(Envelope::new(ExecutionEvent::RunQueued {
                run_id,
                workflow_id: WorkflowId::new(),
                trigger_id: None,
                input: None,
                timestamp: Utc::now(),
            }))
            .await
            .expect("publish");
        store
            .publish(Envelope::new(ExecutionEvent::RunStarted {
                run_id,
                timestamp: Utc::now(),
            }))
            .await
            .expect("publish");

        assert_eq!(store.load_events(run_id).await.expect("load").len(), 2);
        assert!(store.load_events(other_run).await.expect("load").is_empty());
    }
}
