use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_batch},
};

/// Event store held in process memory.
///
/// Used by the test suites and by the development server when no database is
/// configured. Events are kept in one vector in append order.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored events across all streams.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    fn current_version(events: &[EventEnvelope], aggregate_id: AggregateId) -> Version {
        events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_batch(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let first_version = events[0].version;

        let mut store = self.events.write().await;
        let current = Self::current_version(&store, aggregate_id);

        if let Some(expected) = options.expected_version
            && current != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current,
            });
        }

        // Mirrors the unique (stream, version) constraint of the SQL schema.
        if first_version <= current {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current),
                actual: current,
            });
        }

        let last_version = events.last().map(|e| e.version).unwrap_or(current);
        store.extend(events);
        Ok(last_version)
    }

    async fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<EventEnvelope>> {
        self.load_stream_from(aggregate_id, Version::first()).await
    }

    async fn load_stream_from(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id && e.version >= from_version)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        let snapshot = self.events.read().await.clone();
        Ok(Box::pin(futures_util::stream::iter(
            snapshot.into_iter().map(Ok),
        )))
    }

    async fn stream_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let store = self.events.read().await;
        Ok(store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max())
    }
}
