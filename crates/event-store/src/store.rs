use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Version};

/// Options controlling an append.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Version the stream must currently be at. `None` skips the check.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Expects the stream to be empty.
    pub fn expect_new() -> Self {
        Self::expect_version(Version::initial())
    }

    /// Expects `version`, treating the initial version as "stream must not exist".
    pub fn after(version: Version) -> Self {
        if version == Version::initial() {
            Self::expect_new()
        } else {
            Self::expect_version(version)
        }
    }
}

/// A stream of events in append order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Storage for event streams.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch of events to one stream, atomically.
    ///
    /// Fails with `ConcurrencyConflict` when `options.expected_version` does not
    /// match the stream's current version. Returns the new stream version.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// Returns every event of a stream in version order.
    async fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<EventEnvelope>>;

    /// Returns the events of a stream from `from_version` (inclusive).
    async fn load_stream_from(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>>;

    /// Streams all events across all streams in append order.
    async fn stream_all_events(&self) -> Result<EventStream>;

    /// Returns the current version of a stream, or `None` if it has no events.
    async fn stream_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;
}

/// Convenience helpers available on every store.
#[async_trait]
pub trait EventStoreExt: EventStore {
    async fn append_event(&self, event: EventEnvelope, options: AppendOptions) -> Result<Version> {
        self.append(vec![event], options).await
    }

    async fn stream_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.stream_version(aggregate_id).await?.is_some())
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Checks that a batch targets a single stream with consecutive versions.
pub(crate) fn validate_batch(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty batch".to_string(),
        ));
    };

    let mut expected = first.version;
    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id
            || event.aggregate_type != first.aggregate_type
        {
            return Err(EventStoreError::InvalidAppend(
                "all events in a batch must target the same stream".to_string(),
            ));
        }
        expected = expected.next();
        if event.version != expected {
            return Err(EventStoreError::InvalidAppend(format!(
                "versions must be consecutive: expected {expected}, got {}",
                event.version
            )));
        }
    }

    Ok(())
}
