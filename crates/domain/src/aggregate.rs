//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// A fact recorded in an aggregate's stream. Named in the past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Name stored alongside the payload in the event store.
    fn event_type(&self) -> &'static str;
}

/// An event-sourced entity.
///
/// State is rebuilt by replaying the stream through [`Aggregate::apply`];
/// command methods inspect the state and return new events without mutating it.
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;
    type Error: std::error::Error + Send + Sync;

    /// Stream category recorded on every envelope.
    fn aggregate_type() -> &'static str;

    /// Stream id, or `None` while the aggregate has not been created.
    fn id(&self) -> Option<AggregateId>;

    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    /// Folds one event into the state. Must be deterministic and infallible.
    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }

    fn exists(&self) -> bool {
        self.id().is_some()
    }
}
