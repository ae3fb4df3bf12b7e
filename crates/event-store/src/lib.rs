//! Event persistence for the learning platform.
//!
//! Every course, lecture, user, purchase and progress record lives in its own
//! append-only stream. Appends are guarded by an expected stream version so
//! concurrent writers to the same stream are detected instead of lost.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
