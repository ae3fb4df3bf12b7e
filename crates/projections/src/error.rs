//! Projection errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// A stored payload no longer matches the event type it claims to be.
    #[error("cannot decode {event_type} payload: {source}")]
    Decode {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ProjectionError>;

/// Decodes an envelope's payload, tagging failures with the event type.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    event: &event_store::EventEnvelope,
) -> Result<T> {
    event.decode().map_err(|source| ProjectionError::Decode {
        event_type: event.event_type.clone(),
        source,
    })
}
