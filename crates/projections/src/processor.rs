//! Feeds stored events to registered projections.

use std::collections::HashSet;

use event_store::{EventId, EventStore};
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::{Checkpoint, Projection};

/// Replays stored events into a set of projections.
///
/// Delivery is tracked per projection by event id, not by position. An event
/// that becomes visible after later ones (a slow commit on PostgreSQL) is
/// still delivered on the next catch-up, and nothing is delivered twice.
///
/// Catch-up runs are serialized: two concurrent callers never deliver the
/// same event twice, the second one simply finds the projections current.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    delivered: Mutex<Vec<HashSet<EventId>>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
        self.delivered.get_mut().push(HashSet::new());
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Delivers every event a projection has not yet seen, in store order.
    ///
    /// Returns the number of events in the store.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut delivered_ids = self.delivered.lock().await;

        let mut stream = self.store.stream_all_events().await?;
        let mut total: u64 = 0;
        let mut delivered: u64 = 0;

        while let Some(event) = stream.next().await {
            let event = event?;
            total += 1;

            for (projection, seen) in self.projections.iter().zip(delivered_ids.iter_mut()) {
                if seen.contains(&event.event_id) {
                    continue;
                }
                let checkpoint = Checkpoint::at(seen.len() as u64 + 1);
                projection.apply(checkpoint, &event).await?;
                seen.insert(event.event_id);
                delivered += 1;
            }
        }

        if delivered > 0 {
            metrics::counter!("projections_events_processed").increment(delivered);
            tracing::debug!(delivered, events = total, "projections caught up");
        }

        Ok(total)
    }

    /// Resets every projection and replays the store from the beginning.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        {
            let mut delivered_ids = self.delivered.lock().await;
            for (projection, seen) in self.projections.iter().zip(delivered_ids.iter_mut()) {
                tracing::info!(projection = projection.name(), "resetting projection");
                projection.reset().await?;
                seen.clear();
            }
        }
        self.run_catch_up().await
    }
}
