//! The projection contract.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// How many events a projection has been given, counted from 1.
///
/// A projection at checkpoint `n` has applied `n` distinct events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Checkpoint(u64);

impl Checkpoint {
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn at(position: u64) -> Self {
        Self(position)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "checkpoint({})", self.0)
    }
}

/// Folds events from the store into a query-side view.
///
/// `apply` receives every stored event exactly once, including events from
/// streams the projection does not care about; the projection must still
/// move its checkpoint forward for those.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, checkpoint: Checkpoint, event: &EventEnvelope) -> Result<()>;

    async fn checkpoint(&self) -> Checkpoint;

    /// Drops all state and rewinds to [`Checkpoint::zero`].
    async fn reset(&self) -> Result<()>;
}
