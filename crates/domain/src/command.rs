//! Loading aggregates and executing commands against them.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, EventStoreError, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Number of attempts a command gets before a conflict is reported.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Outcome of a command.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// State after the new events were applied.
    pub aggregate: A,

    /// Events persisted by this command. Empty when the command was a no-op.
    pub events: Vec<A::Event>,

    pub new_version: Version,
}

impl<A: Aggregate> CommandResult<A> {
    pub fn changed(&self) -> bool {
        !self.events.is_empty()
    }
}

/// Runs read-modify-write cycles against one kind of aggregate.
///
/// `execute` loads the stream, lets the command decide on new events, and
/// appends them with the loaded version as the expected version. When another
/// writer got there first the whole cycle is re-run on fresh state, up to
/// `max_attempts` times, so writes to one stream never interleave.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    max_attempts: u32,
    _phantom: PhantomData<A>,
}

impl<S, A> Clone for CommandHandler<S, A>
where
    S: EventStore + Clone,
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            max_attempts: self.max_attempts,
            _phantom: PhantomData,
        }
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            _phantom: PhantomData,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replays a stream. A stream with no events yields `A::default()`.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let mut aggregate = A::default();
        for envelope in self.store.load_stream(aggregate_id).await? {
            let event: A::Event = envelope.decode()?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }
        Ok(aggregate)
    }

    /// Replays a stream, returning `None` if the aggregate was never created.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.exists().then_some(aggregate))
    }

    /// Executes a command and persists the events it produces.
    ///
    /// The command may run more than once, so it must only read the aggregate
    /// it is handed.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        self.execute_with(
            aggregate_id,
            || std::future::ready(Ok(())),
            |aggregate, _: &()| command_fn(aggregate),
        )
        .await
    }

    /// Like [`execute`](Self::execute), for commands that also read other
    /// streams. `prepare` runs at the start of every attempt, so a retry
    /// decides on the same fresh data it appends after.
    pub async fn execute_with<C, P, Fut, F>(
        &self,
        aggregate_id: AggregateId,
        prepare: P,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        P: Fn() -> Fut,
        Fut: Future<Output = Result<C, DomainError>>,
        F: Fn(&A, &C) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let context = prepare().await?;
            let mut aggregate = self.load(aggregate_id).await?;
            let current_version = aggregate.version();

            let events = command_fn(&aggregate, &context)?;
            if events.is_empty() {
                return Ok(CommandResult {
                    aggregate,
                    events,
                    new_version: current_version,
                });
            }

            let envelopes = self.build_envelopes(aggregate_id, current_version, &events)?;
            match self
                .store
                .append(envelopes, AppendOptions::after(current_version))
                .await
            {
                Ok(new_version) => {
                    aggregate.apply_events(events.iter().cloned());
                    aggregate.set_version(new_version);
                    return Ok(CommandResult {
                        aggregate,
                        events,
                        new_version,
                    });
                }
                Err(EventStoreError::ConcurrencyConflict { .. }) if attempt < self.max_attempts => {
                    metrics::counter!("command_conflict_retries_total", "aggregate" => A::aggregate_type())
                        .increment(1);
                    tracing::debug!(%aggregate_id, attempt, "stream moved on, retrying command");
                }
                Err(EventStoreError::ConcurrencyConflict { .. }) => {
                    return Err(DomainError::ConcurrencyExhausted {
                        aggregate_id,
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn build_envelopes(
        &self,
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .build()?;
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }
}
