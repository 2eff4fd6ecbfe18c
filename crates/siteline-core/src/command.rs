//! Fluent write-side command machinery.
//!
//! Command handlers load the current snapshot, run guards against it,
//! mutate a working copy and emit exactly one event whose version is the
//! snapshot's version plus one (or 0 for creations). The caller persists
//! the snapshot and publishes the event within one unit of work.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::DomainError;
use crate::identity::{EventEnvelope, EventKey, RoutingKey};
use crate::snapshot::VersionedSnapshot;

/// Outcome of a handled command: the updated snapshot and the event to
/// publish.
#[derive(Debug, Clone)]
pub struct CommandResult<S, P> {
    /// Snapshot after the command, at the emitted event's version.
    pub snapshot: S,
    /// The event to publish.
    pub event: EventEnvelope<P>,
}

/// Guard-and-emit helper for command handlers.
///
/// The fallible steps return `Result<Self, _>` so handlers chain them with
/// `?` and cannot emit an event past a failed guard.
#[derive(Debug)]
pub struct CommandHandler<S> {
    snapshot: S,
}

impl<S: VersionedSnapshot> CommandHandler<S> {
    /// Starts a command against the given snapshot.
    #[must_use]
    pub fn of(snapshot: S) -> Self {
        Self { snapshot }
    }

    /// Rejects the command when the caller's expected version is stale.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrencyConflict` when the versions differ; the caller
    /// may refetch the snapshot and retry.
    pub fn assert_version_matches(self, expected: i64) -> Result<Self, DomainError> {
        if self.snapshot.version() == expected {
            Ok(self)
        } else {
            Err(DomainError::ConcurrencyConflict {
                aggregate_id: self.snapshot.identifier(),
                required: self.snapshot.version(),
                encountered: expected,
            })
        }
    }

    /// Rejects the command when the predicate does not hold for the
    /// current snapshot.
    ///
    /// # Errors
    ///
    /// Returns `PreconditionFailed` carrying `message`.
    pub fn check_precondition(
        self,
        predicate: impl FnOnce(&S) -> bool,
        message: &str,
    ) -> Result<Self, DomainError> {
        if predicate(&self.snapshot) {
            Ok(self)
        } else {
            Err(DomainError::PreconditionFailed(message.to_owned()))
        }
    }

    /// Applies a state change to the working snapshot.
    #[must_use]
    pub fn apply(mut self, mutation: impl FnOnce(&mut S)) -> Self {
        mutation(&mut self.snapshot);
        self
    }

    /// Finishes the command: bumps the version by one, stamps the audit
    /// trail and builds the outgoing envelope from the updated snapshot.
    #[must_use]
    pub fn emit<P>(
        mut self,
        actor: Uuid,
        clock: &dyn Clock,
        build: impl FnOnce(&S, DateTime<Utc>) -> EventEnvelope<P>,
    ) -> CommandResult<S, P> {
        let now = clock.now();
        let next = self.snapshot.version() + 1;
        self.snapshot.set_version(next);
        self.snapshot.audit_mut().touch(actor, now);
        let event = build(&self.snapshot, now);
        CommandResult {
            snapshot: self.snapshot,
            event,
        }
    }

    /// Finishes a creation command. The snapshot was constructed at
    /// version 0 with a fresh audit trail, so nothing is bumped.
    #[must_use]
    pub fn emit_current<P>(
        self,
        build: impl FnOnce(&S) -> EventEnvelope<P>,
    ) -> CommandResult<S, P> {
        let event = build(&self.snapshot);
        CommandResult {
            snapshot: self.snapshot,
            event,
        }
    }

    /// Finishes a deletion command with a tombstone record, keyed one
    /// version past the snapshot so it sorts after the deletion event.
    #[must_use]
    pub fn emit_tombstone<P>(self, clock: &dyn Clock, aggregate_type: &str) -> CommandResult<S, P> {
        let key = EventKey::AggregateEvent {
            aggregate: crate::identity::AggregateIdentifier::new(
                aggregate_type,
                self.snapshot.identifier(),
                self.snapshot.version() + 1,
            ),
            routing_key: RoutingKey(self.snapshot.root_context()),
        };
        let event = EventEnvelope::new(key, None, clock.now());
        CommandResult {
            snapshot: self.snapshot,
            event,
        }
    }
}

/// Envelopes staged for publication by lifecycle callbacks.
///
/// The persistence lifecycle points are synchronous, so a callback cannot
/// publish directly. It stages the envelope here instead and the unit of
/// work drains and publishes after the write succeeded. A callback that
/// never fired leaves nothing behind, so a failed write publishes nothing.
pub struct Outbox<P> {
    staged: std::sync::Mutex<Vec<EventEnvelope<P>>>,
}

impl<P> Default for Outbox<P> {
    fn default() -> Self {
        Self {
            staged: std::sync::Mutex::new(Vec::new()),
        }
    }
}

impl<P> Outbox<P> {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages one envelope for publication.
    pub fn stage(&self, envelope: EventEnvelope<P>) {
        self.staged
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(envelope);
    }

    /// Removes and returns everything staged, in staging order.
    #[must_use]
    pub fn drain(&self) -> Vec<EventEnvelope<P>> {
        std::mem::take(
            &mut self
                .staged
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }
}

impl<P> std::fmt::Debug for Outbox<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let staged = self
            .staged
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len();
        f.debug_struct("Outbox").field("staged", &staged).finish()
    }
}

/// Outbound port for emitted events.
#[async_trait]
pub trait EventPublisher<P: Send + Sync>: Send + Sync {
    /// Publishes one envelope to the stream.
    ///
    /// # Errors
    ///
    /// Returns transport errors only.
    async fn publish(&self, envelope: EventEnvelope<P>) -> Result<(), DomainError>;
}
