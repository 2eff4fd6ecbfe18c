//! Snapshot-store abstraction and the event version gate.
//!
//! A snapshot store projects the replicated event stream of one aggregate
//! type into locally queryable current-state rows. Every store shares the
//! same delivery semantics — idempotent under redelivery, strictly ordered
//! per aggregate, tombstone-aware — so that shared flow lives here and the
//! per-aggregate stores only contribute mapping logic.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::AuditInfo;
use crate::error::DomainError;
use crate::identity::{EventEnvelope, EventKey};

/// Version given to placeholder rows created for aggregates whose own
/// events have not arrived yet.
///
/// The first genuine event carries version 0, which the gate accepts as an
/// ordinary update over `-1`. Placeholders exist because related streams
/// (invitation and participant) are ordered independently of each other.
pub const PLACEHOLDER_VERSION: i64 = -1;

/// Materialized current state of one aggregate.
pub trait VersionedSnapshot: Clone + Send + Sync + 'static {
    /// Aggregate instance identifier.
    fn identifier(&self) -> Uuid;

    /// Version of the last applied event.
    fn version(&self) -> i64;

    /// Moves the snapshot to a new stream position.
    fn set_version(&mut self, version: i64);

    /// Root context (owning project) used for routing and cascades.
    fn root_context(&self) -> Uuid;

    /// Audit trail of the aggregate.
    fn audit(&self) -> &AuditInfo;

    /// Mutable audit trail, used by the command machinery.
    fn audit_mut(&mut self) -> &mut AuditInfo;
}

/// Outcome of checking an incoming event version against the local
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionGate {
    /// The event is the next one for this snapshot, or the first one seen.
    Apply,
    /// The event was applied before; the redelivery is skipped.
    AlreadyApplied,
    /// The event skips ahead of the snapshot: the stream and the local
    /// state disagree, which no retry can repair.
    Conflict {
        /// The version the snapshot could accept next.
        required: i64,
    },
}

/// Decides whether an event at `incoming` may be applied over a snapshot
/// currently at `current` (`None` when no row exists yet).
///
/// With no current row any version is accepted: after stream compaction
/// the first visible event of an aggregate may sit above 0.
#[must_use]
pub fn can_apply(current: Option<i64>, incoming: i64) -> VersionGate {
    match current {
        None => VersionGate::Apply,
        Some(version) if incoming == version + 1 => VersionGate::Apply,
        Some(version) if incoming <= version => VersionGate::AlreadyApplied,
        Some(version) => VersionGate::Conflict {
            required: version + 1,
        },
    }
}

/// A consumer-side store that projects stream records into snapshot rows.
///
/// The replication pipeline routes every record to each store claiming it;
/// stores never see records they do not claim.
#[async_trait]
pub trait SnapshotStore<P: Send + Sync>: Send + Sync {
    /// Whether this store applies the given record.
    fn handles(&self, key: &EventKey, payload: &P) -> bool;

    /// Whether this store reacts to tombstones for the given key.
    fn handles_tombstone(&self, key: &EventKey) -> bool;

    /// Applies one claimed record to the local snapshot state.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrencyConflict` when the record skips ahead of the
    /// local snapshot, or whatever the persistence layer reports.
    async fn handle(&self, envelope: &EventEnvelope<P>) -> Result<(), DomainError>;

    /// Removes all local state of the tombstoned aggregate. Succeeds when
    /// nothing exists.
    ///
    /// # Errors
    ///
    /// Returns persistence errors only.
    async fn handle_tombstone(&self, key: &EventKey) -> Result<(), DomainError>;
}

/// Per-aggregate projection logic behind the shared version-gate flow.
///
/// Implementations contribute the record allow-list, the deletion
/// predicate and the mapping of an event onto the snapshot row; the
/// blanket [`SnapshotStore`] impl supplies the duplicate handling and
/// ordering checks every store shares.
#[async_trait]
pub trait AggregateProjection<P: Send + Sync>: Send + Sync {
    /// Snapshot type this projection maintains.
    type Snapshot: VersionedSnapshot;

    /// Aggregate type discriminator this projection is responsible for.
    fn aggregate_type(&self) -> &'static str;

    /// Whether this projection claims the given record.
    fn handles(&self, key: &EventKey, payload: &P) -> bool;

    /// Whether the payload logically deletes the aggregate.
    fn is_deletion(&self, payload: &P) -> bool;

    /// Loads the current snapshot row, if any.
    ///
    /// # Errors
    ///
    /// Returns persistence errors only.
    async fn find_current(&self, id: Uuid) -> Result<Option<Self::Snapshot>, DomainError>;

    /// Applies a gated event over the current snapshot: an insert when no
    /// row exists, an update or a deletion otherwise.
    ///
    /// # Errors
    ///
    /// Returns `DanglingReference` when a referenced aggregate is missing
    /// locally, or persistence errors.
    async fn project(
        &self,
        envelope: &EventEnvelope<P>,
        current: Option<Self::Snapshot>,
    ) -> Result<(), DomainError>;

    /// Removes the aggregate's rows and any strictly owned companions,
    /// succeeding when nothing exists.
    ///
    /// # Errors
    ///
    /// Returns persistence errors only.
    async fn purge(&self, id: Uuid) -> Result<(), DomainError>;
}

#[async_trait]
impl<P, A> SnapshotStore<P> for A
where
    P: Send + Sync + 'static,
    A: AggregateProjection<P>,
{
    fn handles(&self, key: &EventKey, payload: &P) -> bool {
        AggregateProjection::handles(self, key, payload)
    }

    fn handles_tombstone(&self, key: &EventKey) -> bool {
        key.aggregate()
            .is_some_and(|aggregate| aggregate.aggregate_type == self.aggregate_type())
    }

    async fn handle(&self, envelope: &EventEnvelope<P>) -> Result<(), DomainError> {
        let Some(aggregate) = envelope.key.aggregate() else {
            return Ok(());
        };
        let Some(payload) = envelope.payload.as_ref() else {
            return self.purge(aggregate.id).await;
        };

        let current = self.find_current(aggregate.id).await?;
        if self.is_deletion(payload) && current.is_none() {
            debug!(aggregate = %aggregate, "deletion event for an absent snapshot, skipping");
            return Ok(());
        }
        match can_apply(current.as_ref().map(VersionedSnapshot::version), aggregate.version) {
            VersionGate::Apply => self.project(envelope, current).await,
            VersionGate::AlreadyApplied => {
                info!(aggregate = %aggregate, "event already applied, skipping snapshot update");
                Ok(())
            }
            VersionGate::Conflict { required } => Err(DomainError::ConcurrencyConflict {
                aggregate_id: aggregate.id,
                required,
                encountered: aggregate.version,
            }),
        }
    }

    async fn handle_tombstone(&self, key: &EventKey) -> Result<(), DomainError> {
        let Some(aggregate) = key.aggregate() else {
            return Ok(());
        };
        self.purge(aggregate.id).await
    }
}

/// Persistence port for one snapshot type.
///
/// `update` is a compare-and-swap on the version column: the write must be
/// rejected when the stored version no longer equals `expected_version`,
/// surfacing the lost update instead of silently overwriting it.
#[async_trait]
pub trait SnapshotRepository<S: VersionedSnapshot>: Send + Sync {
    /// Loads a snapshot by identifier.
    ///
    /// # Errors
    ///
    /// Returns persistence errors only.
    async fn find(&self, id: Uuid) -> Result<Option<S>, DomainError>;

    /// Inserts a new snapshot row.
    ///
    /// # Errors
    ///
    /// Returns `Storage` when a row already exists.
    async fn insert(&self, snapshot: &S) -> Result<(), DomainError>;

    /// Replaces the stored snapshot if its version still equals
    /// `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrencyConflict` on a lost update and
    /// `AggregateNotFound` when the row disappeared.
    async fn update(&self, snapshot: &S, expected_version: i64) -> Result<(), DomainError>;

    /// Deletes the snapshot row; absent rows are not an error.
    ///
    /// # Errors
    ///
    /// Returns persistence errors only.
    async fn delete(&self, id: Uuid) -> Result<(), DomainError>;

    /// Deletes every row scoped to the root context, returning the count.
    ///
    /// # Errors
    ///
    /// Returns persistence errors only.
    async fn delete_by_root_context(&self, root_context: Uuid) -> Result<u64, DomainError>;

    /// All rows scoped to the root context.
    ///
    /// # Errors
    ///
    /// Returns persistence errors only.
    async fn find_by_root_context(&self, root_context: Uuid) -> Result<Vec<S>, DomainError>;
}

/// Read-side existence check for an aggregate another context references.
///
/// Contexts reference foreign aggregates by identifier only; this port
/// answers whether the referenced row has been replicated locally without
/// exposing the foreign snapshot type.
#[async_trait]
pub trait ReferenceCheck: Send + Sync {
    /// Whether a local row exists for the identifier.
    ///
    /// # Errors
    ///
    /// Returns persistence errors only.
    async fn exists(&self, id: Uuid) -> Result<bool, DomainError>;
}

/// Adapts a snapshot repository into a [`ReferenceCheck`].
pub struct RepositoryReference<S: VersionedSnapshot> {
    repository: Arc<dyn SnapshotRepository<S>>,
}

impl<S: VersionedSnapshot> RepositoryReference<S> {
    /// Wraps the repository.
    #[must_use]
    pub fn new(repository: Arc<dyn SnapshotRepository<S>>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<S: VersionedSnapshot> ReferenceCheck for RepositoryReference<S> {
    async fn exists(&self, id: Uuid) -> Result<bool, DomainError> {
        Ok(self.repository.find(id).await?.is_some())
    }
}

/// Cascade handle a root-aggregate store invokes when its root is deleted.
#[async_trait]
pub trait ContextPurge: Send + Sync {
    /// Context name used in cascade logs.
    fn context(&self) -> &'static str;

    /// Deletes every row the context keeps for the root context.
    ///
    /// # Errors
    ///
    /// Returns persistence errors only.
    async fn purge_root_context(&self, root_context: Uuid) -> Result<u64, DomainError>;
}

/// Adapts a snapshot repository into a [`ContextPurge`] for cascades.
pub struct RepositoryPurge<S: VersionedSnapshot> {
    context: &'static str,
    repository: Arc<dyn SnapshotRepository<S>>,
}

impl<S: VersionedSnapshot> RepositoryPurge<S> {
    /// Wraps the repository under the given context name.
    #[must_use]
    pub fn new(context: &'static str, repository: Arc<dyn SnapshotRepository<S>>) -> Self {
        Self {
            context,
            repository,
        }
    }
}

#[async_trait]
impl<S: VersionedSnapshot> ContextPurge for RepositoryPurge<S> {
    fn context(&self) -> &'static str {
        self.context
    }

    async fn purge_root_context(&self, root_context: Uuid) -> Result<u64, DomainError> {
        self.repository.delete_by_root_context(root_context).await
    }
}
