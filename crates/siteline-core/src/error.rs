//! Replication error types.

use thiserror::Error;
use uuid::Uuid;

use crate::callback::LifecyclePoint;

/// Top-level error type of the replication engine.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate required by a command was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Optimistic concurrency conflict: the version the operation required
    /// does not match the version it encountered. Recoverable on the
    /// command side by refetching the snapshot and retrying; fatal during
    /// event replay, where it means the local snapshot and the stream
    /// disagree.
    #[error("concurrency conflict on aggregate {aggregate_id}: required version {required}, encountered {encountered}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The version the operation required.
        required: i64,
        /// The version it encountered instead.
        encountered: i64,
    },

    /// A command precondition did not hold. A client error; retrying the
    /// same command cannot succeed.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// A lifecycle callback slot was already occupied.
    #[error("duplicate {point} callback on entity {entity}")]
    DuplicateCallback {
        /// Entity the callback was registered for.
        entity: Uuid,
        /// Lifecycle point of the occupied slot.
        point: LifecyclePoint,
    },

    /// An event referenced an aggregate that has not been replicated
    /// locally. Logged and retried on the next delivery rather than
    /// dropped.
    #[error("dangling reference: {aggregate_type} {referenced} has not been replicated")]
    DanglingReference {
        /// Type of the missing aggregate.
        aggregate_type: String,
        /// Identifier of the missing aggregate.
        referenced: Uuid,
    },

    /// A business transaction marker arrived out of protocol on its
    /// routing key. The upstream per-key ordering makes this unreachable
    /// in a healthy stream, so it is fatal.
    #[error("business transaction violation: {0}")]
    TransactionViolation(String),

    /// An infrastructure/persistence error.
    #[error("storage error: {0}")]
    Storage(String),
}
