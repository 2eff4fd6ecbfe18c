//! Identity and envelope model of the replicated event stream.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Position of one event within one aggregate's stream.
///
/// Identity is the `(aggregate_type, id)` pair. `version` is 0 for the
/// creation event and increases by exactly 1 per subsequent event, so an
/// event at version `v` applies to a snapshot at version `v - 1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateIdentifier {
    /// Aggregate type discriminator, e.g. `PROJECT`.
    pub aggregate_type: String,
    /// Aggregate instance identifier.
    pub id: Uuid,
    /// Stream position this event occupies.
    pub version: i64,
}

impl AggregateIdentifier {
    /// Creates an identifier at the given stream position.
    #[must_use]
    pub fn new(aggregate_type: impl Into<String>, id: Uuid, version: i64) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            id,
            version,
        }
    }

    /// The same aggregate at a different stream position.
    #[must_use]
    pub fn at_version(&self, version: i64) -> Self {
        Self {
            aggregate_type: self.aggregate_type.clone(),
            id: self.id,
            version,
        }
    }
}

impl fmt::Display for AggregateIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.aggregate_type, self.id, self.version)
    }
}

/// Partition and ordering domain of an event.
///
/// The value is the root context identifier — the owning project. Ordering
/// guarantees hold only between events sharing a routing key, and the same
/// value scopes authorization checks downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingKey(pub Uuid);

impl RoutingKey {
    /// The root context (owning project) identifier.
    #[must_use]
    pub fn root_context(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Key of one record on the stream.
///
/// Aggregate events address a single stream position; the transaction
/// marker keys frame a business transaction on their routing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKey {
    /// An ordinary domain event for one aggregate.
    AggregateEvent {
        /// Stream position of the event.
        aggregate: AggregateIdentifier,
        /// Partition the event was delivered on.
        routing_key: RoutingKey,
    },
    /// Opens a business transaction on the routing key.
    TransactionStarted {
        /// Identifier shared by the matching finished marker.
        transaction_id: Uuid,
        /// Partition the transaction runs on.
        routing_key: RoutingKey,
    },
    /// Closes the business transaction opened under the same identifier.
    TransactionFinished {
        /// Identifier of the transaction being closed.
        transaction_id: Uuid,
        /// Partition the transaction runs on.
        routing_key: RoutingKey,
    },
}

impl EventKey {
    /// The partition this record was delivered on.
    #[must_use]
    pub fn routing_key(&self) -> RoutingKey {
        match self {
            Self::AggregateEvent { routing_key, .. }
            | Self::TransactionStarted { routing_key, .. }
            | Self::TransactionFinished { routing_key, .. } => *routing_key,
        }
    }

    /// The aggregate stream position, for aggregate events.
    #[must_use]
    pub fn aggregate(&self) -> Option<&AggregateIdentifier> {
        match self {
            Self::AggregateEvent { aggregate, .. } => Some(aggregate),
            _ => None,
        }
    }

    /// The business transaction identifier, for marker records.
    #[must_use]
    pub fn transaction_id(&self) -> Option<Uuid> {
        match self {
            Self::TransactionStarted { transaction_id, .. }
            | Self::TransactionFinished { transaction_id, .. } => Some(*transaction_id),
            Self::AggregateEvent { .. } => None,
        }
    }
}

/// One record of the replicated stream.
///
/// `payload` is `None` for tombstones: physical deletion signals emitted
/// after an aggregate was logically deleted, valid independent of any
/// version the local snapshot may be at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<P> {
    /// Routing and identity information.
    pub key: EventKey,
    /// Event payload; `None` marks a tombstone.
    pub payload: Option<P>,
    /// When the originating service emitted the event.
    pub timestamp: DateTime<Utc>,
}

impl<P> EventEnvelope<P> {
    /// Wraps a payload and key into an envelope.
    #[must_use]
    pub fn new(key: EventKey, payload: Option<P>, timestamp: DateTime<Utc>) -> Self {
        Self {
            key,
            payload,
            timestamp,
        }
    }

    /// Whether this record is a tombstone for an aggregate.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.payload.is_none() && self.key.aggregate().is_some()
    }
}
