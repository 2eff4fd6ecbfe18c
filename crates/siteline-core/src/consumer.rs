//! Consumer-side ports: delivered records, the processor seam, the
//! transaction buffer and the transport acknowledgment.
//!
//! The transport delivers records of one routing key strictly in order and
//! at least once. Everything here is an abstraction; the engine logic that
//! drives these ports lives in `siteline-event-consumer`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::identity::{EventEnvelope, RoutingKey};

/// One record as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord<P> {
    /// The enveloped event.
    pub envelope: EventEnvelope<P>,
    /// Transport position within the routing key's partition. Used for
    /// buffer de-duplication and offset commit.
    pub offset: i64,
}

impl<P> EventRecord<P> {
    /// Wraps an envelope with its transport position.
    #[must_use]
    pub fn new(envelope: EventEnvelope<P>, offset: i64) -> Self {
        Self { envelope, offset }
    }

    /// The partition this record was delivered on.
    #[must_use]
    pub fn routing_key(&self) -> RoutingKey {
        self.envelope.key.routing_key()
    }
}

/// Payload-level queries the engine needs from a concrete event model.
pub trait StreamPayload: Send + Sync {
    /// Whether this payload is a started marker opening a data-only
    /// transaction — one whose replay updates snapshot state but
    /// propagates no side effects.
    fn is_data_only_transaction(&self) -> bool {
        false
    }
}

/// What a consuming service plugs into the transaction manager.
///
/// The manager calls exactly one hook per delivered record; records
/// buffered inside a business transaction additionally reappear in
/// [`on_transaction_finished`](Self::on_transaction_finished) for the
/// atomic replay.
#[async_trait]
pub trait EventProcessor<P: Send + Sync>: Send + Sync {
    /// Name used in logs.
    fn processor_name(&self) -> &'static str;

    /// An ordinary record outside any business transaction.
    ///
    /// # Errors
    ///
    /// An error aborts the record's unit of work; the transport
    /// redelivers it.
    async fn on_non_transactional_event(&self, record: &EventRecord<P>)
    -> Result<(), DomainError>;

    /// A record buffered inside an open business transaction. No snapshot
    /// state changes here; the replay happens on the finished marker.
    ///
    /// # Errors
    ///
    /// An error aborts the record's unit of work.
    async fn on_transactional_event(&self, record: &EventRecord<P>) -> Result<(), DomainError> {
        let _ = record;
        Ok(())
    }

    /// A started marker opened a business transaction on its key.
    ///
    /// # Errors
    ///
    /// An error aborts the record's unit of work.
    async fn on_transaction_started(&self, record: &EventRecord<P>) -> Result<(), DomainError> {
        let _ = record;
        Ok(())
    }

    /// A finished marker closed the transaction: replay `events` in their
    /// original arrival order as one atomic unit.
    ///
    /// # Errors
    ///
    /// An error aborts the whole transaction's unit of work; nothing is
    /// acknowledged and the transport redelivers the transaction.
    async fn on_transaction_finished(
        &self,
        started: &EventRecord<P>,
        events: &[EventRecord<P>],
        finished: &EventRecord<P>,
    ) -> Result<(), DomainError>;
}

/// Durable buffer for the events of open business transactions.
///
/// `save` must be idempotent per `(transaction_id, offset)` so that
/// redelivered records do not buffer twice.
#[async_trait]
pub trait TransactionBufferRepository<P: Send + Sync>: Send + Sync {
    /// Buffers one record under the transaction.
    ///
    /// # Errors
    ///
    /// Returns persistence errors only.
    async fn save(&self, transaction_id: Uuid, record: &EventRecord<P>)
    -> Result<(), DomainError>;

    /// All buffered records of the transaction in arrival (offset) order.
    ///
    /// # Errors
    ///
    /// Returns persistence errors only.
    async fn load(&self, transaction_id: Uuid) -> Result<Vec<EventRecord<P>>, DomainError>;

    /// Drops the transaction's buffer after a successful replay.
    ///
    /// # Errors
    ///
    /// Returns persistence errors only.
    async fn delete(&self, transaction_id: Uuid) -> Result<(), DomainError>;

    /// Transactions that still hold buffered events, oldest first. An
    /// entry lingering here is an operational alert — the engine itself
    /// never times a transaction out.
    ///
    /// # Errors
    ///
    /// Returns persistence errors only.
    async fn open_transactions(&self) -> Result<Vec<Uuid>, DomainError>;
}

/// Transport acknowledgment. The engine commits an offset only after the
/// durable, successful application of everything at or before it.
#[async_trait]
pub trait OffsetCommit: Send + Sync {
    /// Acknowledges the record at `offset` on the given partition.
    ///
    /// # Errors
    ///
    /// Returns transport errors only.
    async fn commit(&self, key: RoutingKey, offset: i64) -> Result<(), DomainError>;
}

/// Outbound side-effect hook, invoked once per applied record.
///
/// Downstream read-model builders (news feeds, notifications, calendar
/// exports) subscribe here instead of coupling to the snapshot stores.
#[async_trait]
pub trait ChangeListener<P: Send + Sync>: Send + Sync {
    /// One record was applied to the local snapshot state.
    ///
    /// # Errors
    ///
    /// An error aborts the surrounding unit of work.
    async fn on_applied(&self, record: &EventRecord<P>) -> Result<(), DomainError>;
}
