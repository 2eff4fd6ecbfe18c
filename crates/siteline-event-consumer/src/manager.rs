//! Business transaction manager — parks records framed by marker records
//! in a durable buffer and replays the run atomically on the finished
//! marker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use siteline_core::consumer::{EventProcessor, EventRecord, TransactionBufferRepository};
use siteline_core::error::DomainError;
use siteline_core::identity::{EventKey, RoutingKey};
use tracing::{debug, info};
use uuid::Uuid;

/// What the manager decided about one delivered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The record's unit of work is complete; its offset may be committed.
    Completed,
    /// The record belongs to an open business transaction; its offset must
    /// stay uncommitted until the transaction replays.
    Buffered,
}

/// Routes delivered records through the business transaction protocol.
///
/// Outside a transaction records pass straight through to the processor.
/// A started marker opens a transaction on its routing key; every record
/// after it is parked in the durable buffer until the matching finished
/// marker triggers the atomic replay. Redelivered markers are recognized
/// and skipped, and redelivered middle records de-duplicate by offset in
/// the buffer.
///
/// The manager keeps no timer: a transaction stays open until its
/// finished marker arrives, and [`open_transactions`](Self::open_transactions)
/// exposes lingering ones for operational monitoring.
pub struct ConsumerTransactionManager<P> {
    buffer: Arc<dyn TransactionBufferRepository<P>>,
    open: Mutex<HashMap<RoutingKey, Uuid>>,
}

impl<P: Send + Sync> ConsumerTransactionManager<P> {
    /// Creates a manager over the given durable buffer.
    #[must_use]
    pub fn new(buffer: Arc<dyn TransactionBufferRepository<P>>) -> Self {
        Self {
            buffer,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Routes one delivered record.
    ///
    /// # Errors
    ///
    /// Propagates processor and buffer errors; the caller must leave the
    /// record's offset uncommitted so the transport redelivers it.
    /// Returns `TransactionViolation` when a marker breaks the per-key
    /// protocol.
    pub async fn process(
        &self,
        record: &EventRecord<P>,
        processor: &dyn EventProcessor<P>,
    ) -> Result<Disposition, DomainError> {
        match &record.envelope.key {
            EventKey::TransactionStarted {
                transaction_id,
                routing_key,
            } => {
                self.on_started(*transaction_id, *routing_key, record, processor)
                    .await
            }
            EventKey::TransactionFinished {
                transaction_id,
                routing_key,
            } => {
                self.on_finished(*transaction_id, *routing_key, record, processor)
                    .await
            }
            EventKey::AggregateEvent { .. } => self.on_event(record, processor).await,
        }
    }

    /// Transactions that still hold buffered rows, oldest first. An entry
    /// lingering here means a producer never emitted its finished marker.
    ///
    /// # Errors
    ///
    /// Returns persistence errors only.
    pub async fn open_transactions(&self) -> Result<Vec<Uuid>, DomainError> {
        self.buffer.open_transactions().await
    }

    async fn on_event(
        &self,
        record: &EventRecord<P>,
        processor: &dyn EventProcessor<P>,
    ) -> Result<Disposition, DomainError> {
        match self.currently_open(record.routing_key()) {
            Some(transaction_id) => {
                self.buffer.save(transaction_id, record).await?;
                processor.on_transactional_event(record).await?;
                Ok(Disposition::Buffered)
            }
            None => {
                processor.on_non_transactional_event(record).await?;
                Ok(Disposition::Completed)
            }
        }
    }

    async fn on_started(
        &self,
        transaction_id: Uuid,
        key: RoutingKey,
        record: &EventRecord<P>,
        processor: &dyn EventProcessor<P>,
    ) -> Result<Disposition, DomainError> {
        match self.currently_open(key) {
            Some(open) if open == transaction_id => {
                debug!(transaction = %transaction_id, "duplicate started marker, already buffering");
                Ok(Disposition::Buffered)
            }
            Some(open) => Err(DomainError::TransactionViolation(format!(
                "transaction {transaction_id} started on key {key} while {open} is still open"
            ))),
            None => {
                // The started marker itself becomes the first buffer row,
                // so a restarted consumer can reconstruct the whole run.
                self.buffer.save(transaction_id, record).await?;
                processor.on_transaction_started(record).await?;
                self.mark_open(key, transaction_id);
                debug!(
                    processor = processor.processor_name(),
                    transaction = %transaction_id,
                    key = %key,
                    "business transaction started"
                );
                Ok(Disposition::Buffered)
            }
        }
    }

    async fn on_finished(
        &self,
        transaction_id: Uuid,
        key: RoutingKey,
        record: &EventRecord<P>,
        processor: &dyn EventProcessor<P>,
    ) -> Result<Disposition, DomainError> {
        let rows = self.buffer.load(transaction_id).await?;
        match self.currently_open(key) {
            Some(open) if open != transaction_id => {
                return Err(DomainError::TransactionViolation(format!(
                    "finished marker for transaction {transaction_id} on key {key} while {open} is still open"
                )));
            }
            Some(_) => {}
            None if rows.is_empty() => {
                debug!(transaction = %transaction_id, "duplicate finished marker, transaction already replayed");
                return Ok(Disposition::Completed);
            }
            None => {
                info!(transaction = %transaction_id, "resuming business transaction from the durable buffer");
            }
        }

        let Some((started, events)) = rows.split_first() else {
            return Err(DomainError::TransactionViolation(format!(
                "transaction {transaction_id} finished with an empty buffer"
            )));
        };
        let begins_with_own_started = matches!(
            &started.envelope.key,
            EventKey::TransactionStarted { transaction_id: id, .. } if *id == transaction_id
        );
        if !begins_with_own_started {
            return Err(DomainError::TransactionViolation(format!(
                "buffer for transaction {transaction_id} does not begin with its started marker"
            )));
        }

        info!(
            processor = processor.processor_name(),
            transaction = %transaction_id,
            events = events.len(),
            "replaying business transaction"
        );
        processor
            .on_transaction_finished(started, events, record)
            .await?;
        self.buffer.delete(transaction_id).await?;
        self.clear_open(key);
        Ok(Disposition::Completed)
    }

    fn currently_open(&self, key: RoutingKey) -> Option<Uuid> {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied()
    }

    fn mark_open(&self, key: RoutingKey, transaction_id: Uuid) {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, transaction_id);
    }

    fn clear_open(&self, key: RoutingKey) {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
    }
}
