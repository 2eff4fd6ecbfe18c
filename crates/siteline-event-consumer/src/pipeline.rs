//! Replication pipeline — drives delivered records through the
//! transaction manager into the snapshot stores and change listeners.

use std::sync::Arc;

use async_trait::async_trait;
use siteline_core::consumer::{
    ChangeListener, EventProcessor, EventRecord, OffsetCommit, StreamPayload,
    TransactionBufferRepository,
};
use siteline_core::error::DomainError;
use siteline_core::snapshot::SnapshotStore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::manager::{ConsumerTransactionManager, Disposition};

/// One consumer's full record path: business transaction handling,
/// snapshot application and side-effect fan-out, with transport offsets
/// committed only after durable success.
///
/// Every record is offered to each registered store that claims it; a
/// record no store claims still completes and commits, so unknown event
/// kinds never wedge the partition.
pub struct ReplicationPipeline<P> {
    manager: ConsumerTransactionManager<P>,
    offsets: Arc<dyn OffsetCommit>,
    stores: Vec<Arc<dyn SnapshotStore<P>>>,
    listeners: Vec<Arc<dyn ChangeListener<P>>>,
}

impl<P> ReplicationPipeline<P>
where
    P: StreamPayload + Clone + Send + Sync + 'static,
{
    /// Creates a pipeline over the given durable buffer and offset sink.
    #[must_use]
    pub fn new(
        buffer: Arc<dyn TransactionBufferRepository<P>>,
        offsets: Arc<dyn OffsetCommit>,
    ) -> Self {
        Self {
            manager: ConsumerTransactionManager::new(buffer),
            offsets,
            stores: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Registers a snapshot store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SnapshotStore<P>>) -> Self {
        self.stores.push(store);
        self
    }

    /// Registers a change listener, notified once per applied record.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn ChangeListener<P>>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Processes one delivered record and commits its offset when its
    /// unit of work completed.
    ///
    /// # Errors
    ///
    /// Propagates the first store, listener, buffer or transport error.
    /// The offset stays uncommitted, so the transport redelivers the
    /// record; stores tolerate the resulting duplicate application.
    pub async fn process(&self, record: EventRecord<P>) -> Result<(), DomainError> {
        let key = record.routing_key();
        let offset = record.offset;
        match self.manager.process(&record, self).await {
            Ok(Disposition::Completed) => self.offsets.commit(key, offset).await,
            Ok(Disposition::Buffered) => Ok(()),
            Err(error) => {
                match &error {
                    DomainError::DanglingReference { .. } => warn!(
                        %error,
                        offset,
                        "record references an aggregate that has not been replicated, retrying on redelivery"
                    ),
                    _ => error!(%error, offset, "record processing failed"),
                }
                Err(error)
            }
        }
    }

    /// Processes records in delivery order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Propagates the first processing error.
    pub async fn process_all(&self, records: Vec<EventRecord<P>>) -> Result<(), DomainError> {
        for record in records {
            self.process(record).await?;
        }
        Ok(())
    }

    /// Business transactions that still hold buffered records, oldest
    /// first. Surfaced on the consumer's health endpoint.
    ///
    /// # Errors
    ///
    /// Returns persistence errors only.
    pub async fn open_transactions(&self) -> Result<Vec<Uuid>, DomainError> {
        self.manager.open_transactions().await
    }

    async fn apply_record(&self, record: &EventRecord<P>, notify: bool) -> Result<(), DomainError> {
        let envelope = &record.envelope;
        if envelope.is_tombstone() {
            for store in &self.stores {
                if store.handles_tombstone(&envelope.key) {
                    store.handle_tombstone(&envelope.key).await?;
                }
            }
        } else if let Some(payload) = envelope.payload.as_ref() {
            for store in &self.stores {
                if store.handles(&envelope.key, payload) {
                    store.handle(envelope).await?;
                }
            }
        }
        if notify {
            for listener in &self.listeners {
                listener.on_applied(record).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<P> EventProcessor<P> for ReplicationPipeline<P>
where
    P: StreamPayload + Clone + Send + Sync + 'static,
{
    fn processor_name(&self) -> &'static str {
        "replication-pipeline"
    }

    async fn on_non_transactional_event(&self, record: &EventRecord<P>) -> Result<(), DomainError> {
        self.apply_record(record, true).await
    }

    async fn on_transaction_finished(
        &self,
        started: &EventRecord<P>,
        events: &[EventRecord<P>],
        finished: &EventRecord<P>,
    ) -> Result<(), DomainError> {
        let data_only = started
            .envelope
            .payload
            .as_ref()
            .is_some_and(StreamPayload::is_data_only_transaction);
        if data_only {
            info!(
                transaction = ?started.envelope.key.transaction_id(),
                "data-only transaction, replaying without side effects"
            );
        }
        for record in std::iter::once(started)
            .chain(events.iter())
            .chain(std::iter::once(finished))
        {
            self.apply_record(record, !data_only).await?;
        }
        Ok(())
    }
}
