//! Consumer-port mocks — the in-memory transaction buffer and recording
//! implementations of the outbound ports.

use std::sync::Mutex;

use async_trait::async_trait;
use siteline_core::command::EventPublisher;
use siteline_core::consumer::{
    ChangeListener, EventRecord, OffsetCommit, TransactionBufferRepository,
};
use siteline_core::error::DomainError;
use siteline_core::identity::{EventEnvelope, RoutingKey};
use uuid::Uuid;

/// A transaction buffer backed by a `Vec`, idempotent per
/// `(transaction_id, offset)` like the PostgreSQL implementation.
#[derive(Debug)]
pub struct InMemoryTransactionBuffer<P> {
    rows: Mutex<Vec<(Uuid, EventRecord<P>)>>,
}

impl<P> Default for InMemoryTransactionBuffer<P> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }
}

impl<P> InMemoryTransactionBuffer<P> {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffered rows across all transactions.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Whether nothing is buffered.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl<P: Clone + Send + Sync + 'static> TransactionBufferRepository<P>
    for InMemoryTransactionBuffer<P>
{
    async fn save(&self, transaction_id: Uuid, record: &EventRecord<P>) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().unwrap();
        let duplicate = rows
            .iter()
            .any(|(id, existing)| *id == transaction_id && existing.offset == record.offset);
        if !duplicate {
            rows.push((transaction_id, record.clone()));
        }
        Ok(())
    }

    async fn load(&self, transaction_id: Uuid) -> Result<Vec<EventRecord<P>>, DomainError> {
        let rows = self.rows.lock().unwrap();
        let mut records: Vec<EventRecord<P>> = rows
            .iter()
            .filter(|(id, _)| *id == transaction_id)
            .map(|(_, record)| record.clone())
            .collect();
        records.sort_by_key(|record| record.offset);
        Ok(records)
    }

    async fn delete(&self, transaction_id: Uuid) -> Result<(), DomainError> {
        self.rows
            .lock()
            .unwrap()
            .retain(|(id, _)| *id != transaction_id);
        Ok(())
    }

    async fn open_transactions(&self) -> Result<Vec<Uuid>, DomainError> {
        let rows = self.rows.lock().unwrap();
        let mut open = Vec::new();
        for (id, _) in rows.iter() {
            if !open.contains(id) {
                open.push(*id);
            }
        }
        Ok(open)
    }
}

/// An offset commit that records every acknowledged `(key, offset)` pair.
#[derive(Debug, Default)]
pub struct RecordingOffsetCommit {
    committed: Mutex<Vec<(RoutingKey, i64)>>,
}

impl RecordingOffsetCommit {
    /// Creates a commit recorder with nothing acknowledged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All acknowledged offsets in commit order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn committed(&self) -> Vec<(RoutingKey, i64)> {
        self.committed.lock().unwrap().clone()
    }

    /// The most recently acknowledged offset, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn last_offset(&self) -> Option<i64> {
        self.committed
            .lock()
            .unwrap()
            .last()
            .map(|(_, offset)| *offset)
    }
}

#[async_trait]
impl OffsetCommit for RecordingOffsetCommit {
    async fn commit(&self, key: RoutingKey, offset: i64) -> Result<(), DomainError> {
        self.committed.lock().unwrap().push((key, offset));
        Ok(())
    }
}

/// A change listener that records every record the pipeline reports as
/// applied.
#[derive(Debug)]
pub struct RecordingChangeListener<P> {
    applied: Mutex<Vec<EventRecord<P>>>,
}

impl<P> Default for RecordingChangeListener<P> {
    fn default() -> Self {
        Self {
            applied: Mutex::new(Vec::new()),
        }
    }
}

impl<P: Clone> RecordingChangeListener<P> {
    /// Creates a listener with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All applied records in notification order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn applied(&self) -> Vec<EventRecord<P>> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl<P: Clone + Send + Sync + 'static> ChangeListener<P> for RecordingChangeListener<P> {
    async fn on_applied(&self, record: &EventRecord<P>) -> Result<(), DomainError> {
        self.applied.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// An event publisher that records every published envelope and always
/// succeeds.
#[derive(Debug)]
pub struct RecordingEventPublisher<P> {
    published: Mutex<Vec<EventEnvelope<P>>>,
}

impl<P> Default for RecordingEventPublisher<P> {
    fn default() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
        }
    }
}

impl<P: Clone> RecordingEventPublisher<P> {
    /// Creates a publisher with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All published envelopes in publish order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn published(&self) -> Vec<EventEnvelope<P>> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl<P: Clone + Send + Sync + 'static> EventPublisher<P> for RecordingEventPublisher<P> {
    async fn publish(&self, envelope: EventEnvelope<P>) -> Result<(), DomainError> {
        self.published.lock().unwrap().push(envelope);
        Ok(())
    }
}
