//! Test repositories — in-memory `SnapshotRepository` implementations with
//! the same compare-and-swap semantics as the PostgreSQL ones.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use siteline_core::error::DomainError;
use siteline_core::snapshot::{SnapshotRepository, VersionedSnapshot};
use uuid::Uuid;

/// A snapshot repository backed by a `HashMap`.
///
/// `update` enforces the version compare-and-swap exactly like the
/// database-backed repositories, so lost-update and idempotency paths are
/// testable without a database.
#[derive(Debug)]
pub struct InMemorySnapshotRepository<S> {
    rows: Mutex<HashMap<Uuid, S>>,
}

impl<S> Default for InMemorySnapshotRepository<S> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }
}

impl<S: VersionedSnapshot> InMemorySnapshotRepository<S> {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository preloaded with the given rows.
    #[must_use]
    pub fn with_rows(rows: impl IntoIterator<Item = S>) -> Self {
        Self {
            rows: Mutex::new(
                rows.into_iter()
                    .map(|snapshot| (snapshot.identifier(), snapshot))
                    .collect(),
            ),
        }
    }

    /// Returns the stored row directly, bypassing the trait.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<S> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    /// Number of stored rows.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Whether no rows are stored.
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
impl<S: VersionedSnapshot> SnapshotRepository<S> for InMemorySnapshotRepository<S> {
    async fn find(&self, id: Uuid) -> Result<Option<S>, DomainError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn insert(&self, snapshot: &S) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&snapshot.identifier()) {
            return Err(DomainError::Storage(format!(
                "duplicate snapshot row {}",
                snapshot.identifier()
            )));
        }
        rows.insert(snapshot.identifier(), snapshot.clone());
        Ok(())
    }

    async fn update(&self, snapshot: &S, expected_version: i64) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get(&snapshot.identifier()) {
            None => Err(DomainError::AggregateNotFound(snapshot.identifier())),
            Some(existing) if existing.version() != expected_version => {
                Err(DomainError::ConcurrencyConflict {
                    aggregate_id: snapshot.identifier(),
                    required: expected_version,
                    encountered: existing.version(),
                })
            }
            Some(_) => {
                rows.insert(snapshot.identifier(), snapshot.clone());
                Ok(())
            }
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        self.rows.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn delete_by_root_context(&self, root_context: Uuid) -> Result<u64, DomainError> {
        let mut rows = self.rows.lock().unwrap();
        let mut removed = 0u64;
        rows.retain(|_, snapshot| {
            if snapshot.root_context() == root_context {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn find_by_root_context(&self, root_context: Uuid) -> Result<Vec<S>, DomainError> {
        let rows = self.rows.lock().unwrap();
        let mut found: Vec<S> = rows
            .values()
            .filter(|snapshot| snapshot.root_context() == root_context)
            .cloned()
            .collect();
        found.sort_by_key(S::identifier);
        Ok(found)
    }
}

/// A snapshot repository that always returns an infrastructure error.
/// Useful for testing replay abort paths.
#[derive(Debug)]
pub struct FailingSnapshotRepository;

#[async_trait]
impl<S: VersionedSnapshot> SnapshotRepository<S> for FailingSnapshotRepository {
    async fn find(&self, _id: Uuid) -> Result<Option<S>, DomainError> {
        Err(DomainError::Storage("connection refused".into()))
    }

    async fn insert(&self, _snapshot: &S) -> Result<(), DomainError> {
        Err(DomainError::Storage("connection refused".into()))
    }

    async fn update(&self, _snapshot: &S, _expected_version: i64) -> Result<(), DomainError> {
        Err(DomainError::Storage("connection refused".into()))
    }

    async fn delete(&self, _id: Uuid) -> Result<(), DomainError> {
        Err(DomainError::Storage("connection refused".into()))
    }

    async fn delete_by_root_context(&self, _root_context: Uuid) -> Result<u64, DomainError> {
        Err(DomainError::Storage("connection refused".into()))
    }

    async fn find_by_root_context(&self, _root_context: Uuid) -> Result<Vec<S>, DomainError> {
        Err(DomainError::Storage("connection refused".into()))
    }
}
