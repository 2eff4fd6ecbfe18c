//! Entity lifecycle callbacks around persistence writes.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use uuid::Uuid;

use crate::error::DomainError;

/// Persistence lifecycle points a callback can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePoint {
    /// After a snapshot row was inserted.
    PostInsert,
    /// Before a snapshot row is updated.
    PreUpdate,
    /// After a snapshot row was updated.
    PostUpdate,
    /// Before a snapshot row is deleted.
    PreDelete,
}

impl fmt::Display for LifecyclePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PostInsert => "post-insert",
            Self::PreUpdate => "pre-update",
            Self::PostUpdate => "post-update",
            Self::PreDelete => "pre-delete",
        };
        f.write_str(name)
    }
}

/// One-shot callback invoked around a persistence write.
pub type Callback = Box<dyn FnOnce() + Send>;

/// Pending lifecycle callbacks of one unit of work.
///
/// Holds at most one callback per `(entity, point)` slot. Dispatching
/// removes the callback before invoking it, so a lifecycle point firing
/// twice runs it at most once. Whatever never fired is discarded when the
/// unit of work completes.
#[derive(Default)]
pub struct LifecycleCallbacks {
    pending: Mutex<HashMap<(Uuid, LifecyclePoint), Callback>>,
}

impl LifecycleCallbacks {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for the entity at the given lifecycle point.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DuplicateCallback` when the slot is already
    /// occupied.
    pub fn register(
        &self,
        entity: Uuid,
        point: LifecyclePoint,
        callback: impl FnOnce() + Send + 'static,
    ) -> Result<(), DomainError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.contains_key(&(entity, point)) {
            return Err(DomainError::DuplicateCallback { entity, point });
        }
        pending.insert((entity, point), Box::new(callback));
        Ok(())
    }

    /// Fires the callback registered for the slot, if any.
    ///
    /// The callback is removed before it runs, so it cannot fire twice. A
    /// callback may register new callbacks while running.
    pub fn dispatch(&self, entity: Uuid, point: LifecyclePoint) {
        let callback = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(entity, point));
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Number of callbacks still waiting for their lifecycle point.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Discards every pending callback. Called when the enclosing unit of
    /// work completes so that no callback outlives it.
    pub fn discard_all(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl fmt::Debug for LifecycleCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleCallbacks")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_register_rejects_occupied_slot() {
        // Arrange
        let callbacks = LifecycleCallbacks::new();
        let entity = Uuid::new_v4();
        callbacks
            .register(entity, LifecyclePoint::PostInsert, || {})
            .expect("first registration succeeds");

        // Act
        let result = callbacks.register(entity, LifecyclePoint::PostInsert, || {});

        // Assert
        match result {
            Err(DomainError::DuplicateCallback { entity: e, point }) => {
                assert_eq!(e, entity);
                assert_eq!(point, LifecyclePoint::PostInsert);
            }
            other => panic!("expected DuplicateCallback, got {other:?}"),
        }
    }

    #[test]
    fn test_same_point_on_another_entity_is_allowed() {
        // Arrange
        let callbacks = LifecycleCallbacks::new();

        // Act
        let first = callbacks.register(Uuid::new_v4(), LifecyclePoint::PreDelete, || {});
        let second = callbacks.register(Uuid::new_v4(), LifecyclePoint::PreDelete, || {});

        // Assert
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(callbacks.pending(), 2);
    }

    #[test]
    fn test_dispatch_fires_at_most_once() {
        // Arrange
        let callbacks = LifecycleCallbacks::new();
        let entity = Uuid::new_v4();
        let fired = Arc::new(AtomicUsize::new(0));
        let probe = Arc::clone(&fired);
        callbacks
            .register(entity, LifecyclePoint::PostUpdate, move || {
                probe.fetch_add(1, Ordering::SeqCst);
            })
            .expect("registration succeeds");

        // Act
        callbacks.dispatch(entity, LifecyclePoint::PostUpdate);
        callbacks.dispatch(entity, LifecyclePoint::PostUpdate);

        // Assert
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(callbacks.pending(), 0);
    }

    #[test]
    fn test_dispatch_of_unregistered_point_is_a_no_op() {
        // Arrange
        let callbacks = LifecycleCallbacks::new();

        // Act + Assert: nothing panics, nothing fires
        callbacks.dispatch(Uuid::new_v4(), LifecyclePoint::PreUpdate);
    }

    #[test]
    fn test_discard_all_drops_unfired_callbacks() {
        // Arrange
        let callbacks = LifecycleCallbacks::new();
        let entity = Uuid::new_v4();
        let fired = Arc::new(AtomicUsize::new(0));
        let probe = Arc::clone(&fired);
        callbacks
            .register(entity, LifecyclePoint::PreDelete, move || {
                probe.fetch_add(1, Ordering::SeqCst);
            })
            .expect("registration succeeds");

        // Act
        callbacks.discard_all();
        callbacks.dispatch(entity, LifecyclePoint::PreDelete);

        // Assert
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(callbacks.pending(), 0);
    }

    #[test]
    fn test_callback_may_register_followup_while_running() {
        // Arrange
        let callbacks = Arc::new(LifecycleCallbacks::new());
        let entity = Uuid::new_v4();
        let inner = Arc::clone(&callbacks);
        callbacks
            .register(entity, LifecyclePoint::PreUpdate, move || {
                inner
                    .register(entity, LifecyclePoint::PostUpdate, || {})
                    .expect("follow-up registration succeeds");
            })
            .expect("registration succeeds");

        // Act
        callbacks.dispatch(entity, LifecyclePoint::PreUpdate);

        // Assert
        assert_eq!(callbacks.pending(), 1);
    }
}
