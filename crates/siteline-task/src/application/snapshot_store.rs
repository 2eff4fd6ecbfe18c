//! Task snapshot store — projects the TASK stream into local rows.

use std::sync::Arc;

use async_trait::async_trait;
use siteline_core::error::DomainError;
use siteline_core::identity::{EventEnvelope, EventKey};
use siteline_core::snapshot::{AggregateProjection, ReferenceCheck, SnapshotRepository};
use siteline_messages::{Payload, TaskEvent, TaskEventKind, aggregate_types};
use uuid::Uuid;

use crate::domain::snapshot::TaskSnapshot;

/// Snapshot store of the Task context.
///
/// A task's first event requires its project to have been replicated
/// already. A project cannot be placeholdered — nothing in a task event
/// could fill its mandatory fields — so a missing project surfaces as
/// [`DomainError::DanglingReference`] and the transport redelivers the
/// record once the project stream caught up.
pub struct TaskSnapshotStore {
    repository: Arc<dyn SnapshotRepository<TaskSnapshot>>,
    projects: Arc<dyn ReferenceCheck>,
}

impl TaskSnapshotStore {
    /// Creates a store over the given repository and project lookup.
    #[must_use]
    pub fn new(
        repository: Arc<dyn SnapshotRepository<TaskSnapshot>>,
        projects: Arc<dyn ReferenceCheck>,
    ) -> Self {
        Self {
            repository,
            projects,
        }
    }
}

#[async_trait]
impl AggregateProjection<Payload> for TaskSnapshotStore {
    type Snapshot = TaskSnapshot;

    fn aggregate_type(&self) -> &'static str {
        aggregate_types::TASK
    }

    fn handles(&self, key: &EventKey, payload: &Payload) -> bool {
        key.aggregate()
            .is_some_and(|aggregate| aggregate.aggregate_type == aggregate_types::TASK)
            && payload.as_task().is_some()
    }

    fn is_deletion(&self, payload: &Payload) -> bool {
        payload
            .as_task()
            .is_some_and(|event| event.kind == TaskEventKind::Deleted)
    }

    async fn find_current(&self, id: Uuid) -> Result<Option<TaskSnapshot>, DomainError> {
        self.repository.find(id).await
    }

    async fn project(
        &self,
        envelope: &EventEnvelope<Payload>,
        current: Option<TaskSnapshot>,
    ) -> Result<(), DomainError> {
        let aggregate = envelope
            .key
            .aggregate()
            .ok_or_else(|| DomainError::Storage("task store received a marker record".into()))?;
        let TaskEvent { kind, data } = envelope
            .payload
            .as_ref()
            .and_then(Payload::as_task)
            .ok_or_else(|| DomainError::Storage("task store received a foreign payload".into()))?;

        match (kind, current) {
            (TaskEventKind::Deleted, Some(_)) => self.repository.delete(aggregate.id).await,
            (TaskEventKind::Deleted, None) => Ok(()),
            (_, None) => {
                if !self.projects.exists(data.project_id).await? {
                    return Err(DomainError::DanglingReference {
                        aggregate_type: aggregate_types::PROJECT.to_owned(),
                        referenced: data.project_id,
                    });
                }
                let snapshot = TaskSnapshot::from_event(aggregate.id, aggregate.version, data);
                self.repository.insert(&snapshot).await
            }
            (_, Some(mut snapshot)) => {
                let expected = snapshot.version;
                snapshot.apply_data(data);
                snapshot.version = aggregate.version;
                self.repository.update(&snapshot, expected).await
            }
        }
    }

    async fn purge(&self, id: Uuid) -> Result<(), DomainError> {
        self.repository.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use siteline_core::snapshot::SnapshotStore;
    use siteline_test_support::{EventStreamBuilder, InMemorySnapshotRepository};

    use super::*;

    struct KnownProjects(Vec<Uuid>);

    #[async_trait]
    impl ReferenceCheck for KnownProjects {
        async fn exists(&self, id: Uuid) -> Result<bool, DomainError> {
            Ok(self.0.contains(&id))
        }
    }

    fn store_over(
        repository: &Arc<InMemorySnapshotRepository<TaskSnapshot>>,
        known_projects: Vec<Uuid>,
    ) -> TaskSnapshotStore {
        TaskSnapshotStore::new(
            Arc::clone(repository) as Arc<dyn SnapshotRepository<TaskSnapshot>>,
            Arc::new(KnownProjects(known_projects)),
        )
    }

    #[tokio::test]
    async fn test_task_lifecycle_tracks_assignment_and_status() {
        // Arrange
        let repository = Arc::new(InMemorySnapshotRepository::new());
        let project = Uuid::new_v4();
        let store = store_over(&repository, vec![project]);
        let task = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let records = EventStreamBuilder::new(project)
            .task_created(task, "Pour foundation")
            .task_assigned(task, assignee)
            .task_closed(task)
            .build();

        // Act
        for record in &records {
            store.handle(&record.envelope).await.expect("applies");
        }

        // Assert
        let snapshot = repository.get(task).expect("row exists");
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.assignee, Some(assignee));
        assert_eq!(snapshot.status, siteline_messages::TaskStatus::Closed);
    }

    #[tokio::test]
    async fn test_task_for_unknown_project_is_a_dangling_reference() {
        // Arrange
        let repository = Arc::new(InMemorySnapshotRepository::new());
        let project = Uuid::new_v4();
        let store = store_over(&repository, Vec::new());
        let records = EventStreamBuilder::new(project)
            .task_created(Uuid::new_v4(), "Pour foundation")
            .build();

        // Act
        let result = store.handle(&records[0].envelope).await;

        // Assert
        match result {
            Err(DomainError::DanglingReference { referenced, .. }) => {
                assert_eq!(referenced, project);
            }
            other => panic!("expected DanglingReference, got {other:?}"),
        }
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_order_delivery_is_a_conflict_not_a_silent_apply() {
        // Arrange
        let repository = Arc::new(InMemorySnapshotRepository::new());
        let project = Uuid::new_v4();
        let store = store_over(&repository, vec![project]);
        let task = Uuid::new_v4();
        let records = EventStreamBuilder::new(project)
            .task_created(task, "Pour foundation")
            .task_assigned(task, Uuid::new_v4())
            .task_closed(task)
            .build();

        // Act: deliver v0 then v2, skipping v1.
        store.handle(&records[0].envelope).await.expect("applies");
        let result = store.handle(&records[2].envelope).await;

        // Assert
        assert!(matches!(result, Err(DomainError::ConcurrencyConflict { .. })));
        let snapshot = repository.get(task).expect("row exists");
        assert_eq!(snapshot.version, 0, "the gap must not be applied");
    }

    #[tokio::test]
    async fn test_deleted_event_removes_the_row() {
        // Arrange
        let repository = Arc::new(InMemorySnapshotRepository::new());
        let project = Uuid::new_v4();
        let store = store_over(&repository, vec![project]);
        let task = Uuid::new_v4();
        let records = EventStreamBuilder::new(project)
            .task_created(task, "Pour foundation")
            .task_deleted(task)
            .build();

        // Act
        for record in &records {
            store.handle(&record.envelope).await.expect("applies");
        }

        // Assert
        assert!(repository.is_empty());
    }
}
