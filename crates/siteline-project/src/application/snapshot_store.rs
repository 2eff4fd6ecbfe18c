//! Project snapshot store — projects the PROJECT stream into local rows
//! and cascades deletions across every context scoped to the project.

use std::sync::Arc;

use async_trait::async_trait;
use siteline_core::error::DomainError;
use siteline_core::identity::{EventEnvelope, EventKey};
use siteline_core::snapshot::{AggregateProjection, ContextPurge, SnapshotRepository};
use siteline_messages::{Payload, ProjectEvent, ProjectEventKind, aggregate_types};
use tracing::info;
use uuid::Uuid;

use crate::domain::snapshot::ProjectSnapshot;

/// Snapshot store of the Project context.
///
/// A deleted or tombstoned project takes everything scoped to it along:
/// the registered [`ContextPurge`] handles remove the other contexts'
/// rows, since those rows live in stores this one cannot reach directly.
pub struct ProjectSnapshotStore {
    repository: Arc<dyn SnapshotRepository<ProjectSnapshot>>,
    cascades: Vec<Arc<dyn ContextPurge>>,
}

impl ProjectSnapshotStore {
    /// Creates a store over the given repository with no cascades.
    #[must_use]
    pub fn new(repository: Arc<dyn SnapshotRepository<ProjectSnapshot>>) -> Self {
        Self {
            repository,
            cascades: Vec::new(),
        }
    }

    /// Registers a context whose rows go when a project goes.
    #[must_use]
    pub fn with_cascade(mut self, cascade: Arc<dyn ContextPurge>) -> Self {
        self.cascades.push(cascade);
        self
    }

    async fn delete_with_cascades(&self, project_id: Uuid) -> Result<(), DomainError> {
        self.repository.delete(project_id).await?;
        for cascade in &self.cascades {
            let removed = cascade.purge_root_context(project_id).await?;
            if removed > 0 {
                info!(
                    project = %project_id,
                    context = cascade.context(),
                    removed,
                    "cascaded project deletion"
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AggregateProjection<Payload> for ProjectSnapshotStore {
    type Snapshot = ProjectSnapshot;

    fn aggregate_type(&self) -> &'static str {
        aggregate_types::PROJECT
    }

    fn handles(&self, key: &EventKey, payload: &Payload) -> bool {
        key.aggregate()
            .is_some_and(|aggregate| aggregate.aggregate_type == aggregate_types::PROJECT)
            && payload.as_project().is_some()
    }

    fn is_deletion(&self, payload: &Payload) -> bool {
        payload
            .as_project()
            .is_some_and(|event| event.kind == ProjectEventKind::Deleted)
    }

    async fn find_current(&self, id: Uuid) -> Result<Option<ProjectSnapshot>, DomainError> {
        self.repository.find(id).await
    }

    async fn project(
        &self,
        envelope: &EventEnvelope<Payload>,
        current: Option<ProjectSnapshot>,
    ) -> Result<(), DomainError> {
        let aggregate = envelope.key.aggregate().ok_or_else(|| {
            DomainError::Storage("project store received a marker record".into())
        })?;
        let ProjectEvent { kind, data } = envelope
            .payload
            .as_ref()
            .and_then(Payload::as_project)
            .ok_or_else(|| {
                DomainError::Storage("project store received a foreign payload".into())
            })?;

        match (kind, current) {
            (ProjectEventKind::Deleted, Some(_)) => {
                self.delete_with_cascades(aggregate.id).await
            }
            (ProjectEventKind::Deleted, None) => Ok(()),
            (_, None) => {
                let snapshot = ProjectSnapshot::from_event(aggregate.id, aggregate.version, data);
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
        self.delete_with_cascades(id).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use siteline_core::snapshot::{RepositoryPurge, SnapshotStore, VersionedSnapshot};
    use siteline_test_support::{EventStreamBuilder, InMemorySnapshotRepository};

    use super::*;

    fn store_over(
        repository: &Arc<InMemorySnapshotRepository<ProjectSnapshot>>,
    ) -> ProjectSnapshotStore {
        ProjectSnapshotStore::new(
            Arc::clone(repository) as Arc<dyn SnapshotRepository<ProjectSnapshot>>
        )
    }

    #[tokio::test]
    async fn test_created_event_inserts_the_snapshot() {
        // Arrange
        let repository = Arc::new(InMemorySnapshotRepository::new());
        let store = store_over(&repository);
        let project = Uuid::new_v4();
        let records = EventStreamBuilder::new(project)
            .project_created("Harbor bridge")
            .build();

        // Act
        store.handle(&records[0].envelope).await.expect("applies");

        // Assert
        let snapshot = repository.get(project).expect("row exists");
        assert_eq!(snapshot.title, "Harbor bridge");
        assert_eq!(snapshot.version, 0);
        assert_eq!(snapshot.root_context(), project);
    }

    #[tokio::test]
    async fn test_updated_event_advances_the_snapshot() {
        // Arrange
        let repository = Arc::new(InMemorySnapshotRepository::new());
        let store = store_over(&repository);
        let project = Uuid::new_v4();
        let records = EventStreamBuilder::new(project)
            .project_created("Harbor bridge")
            .project_updated("Harbor bridge, phase 2")
            .build();

        // Act
        for record in &records {
            store.handle(&record.envelope).await.expect("applies");
        }

        // Assert
        let snapshot = repository.get(project).expect("row exists");
        assert_eq!(snapshot.title, "Harbor bridge, phase 2");
        assert_eq!(snapshot.version, 1);
    }

    #[tokio::test]
    async fn test_deleted_event_removes_the_row_and_cascades() {
        // Arrange
        let project_repository = Arc::new(InMemorySnapshotRepository::new());
        let task_repository: Arc<InMemorySnapshotRepository<ProjectSnapshot>> =
            Arc::new(InMemorySnapshotRepository::new());
        let project = Uuid::new_v4();
        // A row in another context scoped to the project under deletion.
        let scoped = ProjectSnapshot::from_event(
            project,
            0,
            &siteline_messages::ProjectData {
                audit: siteline_core::audit::AuditInfo::created(Uuid::new_v4(), Utc::now()),
                title: "scoped row".to_owned(),
                start_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                end_date: chrono::NaiveDate::from_ymd_opt(2026, 11, 27).unwrap(),
            },
        );
        task_repository.insert(&scoped).await.expect("preloaded");

        let store = store_over(&project_repository).with_cascade(Arc::new(RepositoryPurge::new(
            "tasks",
            Arc::clone(&task_repository) as Arc<dyn SnapshotRepository<ProjectSnapshot>>,
        )));
        let records = EventStreamBuilder::new(project)
            .project_created("Harbor bridge")
            .project_deleted()
            .build();

        // Act
        for record in &records {
            store.handle(&record.envelope).await.expect("applies");
        }

        // Assert
        assert!(project_repository.is_empty());
        assert!(task_repository.is_empty(), "cascade must purge scoped rows");
    }

    #[tokio::test]
    async fn test_tombstone_purges_unconditionally() {
        // Arrange
        let repository = Arc::new(InMemorySnapshotRepository::new());
        let store = store_over(&repository);
        let project = Uuid::new_v4();
        let records = EventStreamBuilder::new(project).project_tombstone().build();

        // Act: no row exists, the tombstone still succeeds.
        store
            .handle_tombstone(&records[0].envelope.key)
            .await
            .expect("tombstone for unknown project succeeds");

        // Assert
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn test_store_ignores_foreign_records() {
        // Arrange
        let repository = Arc::new(InMemorySnapshotRepository::new());
        let store = store_over(&repository);
        let records = EventStreamBuilder::new(Uuid::new_v4())
            .task_created(Uuid::new_v4(), "Pour foundation")
            .build();
        let envelope = &records[0].envelope;

        // Assert
        let payload = envelope.payload.as_ref().expect("payload");
        assert!(!SnapshotStore::handles(&store, &envelope.key, payload));
    }
}
