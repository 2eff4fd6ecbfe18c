//! Command handlers of the Task context — the write side.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use siteline_core::audit::AuditInfo;
use siteline_core::callback::{LifecycleCallbacks, LifecyclePoint};
use siteline_core::clock::Clock;
use siteline_core::command::{CommandHandler, CommandResult, EventPublisher, Outbox};
use siteline_core::error::DomainError;
use siteline_core::identity::{AggregateIdentifier, EventEnvelope, EventKey, RoutingKey};
use siteline_core::snapshot::{ReferenceCheck, SnapshotRepository, VersionedSnapshot};
use siteline_messages::{Payload, TaskEvent, TaskEventKind, TaskStatus, aggregate_types};
use uuid::Uuid;

use crate::domain::commands::{AssignTask, CloseTask, CreateTask, DeleteTask, UnassignTask};
use crate::domain::snapshot::TaskSnapshot;

fn task_envelope(
    snapshot: &TaskSnapshot,
    kind: TaskEventKind,
    at: DateTime<Utc>,
) -> EventEnvelope<Payload> {
    EventEnvelope::new(
        EventKey::AggregateEvent {
            aggregate: AggregateIdentifier::new(
                aggregate_types::TASK,
                snapshot.identifier,
                snapshot.version,
            ),
            routing_key: RoutingKey(snapshot.root_context()),
        },
        Some(Payload::Task(TaskEvent::new(kind, snapshot.to_data()))),
        at,
    )
}

/// Shared tail of every update-shaped task command: register the
/// post-update callback, write with the compare-and-swap, dispatch and
/// publish what the callback staged.
async fn persist_update(
    result: CommandResult<TaskSnapshot, Payload>,
    expected: i64,
    repository: &dyn SnapshotRepository<TaskSnapshot>,
    publisher: &dyn EventPublisher<Payload>,
    callbacks: &LifecycleCallbacks,
) -> Result<TaskSnapshot, DomainError> {
    let outbox = Arc::new(Outbox::new());
    let staged = Arc::clone(&outbox);
    let envelope = result.event.clone();
    let id = result.snapshot.identifier;
    callbacks.register(id, LifecyclePoint::PostUpdate, move || {
        staged.stage(envelope);
    })?;

    repository.update(&result.snapshot, expected).await?;
    callbacks.dispatch(id, LifecyclePoint::PostUpdate);
    for envelope in outbox.drain() {
        publisher.publish(envelope).await?;
    }
    Ok(result.snapshot)
}

/// Handles [`CreateTask`]: inserts the version-0 snapshot and publishes
/// the creation event once the insert succeeded.
///
/// # Errors
///
/// Returns `AggregateNotFound` when the project is unknown and
/// `PreconditionFailed` for a blank name.
pub async fn handle_create_task(
    command: &CreateTask,
    clock: &dyn Clock,
    repository: &dyn SnapshotRepository<TaskSnapshot>,
    projects: &dyn ReferenceCheck,
    publisher: &dyn EventPublisher<Payload>,
    callbacks: &LifecycleCallbacks,
) -> Result<TaskSnapshot, DomainError> {
    let result = async {
        if !projects.exists(command.project_id).await? {
            return Err(DomainError::AggregateNotFound(command.project_id));
        }
        let now = clock.now();
        let snapshot = TaskSnapshot {
            identifier: Uuid::new_v4(),
            version: 0,
            audit: AuditInfo::created(command.actor, now),
            project_id: command.project_id,
            name: command.name.clone(),
            status: TaskStatus::Open,
            assignee: None,
        };
        let result = CommandHandler::of(snapshot)
            .check_precondition(|s| !s.name.trim().is_empty(), "task name must not be blank")?
            .emit_current(|s| task_envelope(s, TaskEventKind::Created, now));

        let outbox = Arc::new(Outbox::new());
        let staged = Arc::clone(&outbox);
        let envelope = result.event.clone();
        callbacks.register(result.snapshot.identifier, LifecyclePoint::PostInsert, move || {
            staged.stage(envelope);
        })?;

        repository.insert(&result.snapshot).await?;
        callbacks.dispatch(result.snapshot.identifier, LifecyclePoint::PostInsert);
        for envelope in outbox.drain() {
            publisher.publish(envelope).await?;
        }
        Ok(result.snapshot)
    }
    .await;
    callbacks.discard_all();
    result
}

/// Handles [`AssignTask`].
///
/// # Errors
///
/// Returns `PreconditionFailed` when the task is already closed.
pub async fn handle_assign_task(
    command: &AssignTask,
    clock: &dyn Clock,
    repository: &dyn SnapshotRepository<TaskSnapshot>,
    publisher: &dyn EventPublisher<Payload>,
    callbacks: &LifecycleCallbacks,
) -> Result<TaskSnapshot, DomainError> {
    let result = async {
        let current = repository
            .find(command.task_id)
            .await?
            .ok_or(DomainError::AggregateNotFound(command.task_id))?;
        let expected = current.version;
        let result = CommandHandler::of(current)
            .assert_version_matches(command.expected_version)?
            .check_precondition(
                |s| s.status != TaskStatus::Closed,
                "a closed task cannot be assigned",
            )?
            .apply(|s| s.assignee = Some(command.assignee))
            .emit(command.actor, clock, |s, at| {
                task_envelope(s, TaskEventKind::Assigned, at)
            });
        persist_update(result, expected, repository, publisher, callbacks).await
    }
    .await;
    callbacks.discard_all();
    result
}

/// Handles [`UnassignTask`].
///
/// # Errors
///
/// Returns `PreconditionFailed` when the task has no assignee.
pub async fn handle_unassign_task(
    command: &UnassignTask,
    clock: &dyn Clock,
    repository: &dyn SnapshotRepository<TaskSnapshot>,
    publisher: &dyn EventPublisher<Payload>,
    callbacks: &LifecycleCallbacks,
) -> Result<TaskSnapshot, DomainError> {
    let result = async {
        let current = repository
            .find(command.task_id)
            .await?
            .ok_or(DomainError::AggregateNotFound(command.task_id))?;
        let expected = current.version;
        let result = CommandHandler::of(current)
            .assert_version_matches(command.expected_version)?
            .check_precondition(
                |s| s.assignee.is_some(),
                "task has no assignee to remove",
            )?
            .apply(|s| s.assignee = None)
            .emit(command.actor, clock, |s, at| {
                task_envelope(s, TaskEventKind::Unassigned, at)
            });
        persist_update(result, expected, repository, publisher, callbacks).await
    }
    .await;
    callbacks.discard_all();
    result
}

/// Handles [`CloseTask`].
///
/// # Errors
///
/// Returns `PreconditionFailed` when the task is already closed.
pub async fn handle_close_task(
    command: &CloseTask,
    clock: &dyn Clock,
    repository: &dyn SnapshotRepository<TaskSnapshot>,
    publisher: &dyn EventPublisher<Payload>,
    callbacks: &LifecycleCallbacks,
) -> Result<TaskSnapshot, DomainError> {
    let result = async {
        let current = repository
            .find(command.task_id)
            .await?
            .ok_or(DomainError::AggregateNotFound(command.task_id))?;
        let expected = current.version;
        let result = CommandHandler::of(current)
            .assert_version_matches(command.expected_version)?
            .check_precondition(|s| s.status != TaskStatus::Closed, "task is already closed")?
            .apply(|s| s.status = TaskStatus::Closed)
            .emit(command.actor, clock, |s, at| {
                task_envelope(s, TaskEventKind::Closed, at)
            });
        persist_update(result, expected, repository, publisher, callbacks).await
    }
    .await;
    callbacks.discard_all();
    result
}

/// Handles [`DeleteTask`]: publishes the deletion event and the trailing
/// tombstone, then removes the local row.
///
/// # Errors
///
/// Returns `AggregateNotFound` for an unknown task and
/// `ConcurrencyConflict` for a stale expected version.
pub async fn handle_delete_task(
    command: &DeleteTask,
    clock: &dyn Clock,
    repository: &dyn SnapshotRepository<TaskSnapshot>,
    publisher: &dyn EventPublisher<Payload>,
    callbacks: &LifecycleCallbacks,
) -> Result<(), DomainError> {
    let result = async {
        let current = repository
            .find(command.task_id)
            .await?
            .ok_or(DomainError::AggregateNotFound(command.task_id))?;
        let result = CommandHandler::of(current)
            .assert_version_matches(command.expected_version)?
            .emit(command.actor, clock, |s, at| {
                task_envelope(s, TaskEventKind::Deleted, at)
            });

        let outbox = Arc::new(Outbox::new());
        let staged = Arc::clone(&outbox);
        let envelope = result.event.clone();
        callbacks.register(command.task_id, LifecyclePoint::PreDelete, move || {
            staged.stage(envelope);
        })?;

        callbacks.dispatch(command.task_id, LifecyclePoint::PreDelete);
        repository.delete(command.task_id).await?;
        for envelope in outbox.drain() {
            publisher.publish(envelope).await?;
        }

        let tombstone = CommandHandler::of(result.snapshot)
            .emit_tombstone::<Payload>(clock, aggregate_types::TASK);
        publisher.publish(tombstone.event).await?;
        Ok(())
    }
    .await;
    callbacks.discard_all();
    result
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use siteline_test_support::{
        FixedClock, InMemorySnapshotRepository, RecordingEventPublisher,
    };

    use super::*;

    struct AnyProject;

    #[async_trait]
    impl ReferenceCheck for AnyProject {
        async fn exists(&self, _id: Uuid) -> Result<bool, DomainError> {
            Ok(true)
        }
    }

    struct NoProject;

    #[async_trait]
    impl ReferenceCheck for NoProject {
        async fn exists(&self, _id: Uuid) -> Result<bool, DomainError> {
            Ok(false)
        }
    }

    async fn created_task(
        repository: &InMemorySnapshotRepository<TaskSnapshot>,
        publisher: &RecordingEventPublisher<Payload>,
        callbacks: &LifecycleCallbacks,
        actor: Uuid,
    ) -> TaskSnapshot {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 2, 10, 8, 0, 0).unwrap());
        handle_create_task(
            &CreateTask {
                actor,
                project_id: Uuid::new_v4(),
                name: "Pour foundation".to_owned(),
            },
            &clock,
            repository,
            &AnyProject,
            publisher,
            callbacks,
        )
        .await
        .expect("create succeeds")
    }

    #[tokio::test]
    async fn test_create_for_unknown_project_is_rejected() {
        // Arrange
        let clock = FixedClock(Utc::now());
        let repository = InMemorySnapshotRepository::new();
        let publisher = RecordingEventPublisher::new();
        let callbacks = LifecycleCallbacks::new();
        let project_id = Uuid::new_v4();

        // Act
        let result = handle_create_task(
            &CreateTask {
                actor: Uuid::new_v4(),
                project_id,
                name: "Pour foundation".to_owned(),
            },
            &clock,
            &repository,
            &NoProject,
            &publisher,
            &callbacks,
        )
        .await;

        // Assert
        match result {
            Err(DomainError::AggregateNotFound(id)) => assert_eq!(id, project_id),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_assign_then_unassign_round_trips_the_assignee() {
        // Arrange
        let clock = FixedClock(Utc::now());
        let repository = InMemorySnapshotRepository::new();
        let publisher = RecordingEventPublisher::new();
        let callbacks = LifecycleCallbacks::new();
        let actor = Uuid::new_v4();
        let task = created_task(&repository, &publisher, &callbacks, actor).await;
        let assignee = Uuid::new_v4();

        // Act
        let assigned = handle_assign_task(
            &AssignTask {
                actor,
                task_id: task.identifier,
                expected_version: 0,
                assignee,
            },
            &clock,
            &repository,
            &publisher,
            &callbacks,
        )
        .await
        .expect("assign succeeds");
        let unassigned = handle_unassign_task(
            &UnassignTask {
                actor,
                task_id: task.identifier,
                expected_version: 1,
            },
            &clock,
            &repository,
            &publisher,
            &callbacks,
        )
        .await
        .expect("unassign succeeds");

        // Assert
        assert_eq!(assigned.assignee, Some(assignee));
        assert_eq!(unassigned.assignee, None);
        assert_eq!(unassigned.version, 2);
        assert_eq!(publisher.published().len(), 3);
    }

    #[tokio::test]
    async fn test_unassign_without_assignee_is_a_precondition_failure() {
        // Arrange
        let clock = FixedClock(Utc::now());
        let repository = InMemorySnapshotRepository::new();
        let publisher = RecordingEventPublisher::new();
        let callbacks = LifecycleCallbacks::new();
        let actor = Uuid::new_v4();
        let task = created_task(&repository, &publisher, &callbacks, actor).await;

        // Act
        let result = handle_unassign_task(
            &UnassignTask {
                actor,
                task_id: task.identifier,
                expected_version: 0,
            },
            &clock,
            &repository,
            &publisher,
            &callbacks,
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::PreconditionFailed(_))));
        let stored = repository.get(task.identifier).expect("row exists");
        assert_eq!(stored.version, 0, "failed command must not advance the snapshot");
    }

    #[tokio::test]
    async fn test_closing_an_already_closed_task_is_a_precondition_failure() {
        // Arrange
        let clock = FixedClock(Utc::now());
        let repository = InMemorySnapshotRepository::new();
        let publisher = RecordingEventPublisher::new();
        let callbacks = LifecycleCallbacks::new();
        let actor = Uuid::new_v4();
        let task = created_task(&repository, &publisher, &callbacks, actor).await;
        handle_close_task(
            &CloseTask {
                actor,
                task_id: task.identifier,
                expected_version: 0,
            },
            &clock,
            &repository,
            &publisher,
            &callbacks,
        )
        .await
        .expect("first close succeeds");

        // Act
        let result = handle_close_task(
            &CloseTask {
                actor,
                task_id: task.identifier,
                expected_version: 1,
            },
            &clock,
            &repository,
            &publisher,
            &callbacks,
        )
        .await;

        // Assert
        match result {
            Err(DomainError::PreconditionFailed(message)) => {
                assert_eq!(message, "task is already closed");
            }
            other => panic!("expected PreconditionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_publishes_deletion_and_tombstone() {
        // Arrange
        let clock = FixedClock(Utc::now());
        let repository = InMemorySnapshotRepository::new();
        let publisher = RecordingEventPublisher::new();
        let callbacks = LifecycleCallbacks::new();
        let actor = Uuid::new_v4();
        let task = created_task(&repository, &publisher, &callbacks, actor).await;

        // Act
        handle_delete_task(
            &DeleteTask {
                actor,
                task_id: task.identifier,
                expected_version: 0,
            },
            &clock,
            &repository,
            &publisher,
            &callbacks,
        )
        .await
        .expect("delete succeeds");

        // Assert
        assert!(repository.is_empty());
        let published = publisher.published();
        assert_eq!(published.len(), 3);
        let deleted = published[1].payload.as_ref().and_then(Payload::as_task);
        assert_eq!(deleted.map(|e| e.kind), Some(TaskEventKind::Deleted));
        assert!(published[2].is_tombstone());
    }
}
