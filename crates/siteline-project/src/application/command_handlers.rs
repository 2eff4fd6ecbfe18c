//! Command handlers of the Project context — the write side.
//!
//! Each handler loads the current snapshot, runs the fluent command
//! guards, persists through the optimistic repository write and publishes
//! the emitted event through a lifecycle callback, so the publication
//! happens exactly once and only when the write succeeded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use siteline_core::audit::AuditInfo;
use siteline_core::callback::{LifecycleCallbacks, LifecyclePoint};
use siteline_core::clock::Clock;
use siteline_core::command::{CommandHandler, EventPublisher, Outbox};
use siteline_core::error::DomainError;
use siteline_core::identity::{AggregateIdentifier, EventEnvelope, EventKey, RoutingKey};
use siteline_core::snapshot::{SnapshotRepository, VersionedSnapshot};
use siteline_messages::{Payload, ProjectEvent, ProjectEventKind, aggregate_types};
use uuid::Uuid;

use crate::domain::commands::{CreateProject, DeleteProject, RenameProject};
use crate::domain::snapshot::ProjectSnapshot;

fn project_envelope(
    snapshot: &ProjectSnapshot,
    kind: ProjectEventKind,
    at: DateTime<Utc>,
) -> EventEnvelope<Payload> {
    EventEnvelope::new(
        EventKey::AggregateEvent {
            aggregate: AggregateIdentifier::new(
                aggregate_types::PROJECT,
                snapshot.identifier,
                snapshot.version,
            ),
            routing_key: RoutingKey(snapshot.root_context()),
        },
        Some(Payload::Project(ProjectEvent::new(kind, snapshot.to_data()))),
        at,
    )
}

/// Handles [`CreateProject`]: inserts the version-0 snapshot and publishes
/// the creation event once the insert succeeded.
///
/// # Errors
///
/// Returns `PreconditionFailed` for a blank title, otherwise persistence
/// or transport errors.
pub async fn handle_create_project(
    command: &CreateProject,
    clock: &dyn Clock,
    repository: &dyn SnapshotRepository<ProjectSnapshot>,
    publisher: &dyn EventPublisher<Payload>,
    callbacks: &LifecycleCallbacks,
) -> Result<ProjectSnapshot, DomainError> {
    let result = async {
        let now = clock.now();
        let snapshot = ProjectSnapshot {
            identifier: Uuid::new_v4(),
            version: 0,
            audit: AuditInfo::created(command.actor, now),
            title: command.title.clone(),
            start_date: command.start_date,
            end_date: command.end_date,
        };
        let result = CommandHandler::of(snapshot)
            .check_precondition(|s| !s.title.trim().is_empty(), "project title must not be blank")?
            .emit_current(|s| project_envelope(s, ProjectEventKind::Created, now));

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

/// Handles [`RenameProject`]: updates the snapshot through the
/// compare-and-swap write and publishes the update event.
///
/// # Errors
///
/// Returns `AggregateNotFound` for an unknown project,
/// `ConcurrencyConflict` for a stale expected version and
/// `PreconditionFailed` for a blank title.
pub async fn handle_rename_project(
    command: &RenameProject,
    clock: &dyn Clock,
    repository: &dyn SnapshotRepository<ProjectSnapshot>,
    publisher: &dyn EventPublisher<Payload>,
    callbacks: &LifecycleCallbacks,
) -> Result<ProjectSnapshot, DomainError> {
    let result = async {
        let current = repository
            .find(command.project_id)
            .await?
            .ok_or(DomainError::AggregateNotFound(command.project_id))?;
        let expected = current.version;
        let result = CommandHandler::of(current)
            .assert_version_matches(command.expected_version)?
            .check_precondition(
                |_| !command.title.trim().is_empty(),
                "project title must not be blank",
            )?
            .apply(|s| s.title = command.title.clone())
            .emit(command.actor, clock, |s, at| {
                project_envelope(s, ProjectEventKind::Updated, at)
            });

        let outbox = Arc::new(Outbox::new());
        let staged = Arc::clone(&outbox);
        let envelope = result.event.clone();
        callbacks.register(command.project_id, LifecyclePoint::PostUpdate, move || {
            staged.stage(envelope);
        })?;

        repository.update(&result.snapshot, expected).await?;
        callbacks.dispatch(command.project_id, LifecyclePoint::PostUpdate);
        for envelope in outbox.drain() {
            publisher.publish(envelope).await?;
        }
        Ok(result.snapshot)
    }
    .await;
    callbacks.discard_all();
    result
}

/// Handles [`DeleteProject`]: publishes the deletion event and the
/// trailing tombstone, then removes the local row.
///
/// # Errors
///
/// Returns `AggregateNotFound` for an unknown project and
/// `ConcurrencyConflict` for a stale expected version.
pub async fn handle_delete_project(
    command: &DeleteProject,
    clock: &dyn Clock,
    repository: &dyn SnapshotRepository<ProjectSnapshot>,
    publisher: &dyn EventPublisher<Payload>,
    callbacks: &LifecycleCallbacks,
) -> Result<(), DomainError> {
    let result = async {
        let current = repository
            .find(command.project_id)
            .await?
            .ok_or(DomainError::AggregateNotFound(command.project_id))?;
        let result = CommandHandler::of(current)
            .assert_version_matches(command.expected_version)?
            .emit(command.actor, clock, |s, at| {
                project_envelope(s, ProjectEventKind::Deleted, at)
            });

        let outbox = Arc::new(Outbox::new());
        let staged = Arc::clone(&outbox);
        let envelope = result.event.clone();
        callbacks.register(command.project_id, LifecyclePoint::PreDelete, move || {
            staged.stage(envelope);
        })?;

        callbacks.dispatch(command.project_id, LifecyclePoint::PreDelete);
        repository.delete(command.project_id).await?;
        for envelope in outbox.drain() {
            publisher.publish(envelope).await?;
        }

        // The tombstone follows the deletion event so consumers that only
        // keep the compacted stream still drop every trace.
        let tombstone = CommandHandler::of(result.snapshot)
            .emit_tombstone::<Payload>(clock, aggregate_types::PROJECT);
        publisher.publish(tombstone.event).await?;
        Ok(())
    }
    .await;
    callbacks.discard_all();
    result
}
