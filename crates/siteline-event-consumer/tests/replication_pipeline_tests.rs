//! End-to-end tests of the replication pipeline wired to the real
//! snapshot stores over in-memory repositories.

use std::sync::Arc;

use siteline_core::consumer::{EventRecord, TransactionBufferRepository};
use siteline_core::error::DomainError;
use siteline_core::snapshot::{
    PLACEHOLDER_VERSION, RepositoryPurge, RepositoryReference, SnapshotRepository,
};
use siteline_event_consumer::ReplicationPipeline;
use siteline_messages::{ParticipantRole, Payload, TaskStatus, TransactionKind};
use siteline_participant::{
    InvitationSnapshot, InvitationSnapshotStore, ParticipantSnapshot, ParticipantSnapshotStore,
};
use siteline_project::{ProjectSnapshot, ProjectSnapshotStore};
use siteline_task::{TaskSnapshot, TaskSnapshotStore};
use siteline_test_support::{
    EventStreamBuilder, InMemorySnapshotRepository, InMemoryTransactionBuffer,
    RecordingChangeListener, RecordingOffsetCommit, init_tracing,
};
use uuid::Uuid;

/// The full consumer assembly: every context store over shared in-memory
/// repositories, with project deletions cascading across all of them.
struct Engine {
    projects: Arc<InMemorySnapshotRepository<ProjectSnapshot>>,
    tasks: Arc<InMemorySnapshotRepository<TaskSnapshot>>,
    participants: Arc<InMemorySnapshotRepository<ParticipantSnapshot>>,
    invitations: Arc<InMemorySnapshotRepository<InvitationSnapshot>>,
    buffer: Arc<InMemoryTransactionBuffer<Payload>>,
    offsets: Arc<RecordingOffsetCommit>,
    listener: Arc<RecordingChangeListener<Payload>>,
    pipeline: ReplicationPipeline<Payload>,
}

impl Engine {
    fn new() -> Self {
        init_tracing();
        let projects = Arc::new(InMemorySnapshotRepository::new());
        let tasks = Arc::new(InMemorySnapshotRepository::new());
        let participants = Arc::new(InMemorySnapshotRepository::new());
        let invitations = Arc::new(InMemorySnapshotRepository::new());
        let buffer = Arc::new(InMemoryTransactionBuffer::new());
        let offsets = Arc::new(RecordingOffsetCommit::new());
        let listener = Arc::new(RecordingChangeListener::new());

        let projects_dyn =
            Arc::clone(&projects) as Arc<dyn SnapshotRepository<ProjectSnapshot>>;
        let tasks_dyn = Arc::clone(&tasks) as Arc<dyn SnapshotRepository<TaskSnapshot>>;
        let participants_dyn =
            Arc::clone(&participants) as Arc<dyn SnapshotRepository<ParticipantSnapshot>>;
        let invitations_dyn =
            Arc::clone(&invitations) as Arc<dyn SnapshotRepository<InvitationSnapshot>>;
        let project_lookup = Arc::new(RepositoryReference::new(Arc::clone(&projects_dyn)));

        let project_store = ProjectSnapshotStore::new(Arc::clone(&projects_dyn))
            .with_cascade(Arc::new(RepositoryPurge::new("task", Arc::clone(&tasks_dyn))))
            .with_cascade(Arc::new(RepositoryPurge::new(
                "participant",
                Arc::clone(&participants_dyn),
            )))
            .with_cascade(Arc::new(RepositoryPurge::new(
                "invitation",
                Arc::clone(&invitations_dyn),
            )));
        let task_store = TaskSnapshotStore::new(tasks_dyn, Arc::clone(&project_lookup) as _);
        let participant_store = ParticipantSnapshotStore::new(
            Arc::clone(&participants_dyn),
            Arc::clone(&project_lookup) as _,
        );
        let invitation_store =
            InvitationSnapshotStore::new(invitations_dyn, participants_dyn, project_lookup as _);

        let pipeline = ReplicationPipeline::new(
            Arc::clone(&buffer) as Arc<dyn TransactionBufferRepository<Payload>>,
            Arc::clone(&offsets) as _,
        )
        .with_store(Arc::new(project_store))
        .with_store(Arc::new(task_store))
        .with_store(Arc::new(participant_store))
        .with_store(Arc::new(invitation_store))
        .with_listener(Arc::clone(&listener) as _);

        Self {
            projects,
            tasks,
            participants,
            invitations,
            buffer,
            offsets,
            listener,
            pipeline,
        }
    }

    async fn run(&self, records: &[EventRecord<Payload>]) {
        for record in records {
            self.pipeline
                .process(record.clone())
                .await
                .expect("record applies");
        }
    }
}

// --- plain replication ---

#[tokio::test]
async fn test_full_stream_materializes_every_context() {
    // Arrange
    let engine = Engine::new();
    let project = Uuid::new_v4();
    let task = Uuid::new_v4();
    let participant = Uuid::new_v4();
    let invitation = Uuid::new_v4();
    let records = EventStreamBuilder::new(project)
        .project_created("Harbor bridge")
        .task_created(task, "Pour north footing")
        .invitation_created(invitation, participant, "foreman@example.com")
        .participant_created(participant, Uuid::new_v4(), ParticipantRole::Foreman)
        .task_assigned(task, participant)
        .build();

    // Act
    engine.run(&records).await;

    // Assert
    assert_eq!(engine.projects.get(project).expect("project exists").title, "Harbor bridge");
    let task_row = engine.tasks.get(task).expect("task exists");
    assert_eq!(task_row.assignee, Some(participant));
    assert_eq!(task_row.version, 1);
    assert_eq!(
        engine.participants.get(participant).expect("participant exists").version,
        0
    );
    assert!(engine.invitations.get(invitation).is_some());
    assert_eq!(engine.listener.applied().len(), 5);
    assert_eq!(engine.offsets.last_offset(), Some(4));
}

#[tokio::test]
async fn test_redelivered_record_applies_once_and_commits_again() {
    // Arrange
    let engine = Engine::new();
    let project = Uuid::new_v4();
    let records = EventStreamBuilder::new(project)
        .project_created("Harbor bridge")
        .project_updated("Harbor bridge, phase 2")
        .duplicate_last()
        .build();

    // Act
    engine.run(&records).await;

    // Assert: the snapshot saw the update once, the transport got both acks.
    assert_eq!(engine.projects.get(project).expect("project exists").version, 1);
    assert_eq!(engine.offsets.committed().len(), 3);
}

#[tokio::test]
async fn test_version_gap_fails_without_committing() {
    // Arrange
    let engine = Engine::new();
    let project = Uuid::new_v4();
    let records = EventStreamBuilder::new(project)
        .project_created("Harbor bridge")
        .project_updated("phase 2")
        .project_updated("phase 3")
        .build();
    engine.run(&records[..1]).await;

    // Act: the version-1 update never arrives.
    let result = engine.pipeline.process(records[2].clone()).await;

    // Assert
    assert!(matches!(result, Err(DomainError::ConcurrencyConflict { .. })));
    assert_eq!(engine.offsets.last_offset(), Some(0));
    assert_eq!(engine.projects.get(project).expect("project exists").version, 0);
}

#[tokio::test]
async fn test_task_ahead_of_its_project_retries_on_redelivery() {
    // Arrange
    let engine = Engine::new();
    let project = Uuid::new_v4();
    let task = Uuid::new_v4();
    let records = EventStreamBuilder::new(project)
        .project_created("Harbor bridge")
        .task_created(task, "Pour north footing")
        .build();

    // Act: the task record overtakes its project.
    let early = engine.pipeline.process(records[1].clone()).await;
    assert!(matches!(early, Err(DomainError::DanglingReference { .. })));
    assert!(engine.offsets.committed().is_empty());

    // The transport redelivers after the project caught up.
    engine.run(&records).await;

    // Assert
    assert!(engine.tasks.get(task).is_some());
    assert_eq!(engine.offsets.last_offset(), Some(1));
}

// --- tombstones and cascades ---

#[tokio::test]
async fn test_project_deletion_cascades_across_every_context() {
    // Arrange
    let engine = Engine::new();
    let project = Uuid::new_v4();
    let participant = Uuid::new_v4();
    let records = EventStreamBuilder::new(project)
        .project_created("Harbor bridge")
        .task_created(Uuid::new_v4(), "Pour north footing")
        .invitation_created(Uuid::new_v4(), participant, "foreman@example.com")
        .participant_created(participant, Uuid::new_v4(), ParticipantRole::Foreman)
        .project_deleted()
        .project_tombstone()
        .build();

    // Act
    engine.run(&records).await;

    // Assert: no context keeps a row scoped to the deleted project.
    assert!(engine.projects.is_empty());
    assert!(engine.tasks.is_empty());
    assert!(engine.participants.is_empty());
    assert!(engine.invitations.is_empty());
    assert_eq!(engine.offsets.last_offset(), Some(5));
}

#[tokio::test]
async fn test_tombstone_for_unknown_aggregate_still_commits() {
    // Arrange
    let engine = Engine::new();
    let records = EventStreamBuilder::new(Uuid::new_v4())
        .task_tombstone(Uuid::new_v4())
        .build();

    // Act
    engine.run(&records).await;

    // Assert
    assert_eq!(engine.offsets.last_offset(), Some(0));
}

// --- placeholder reconciliation through the whole pipeline ---

#[tokio::test]
async fn test_invitation_ahead_of_participant_reconciles_through_the_pipeline() {
    // Arrange
    let engine = Engine::new();
    let project = Uuid::new_v4();
    let participant = Uuid::new_v4();
    let user = Uuid::new_v4();
    let records = EventStreamBuilder::new(project)
        .project_created("Harbor bridge")
        .invitation_created(Uuid::new_v4(), participant, "worker@example.com")
        .participant_created(participant, user, ParticipantRole::Worker)
        .build();

    // Act
    engine.run(&records[..2]).await;
    let placeholder = engine.participants.get(participant).expect("placeholder exists");
    engine.run(&records[2..]).await;

    // Assert
    assert_eq!(placeholder.version, PLACEHOLDER_VERSION);
    let reconciled = engine.participants.get(participant).expect("row exists");
    assert_eq!(reconciled.version, 0);
    assert_eq!(reconciled.user, Some(user));
    assert_eq!(reconciled.email.as_deref(), Some("worker@example.com"));
}

// --- business transactions ---

#[tokio::test]
async fn test_transaction_replays_atomically_and_commits_the_finished_offset() {
    // Arrange
    let engine = Engine::new();
    let project = Uuid::new_v4();
    let task = Uuid::new_v4();
    let transaction = Uuid::new_v4();
    let records = EventStreamBuilder::new(project)
        .project_created("Harbor bridge")
        .transaction_started(transaction, TransactionKind::Reschedule)
        .task_created(task, "Pour north footing")
        .task_closed(task)
        .transaction_finished(transaction, TransactionKind::Reschedule)
        .build();

    // Act
    engine.run(&records).await;

    // Assert: nothing mid-transaction was acknowledged, only the project
    // event and the finished marker.
    assert_eq!(
        engine.offsets.committed().iter().map(|(_, o)| *o).collect::<Vec<_>>(),
        [0, 4]
    );
    let task_row = engine.tasks.get(task).expect("task exists");
    assert_eq!(task_row.status, TaskStatus::Closed);
    assert_eq!(task_row.version, 1);
    assert!(engine.buffer.is_empty());
    // Listeners saw the project event, both markers and both replayed
    // task events.
    assert_eq!(engine.listener.applied().len(), 5);
}

#[tokio::test]
async fn test_data_only_transaction_suppresses_change_listeners() {
    // Arrange
    let engine = Engine::new();
    let project = Uuid::new_v4();
    let transaction = Uuid::new_v4();
    let records = EventStreamBuilder::new(project)
        .transaction_started(transaction, TransactionKind::ProjectImport)
        .project_created("Imported harbor bridge")
        .task_created(Uuid::new_v4(), "Imported task")
        .transaction_finished(transaction, TransactionKind::ProjectImport)
        .build();

    // Act
    engine.run(&records).await;

    // Assert: snapshots materialized, but no listener fired, markers
    // included.
    assert!(engine.projects.get(project).is_some());
    assert_eq!(engine.tasks.len(), 1);
    assert!(engine.listener.applied().is_empty());
    assert_eq!(engine.offsets.last_offset(), Some(3));
}

#[tokio::test]
async fn test_whole_transaction_redelivery_is_idempotent() {
    // Arrange
    let engine = Engine::new();
    let project = Uuid::new_v4();
    let task = Uuid::new_v4();
    let transaction = Uuid::new_v4();
    let records = EventStreamBuilder::new(project)
        .project_created("Harbor bridge")
        .transaction_started(transaction, TransactionKind::Reschedule)
        .task_created(task, "Pour north footing")
        .transaction_finished(transaction, TransactionKind::Reschedule)
        .build();
    engine.run(&records).await;

    // Act: the transport lost every acknowledgment and replays the whole
    // transaction frame.
    engine.run(&records[1..]).await;

    // Assert
    let task_row = engine.tasks.get(task).expect("task exists");
    assert_eq!(task_row.version, 0);
    assert_eq!(engine.tasks.len(), 1);
    assert!(engine.buffer.is_empty());
}
