//! Stream builder — produces delivered-record sequences shaped like the
//! real transport output for one project partition.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use siteline_core::audit::AuditInfo;
use siteline_core::consumer::EventRecord;
use siteline_core::identity::{AggregateIdentifier, EventEnvelope, EventKey, RoutingKey};
use siteline_messages::{
    InvitationData, InvitationEvent, InvitationEventKind, ParticipantData, ParticipantEvent,
    ParticipantEventKind, ParticipantRole, ParticipantStatus, Payload, ProjectData, ProjectEvent,
    ProjectEventKind, TaskData, TaskEvent, TaskEventKind, TaskStatus, TransactionFinishedPayload,
    TransactionKind, TransactionStartedPayload, aggregate_types,
};
use uuid::Uuid;

/// Builds a delivered-record stream on the partition of one project.
///
/// Offsets count up from 0 in push order and aggregate versions count up
/// from 0 per aggregate, exactly the shape the transport hands the
/// consumer. Payloads carry the full aggregate state after each event,
/// tracked across calls, so updated events repeat the untouched fields.
///
/// Mutating methods (`project_updated`, `task_assigned`, ...) panic when
/// the aggregate was not created on this builder first.
#[derive(Debug)]
pub struct EventStreamBuilder {
    project_id: Uuid,
    actor: Uuid,
    at: DateTime<Utc>,
    next_offset: i64,
    versions: HashMap<Uuid, i64>,
    projects: HashMap<Uuid, ProjectData>,
    tasks: HashMap<Uuid, TaskData>,
    participants: HashMap<Uuid, ParticipantData>,
    invitations: HashMap<Uuid, InvitationData>,
    records: Vec<EventRecord<Payload>>,
}

impl EventStreamBuilder {
    /// Starts an empty stream on the partition of the given project.
    #[must_use]
    pub fn new(project_id: Uuid) -> Self {
        Self {
            project_id,
            actor: Uuid::new_v4(),
            at: Utc::now(),
            next_offset: 0,
            versions: HashMap::new(),
            projects: HashMap::new(),
            tasks: HashMap::new(),
            participants: HashMap::new(),
            invitations: HashMap::new(),
            records: Vec::new(),
        }
    }

    /// The actor stamped into every audit trail the builder produces.
    #[must_use]
    pub fn actor(&self) -> Uuid {
        self.actor
    }

    /// The timestamp stamped into every envelope the builder produces.
    #[must_use]
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// The partition all built records are delivered on.
    #[must_use]
    pub fn routing_key(&self) -> RoutingKey {
        RoutingKey(self.project_id)
    }

    /// The built records in delivery order.
    #[must_use]
    pub fn build(self) -> Vec<EventRecord<Payload>> {
        self.records
    }

    // -- project ----------------------------------------------------------

    /// Creation event of the partition's own project, at version 0.
    #[must_use]
    pub fn project_created(mut self, title: &str) -> Self {
        let version = self.next_version(self.project_id);
        let data = ProjectData {
            audit: AuditInfo::created(self.actor, self.at),
            title: title.to_owned(),
            start_date: date(2026, 3, 2),
            end_date: date(2026, 11, 27),
        };
        self.projects.insert(self.project_id, data.clone());
        self.push_aggregate(
            aggregate_types::PROJECT,
            self.project_id,
            version,
            Payload::Project(ProjectEvent::new(ProjectEventKind::Created, data)),
        );
        self
    }

    /// Update event carrying a new title.
    #[must_use]
    pub fn project_updated(mut self, title: &str) -> Self {
        let version = self.next_version(self.project_id);
        let mut data = self.project_state();
        data.title = title.to_owned();
        data.audit.touch(self.actor, self.at);
        self.projects.insert(self.project_id, data.clone());
        self.push_aggregate(
            aggregate_types::PROJECT,
            self.project_id,
            version,
            Payload::Project(ProjectEvent::new(ProjectEventKind::Updated, data)),
        );
        self
    }

    /// Logical deletion event of the project.
    #[must_use]
    pub fn project_deleted(mut self) -> Self {
        let version = self.next_version(self.project_id);
        let mut data = self.project_state();
        data.audit.touch(self.actor, self.at);
        self.push_aggregate(
            aggregate_types::PROJECT,
            self.project_id,
            version,
            Payload::Project(ProjectEvent::new(ProjectEventKind::Deleted, data)),
        );
        self
    }

    /// Tombstone record of the project stream.
    #[must_use]
    pub fn project_tombstone(mut self) -> Self {
        let version = self.next_version(self.project_id);
        let key = self.aggregate_key(aggregate_types::PROJECT, self.project_id, version);
        self.push(key, None);
        self
    }

    // -- task -------------------------------------------------------------

    /// Creation event of a task, at version 0, referencing the partition's
    /// project.
    #[must_use]
    pub fn task_created(mut self, id: Uuid, name: &str) -> Self {
        let version = self.next_version(id);
        let data = TaskData {
            audit: AuditInfo::created(self.actor, self.at),
            project_id: self.project_id,
            name: name.to_owned(),
            status: TaskStatus::Open,
            assignee: None,
        };
        self.tasks.insert(id, data.clone());
        self.push_aggregate(
            aggregate_types::TASK,
            id,
            version,
            Payload::Task(TaskEvent::new(TaskEventKind::Created, data)),
        );
        self
    }

    /// Assignment event putting a participant on the task.
    #[must_use]
    pub fn task_assigned(self, id: Uuid, assignee: Uuid) -> Self {
        self.push_task(id, TaskEventKind::Assigned, |data| {
            data.assignee = Some(assignee);
        })
    }

    /// Unassignment event clearing the task's assignee.
    #[must_use]
    pub fn task_unassigned(self, id: Uuid) -> Self {
        self.push_task(id, TaskEventKind::Unassigned, |data| {
            data.assignee = None;
        })
    }

    /// Closing event moving the task to its terminal status.
    #[must_use]
    pub fn task_closed(self, id: Uuid) -> Self {
        self.push_task(id, TaskEventKind::Closed, |data| {
            data.status = TaskStatus::Closed;
        })
    }

    /// Logical deletion event of the task.
    #[must_use]
    pub fn task_deleted(self, id: Uuid) -> Self {
        self.push_task(id, TaskEventKind::Deleted, |_| {})
    }

    /// Tombstone record of the task stream.
    #[must_use]
    pub fn task_tombstone(mut self, id: Uuid) -> Self {
        let version = self.next_version(id);
        let key = self.aggregate_key(aggregate_types::TASK, id, version);
        self.push(key, None);
        self
    }

    // -- participant ------------------------------------------------------

    /// Creation event of an active participant, at version 0.
    #[must_use]
    pub fn participant_created(mut self, id: Uuid, user: Uuid, role: ParticipantRole) -> Self {
        let version = self.next_version(id);
        let data = ParticipantData {
            audit: AuditInfo::created(self.actor, self.at),
            project_id: self.project_id,
            user: Some(user),
            email: None,
            role,
            status: ParticipantStatus::Active,
        };
        self.participants.insert(id, data.clone());
        self.push_aggregate(
            aggregate_types::PARTICIPANT,
            id,
            version,
            Payload::Participant(ParticipantEvent::new(ParticipantEventKind::Created, data)),
        );
        self
    }

    /// Cancellation event, the logical deletion of the participation.
    #[must_use]
    pub fn participant_cancelled(mut self, id: Uuid) -> Self {
        let version = self.next_version(id);
        let mut data = self.participant_state(id);
        data.audit.touch(self.actor, self.at);
        self.participants.insert(id, data.clone());
        self.push_aggregate(
            aggregate_types::PARTICIPANT,
            id,
            version,
            Payload::Participant(ParticipantEvent::new(ParticipantEventKind::Cancelled, data)),
        );
        self
    }

    /// Tombstone record of the participant stream.
    #[must_use]
    pub fn participant_tombstone(mut self, id: Uuid) -> Self {
        let version = self.next_version(id);
        let key = self.aggregate_key(aggregate_types::PARTICIPANT, id, version);
        self.push(key, None);
        self
    }

    // -- invitation -------------------------------------------------------

    /// Creation event of an invitation, at version 0. The referenced
    /// participant does not need to exist on this builder; an invitation
    /// arriving first is exactly the placeholder scenario.
    #[must_use]
    pub fn invitation_created(mut self, id: Uuid, participant_id: Uuid, email: &str) -> Self {
        let version = self.next_version(id);
        let data = InvitationData {
            audit: AuditInfo::created(self.actor, self.at),
            project_id: self.project_id,
            participant_id,
            email: email.to_owned(),
            last_sent: self.at,
        };
        self.invitations.insert(id, data.clone());
        self.push_aggregate(
            aggregate_types::INVITATION,
            id,
            version,
            Payload::Invitation(InvitationEvent::new(InvitationEventKind::Created, data)),
        );
        self
    }

    /// Resend event refreshing the invitation's last-sent stamp.
    #[must_use]
    pub fn invitation_resent(mut self, id: Uuid) -> Self {
        let version = self.next_version(id);
        let mut data = self.invitation_state(id);
        data.last_sent = self.at;
        data.audit.touch(self.actor, self.at);
        self.invitations.insert(id, data.clone());
        self.push_aggregate(
            aggregate_types::INVITATION,
            id,
            version,
            Payload::Invitation(InvitationEvent::new(InvitationEventKind::Resent, data)),
        );
        self
    }

    /// Tombstone record of the invitation stream.
    #[must_use]
    pub fn invitation_tombstone(mut self, id: Uuid) -> Self {
        let version = self.next_version(id);
        let key = self.aggregate_key(aggregate_types::INVITATION, id, version);
        self.push(key, None);
        self
    }

    // -- transactions -----------------------------------------------------

    /// Started marker opening a business transaction on the partition.
    #[must_use]
    pub fn transaction_started(mut self, transaction_id: Uuid, kind: TransactionKind) -> Self {
        let key = EventKey::TransactionStarted {
            transaction_id,
            routing_key: RoutingKey(self.project_id),
        };
        self.push(
            key,
            Some(Payload::TransactionStarted(TransactionStartedPayload {
                kind,
            })),
        );
        self
    }

    /// Finished marker closing the business transaction.
    #[must_use]
    pub fn transaction_finished(mut self, transaction_id: Uuid, kind: TransactionKind) -> Self {
        let key = EventKey::TransactionFinished {
            transaction_id,
            routing_key: RoutingKey(self.project_id),
        };
        self.push(
            key,
            Some(Payload::TransactionFinished(TransactionFinishedPayload {
                kind,
            })),
        );
        self
    }

    // -- delivery shapes --------------------------------------------------

    /// Repeats the previous record verbatim — same offset, same envelope —
    /// the way the transport redelivers after a lost acknowledgment.
    ///
    /// # Panics
    ///
    /// Panics when no record was pushed yet.
    #[must_use]
    pub fn duplicate_last(mut self) -> Self {
        let last = self
            .records
            .last()
            .cloned()
            .expect("builder holds at least one record");
        self.records.push(last);
        self
    }

    // -- internals --------------------------------------------------------

    fn next_version(&mut self, id: Uuid) -> i64 {
        let version = self.versions.entry(id).and_modify(|v| *v += 1).or_insert(0);
        *version
    }

    fn aggregate_key(&self, aggregate_type: &str, id: Uuid, version: i64) -> EventKey {
        EventKey::AggregateEvent {
            aggregate: AggregateIdentifier::new(aggregate_type, id, version),
            routing_key: RoutingKey(self.project_id),
        }
    }

    fn push_aggregate(&mut self, aggregate_type: &str, id: Uuid, version: i64, payload: Payload) {
        let key = self.aggregate_key(aggregate_type, id, version);
        self.push(key, Some(payload));
    }

    fn push(&mut self, key: EventKey, payload: Option<Payload>) {
        let envelope = EventEnvelope::new(key, payload, self.at);
        let record = EventRecord::new(envelope, self.next_offset);
        self.next_offset += 1;
        self.records.push(record);
    }

    fn push_task(mut self, id: Uuid, kind: TaskEventKind, mutate: impl FnOnce(&mut TaskData)) -> Self {
        let version = self.next_version(id);
        let mut data = self.task_state(id);
        mutate(&mut data);
        data.audit.touch(self.actor, self.at);
        self.tasks.insert(id, data.clone());
        self.push_aggregate(
            aggregate_types::TASK,
            id,
            version,
            Payload::Task(TaskEvent::new(kind, data)),
        );
        self
    }

    fn project_state(&self) -> ProjectData {
        self.projects
            .get(&self.project_id)
            .cloned()
            .expect("project was created on this builder")
    }

    fn task_state(&self, id: Uuid) -> TaskData {
        self.tasks
            .get(&id)
            .cloned()
            .expect("task was created on this builder")
    }

    fn participant_state(&self, id: Uuid) -> ParticipantData {
        self.participants
            .get(&id)
            .cloned()
            .expect("participant was created on this builder")
    }

    fn invitation_state(&self, id: Uuid) -> InvitationData {
        self.invitations
            .get(&id)
            .cloned()
            .expect("invitation was created on this builder")
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar date")
}
