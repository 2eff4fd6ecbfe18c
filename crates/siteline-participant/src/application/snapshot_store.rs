//! Participant and invitation snapshot stores.
//!
//! The two streams are ordered independently, so the invitation store
//! materializes a placeholder participant when its invitation arrives
//! first. The participant store later reconciles the placeholder with the
//! participant's genuine creation event.

use std::sync::Arc;

use async_trait::async_trait;
use siteline_core::error::DomainError;
use siteline_core::identity::{EventEnvelope, EventKey};
use siteline_core::snapshot::{AggregateProjection, ReferenceCheck, SnapshotRepository};
use siteline_messages::{
    InvitationEvent, ParticipantEvent, ParticipantEventKind, Payload, aggregate_types,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::snapshot::{InvitationSnapshot, ParticipantSnapshot};

/// Snapshot store of the Participant context.
pub struct ParticipantSnapshotStore {
    repository: Arc<dyn SnapshotRepository<ParticipantSnapshot>>,
    projects: Arc<dyn ReferenceCheck>,
}

impl ParticipantSnapshotStore {
    /// Creates a store over the given repository and project lookup.
    #[must_use]
    pub fn new(
        repository: Arc<dyn SnapshotRepository<ParticipantSnapshot>>,
        projects: Arc<dyn ReferenceCheck>,
    ) -> Self {
        Self {
            repository,
            projects,
        }
    }
}

#[async_trait]
impl AggregateProjection<Payload> for ParticipantSnapshotStore {
    type Snapshot = ParticipantSnapshot;

    fn aggregate_type(&self) -> &'static str {
        aggregate_types::PARTICIPANT
    }

    fn handles(&self, key: &EventKey, payload: &Payload) -> bool {
        key.aggregate()
            .is_some_and(|aggregate| aggregate.aggregate_type == aggregate_types::PARTICIPANT)
            && payload.as_participant().is_some()
    }

    fn is_deletion(&self, payload: &Payload) -> bool {
        payload
            .as_participant()
            .is_some_and(|event| event.kind == ParticipantEventKind::Cancelled)
    }

    async fn find_current(&self, id: Uuid) -> Result<Option<ParticipantSnapshot>, DomainError> {
        self.repository.find(id).await
    }

    async fn project(
        &self,
        envelope: &EventEnvelope<Payload>,
        current: Option<ParticipantSnapshot>,
    ) -> Result<(), DomainError> {
        let aggregate = envelope.key.aggregate().ok_or_else(|| {
            DomainError::Storage("participant store received a marker record".into())
        })?;
        let ParticipantEvent { kind, data } = envelope
            .payload
            .as_ref()
            .and_then(Payload::as_participant)
            .ok_or_else(|| {
                DomainError::Storage("participant store received a foreign payload".into())
            })?;

        match (kind, current) {
            (ParticipantEventKind::Cancelled, Some(_)) => {
                self.repository.delete(aggregate.id).await
            }
            (ParticipantEventKind::Cancelled, None) => Ok(()),
            (_, None) => {
                if !self.projects.exists(data.project_id).await? {
                    return Err(DomainError::DanglingReference {
                        aggregate_type: aggregate_types::PROJECT.to_owned(),
                        referenced: data.project_id,
                    });
                }
                let snapshot =
                    ParticipantSnapshot::from_event(aggregate.id, aggregate.version, data);
                self.repository.insert(&snapshot).await
            }
            (_, Some(mut snapshot)) => {
                if snapshot.is_placeholder() {
                    debug!(
                        participant = %aggregate.id,
                        "reconciling placeholder participant with its first genuine event"
                    );
                }
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

/// Snapshot store of the Invitation context.
///
/// Owns the placeholder mechanism: an invitation whose participant has not
/// been replicated yet materializes a minimal participant row at the
/// sentinel version, so the participant's first genuine event lands on an
/// existing row instead of erroring on an unexpected one. The invitation
/// tombstone removes a companion that is still only that placeholder.
pub struct InvitationSnapshotStore {
    repository: Arc<dyn SnapshotRepository<InvitationSnapshot>>,
    participants: Arc<dyn SnapshotRepository<ParticipantSnapshot>>,
    projects: Arc<dyn ReferenceCheck>,
}

impl InvitationSnapshotStore {
    /// Creates a store over the invitation and participant repositories.
    #[must_use]
    pub fn new(
        repository: Arc<dyn SnapshotRepository<InvitationSnapshot>>,
        participants: Arc<dyn SnapshotRepository<ParticipantSnapshot>>,
        projects: Arc<dyn ReferenceCheck>,
    ) -> Self {
        Self {
            repository,
            participants,
            projects,
        }
    }
}

#[async_trait]
impl AggregateProjection<Payload> for InvitationSnapshotStore {
    type Snapshot = InvitationSnapshot;

    fn aggregate_type(&self) -> &'static str {
        aggregate_types::INVITATION
    }

    fn handles(&self, key: &EventKey, payload: &Payload) -> bool {
        key.aggregate()
            .is_some_and(|aggregate| aggregate.aggregate_type == aggregate_types::INVITATION)
            && payload.as_invitation().is_some()
    }

    fn is_deletion(&self, _payload: &Payload) -> bool {
        // Invitations end by tombstone only.
        false
    }

    async fn find_current(&self, id: Uuid) -> Result<Option<InvitationSnapshot>, DomainError> {
        self.repository.find(id).await
    }

    async fn project(
        &self,
        envelope: &EventEnvelope<Payload>,
        current: Option<InvitationSnapshot>,
    ) -> Result<(), DomainError> {
        let aggregate = envelope.key.aggregate().ok_or_else(|| {
            DomainError::Storage("invitation store received a marker record".into())
        })?;
        let InvitationEvent { kind: _, data } = envelope
            .payload
            .as_ref()
            .and_then(Payload::as_invitation)
            .ok_or_else(|| {
                DomainError::Storage("invitation store received a foreign payload".into())
            })?;

        match current {
            None => {
                if !self.projects.exists(data.project_id).await? {
                    return Err(DomainError::DanglingReference {
                        aggregate_type: aggregate_types::PROJECT.to_owned(),
                        referenced: data.project_id,
                    });
                }
                if self.participants.find(data.participant_id).await?.is_none() {
                    let placeholder = ParticipantSnapshot::placeholder(
                        data.participant_id,
                        data.project_id,
                        &data.email,
                        data.audit,
                    );
                    self.participants.insert(&placeholder).await?;
                    info!(
                        participant = %data.participant_id,
                        invitation = %aggregate.id,
                        "materialized placeholder participant ahead of its stream"
                    );
                }
                let snapshot =
                    InvitationSnapshot::from_event(aggregate.id, aggregate.version, data);
                self.repository.insert(&snapshot).await
            }
            Some(mut snapshot) => {
                let expected = snapshot.version;
                snapshot.apply_data(data);
                snapshot.version = aggregate.version;
                self.repository.update(&snapshot, expected).await
            }
        }
    }

    async fn purge(&self, id: Uuid) -> Result<(), DomainError> {
        let Some(invitation) = self.repository.find(id).await? else {
            return Ok(());
        };
        self.repository.delete(id).await?;
        // A companion that never produced its own events exists only
        // because of this invitation; it goes with it.
        if let Some(participant) = self.participants.find(invitation.participant_id).await?
            && participant.is_placeholder()
        {
            self.participants.delete(participant.identifier).await?;
            info!(
                participant = %participant.identifier,
                invitation = %id,
                "removed placeholder participant with its invitation"
            );
        }
        Ok(())
    }
}
