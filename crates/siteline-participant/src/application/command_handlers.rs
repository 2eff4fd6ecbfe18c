//! Command handlers of the Participant and Invitation contexts.
//!
//! Inviting someone creates two aggregates in one unit of work: the
//! participant at status `Invited` and the invitation pointing at it. Both
//! events go out only after both inserts succeeded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use siteline_core::audit::AuditInfo;
use siteline_core::callback::{LifecycleCallbacks, LifecyclePoint};
use siteline_core::clock::Clock;
use siteline_core::command::{CommandHandler, EventPublisher, Outbox};
use siteline_core::error::DomainError;
use siteline_core::identity::{AggregateIdentifier, EventEnvelope, EventKey, RoutingKey};
use siteline_core::snapshot::{SnapshotRepository, VersionedSnapshot};
use siteline_messages::{
    InvitationEvent, InvitationEventKind, ParticipantEvent, ParticipantEventKind, ParticipantStatus,
    Payload, aggregate_types,
};
use uuid::Uuid;

use crate::domain::commands::{CancelParticipant, InviteParticipant, ResendInvitation};
use crate::domain::snapshot::{InvitationSnapshot, ParticipantSnapshot};

/// Outcome of [`handle_invite_participant`]: the aggregate pair it created.
#[derive(Debug, Clone)]
pub struct InvitationIssued {
    /// The invited participant, at version 0 and status `Invited`.
    pub participant: ParticipantSnapshot,
    /// The invitation pointing at the participant, at version 0.
    pub invitation: InvitationSnapshot,
}

fn participant_envelope(
    snapshot: &ParticipantSnapshot,
    kind: ParticipantEventKind,
    at: DateTime<Utc>,
) -> EventEnvelope<Payload> {
    EventEnvelope::new(
        EventKey::AggregateEvent {
            aggregate: AggregateIdentifier::new(
                aggregate_types::PARTICIPANT,
                snapshot.identifier,
                snapshot.version,
            ),
            routing_key: RoutingKey(snapshot.root_context()),
        },
        Some(Payload::Participant(ParticipantEvent::new(
            kind,
            snapshot.to_data(),
        ))),
        at,
    )
}

fn invitation_envelope(
    snapshot: &InvitationSnapshot,
    kind: InvitationEventKind,
    at: DateTime<Utc>,
) -> EventEnvelope<Payload> {
    EventEnvelope::new(
        EventKey::AggregateEvent {
            aggregate: AggregateIdentifier::new(
                aggregate_types::INVITATION,
                snapshot.identifier,
                snapshot.version,
            ),
            routing_key: RoutingKey(snapshot.root_context()),
        },
        Some(Payload::Invitation(InvitationEvent::new(
            kind,
            snapshot.to_data(),
        ))),
        at,
    )
}

/// Handles [`InviteParticipant`]: inserts the participant and invitation
/// version-0 snapshots and publishes both creation events once the inserts
/// succeeded, participant first.
///
/// # Errors
///
/// Returns `PreconditionFailed` for an invalid email, otherwise
/// persistence or transport errors.
pub async fn handle_invite_participant(
    command: &InviteParticipant,
    clock: &dyn Clock,
    participants: &dyn SnapshotRepository<ParticipantSnapshot>,
    invitations: &dyn SnapshotRepository<InvitationSnapshot>,
    publisher: &dyn EventPublisher<Payload>,
    callbacks: &LifecycleCallbacks,
) -> Result<InvitationIssued, DomainError> {
    let result = async {
        let now = clock.now();
        let audit = AuditInfo::created(command.actor, now);
        let participant = ParticipantSnapshot {
            identifier: Uuid::new_v4(),
            version: 0,
            audit,
            project_id: command.project_id,
            user: None,
            email: Some(command.email.clone()),
            role: command.role,
            status: ParticipantStatus::Invited,
        };
        let participant = CommandHandler::of(participant)
            .check_precondition(
                |s| {
                    s.email
                        .as_deref()
                        .is_some_and(|email| email.contains('@'))
                },
                "invitation email must be a valid address",
            )?
            .emit_current(|s| participant_envelope(s, ParticipantEventKind::Created, now));

        let invitation = InvitationSnapshot {
            identifier: Uuid::new_v4(),
            version: 0,
            audit,
            project_id: command.project_id,
            participant_id: participant.snapshot.identifier,
            email: command.email.clone(),
            last_sent: now,
        };
        let invitation = CommandHandler::of(invitation)
            .emit_current(|s| invitation_envelope(s, InvitationEventKind::Created, now));

        let outbox = Arc::new(Outbox::new());
        let staged = Arc::clone(&outbox);
        let envelope = participant.event.clone();
        callbacks.register(
            participant.snapshot.identifier,
            LifecyclePoint::PostInsert,
            move || staged.stage(envelope),
        )?;
        let staged = Arc::clone(&outbox);
        let envelope = invitation.event.clone();
        callbacks.register(
            invitation.snapshot.identifier,
            LifecyclePoint::PostInsert,
            move || staged.stage(envelope),
        )?;

        participants.insert(&participant.snapshot).await?;
        callbacks.dispatch(participant.snapshot.identifier, LifecyclePoint::PostInsert);
        invitations.insert(&invitation.snapshot).await?;
        callbacks.dispatch(invitation.snapshot.identifier, LifecyclePoint::PostInsert);
        for envelope in outbox.drain() {
            publisher.publish(envelope).await?;
        }
        Ok(InvitationIssued {
            participant: participant.snapshot,
            invitation: invitation.snapshot,
        })
    }
    .await;
    callbacks.discard_all();
    result
}

/// Handles [`ResendInvitation`]: refreshes the last-sent stamp through the
/// compare-and-swap write and publishes the resend event.
///
/// # Errors
///
/// Returns `AggregateNotFound` for an unknown invitation and
/// `ConcurrencyConflict` for a stale expected version.
pub async fn handle_resend_invitation(
    command: &ResendInvitation,
    clock: &dyn Clock,
    invitations: &dyn SnapshotRepository<InvitationSnapshot>,
    publisher: &dyn EventPublisher<Payload>,
    callbacks: &LifecycleCallbacks,
) -> Result<InvitationSnapshot, DomainError> {
    let result = async {
        let current = invitations
            .find(command.invitation_id)
            .await?
            .ok_or(DomainError::AggregateNotFound(command.invitation_id))?;
        let expected = current.version;
        let now = clock.now();
        let result = CommandHandler::of(current)
            .assert_version_matches(command.expected_version)?
            .apply(|s| s.last_sent = now)
            .emit(command.actor, clock, |s, at| {
                invitation_envelope(s, InvitationEventKind::Resent, at)
            });

        let outbox = Arc::new(Outbox::new());
        let staged = Arc::clone(&outbox);
        let envelope = result.event.clone();
        callbacks.register(command.invitation_id, LifecyclePoint::PostUpdate, move || {
            staged.stage(envelope);
        })?;

        invitations.update(&result.snapshot, expected).await?;
        callbacks.dispatch(command.invitation_id, LifecyclePoint::PostUpdate);
        for envelope in outbox.drain() {
            publisher.publish(envelope).await?;
        }
        Ok(result.snapshot)
    }
    .await;
    callbacks.discard_all();
    result
}

/// Handles [`CancelParticipant`]: publishes the cancellation event and the
/// trailing tombstone, then removes the local row.
///
/// # Errors
///
/// Returns `AggregateNotFound` for an unknown participant and
/// `ConcurrencyConflict` for a stale expected version.
pub async fn handle_cancel_participant(
    command: &CancelParticipant,
    clock: &dyn Clock,
    participants: &dyn SnapshotRepository<ParticipantSnapshot>,
    publisher: &dyn EventPublisher<Payload>,
    callbacks: &LifecycleCallbacks,
) -> Result<(), DomainError> {
    let result = async {
        let current = participants
            .find(command.participant_id)
            .await?
            .ok_or(DomainError::AggregateNotFound(command.participant_id))?;
        let result = CommandHandler::of(current)
            .assert_version_matches(command.expected_version)?
            .emit(command.actor, clock, |s, at| {
                participant_envelope(s, ParticipantEventKind::Cancelled, at)
            });

        let outbox = Arc::new(Outbox::new());
        let staged = Arc::clone(&outbox);
        let envelope = result.event.clone();
        callbacks.register(command.participant_id, LifecyclePoint::PreDelete, move || {
            staged.stage(envelope);
        })?;

        callbacks.dispatch(command.participant_id, LifecyclePoint::PreDelete);
        participants.delete(command.participant_id).await?;
        for envelope in outbox.drain() {
            publisher.publish(envelope).await?;
        }

        let tombstone = CommandHandler::of(result.snapshot)
            .emit_tombstone::<Payload>(clock, aggregate_types::PARTICIPANT);
        publisher.publish(tombstone.event).await?;
        Ok(())
    }
    .await;
    callbacks.discard_all();
    result
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use siteline_messages::ParticipantRole;
    use siteline_test_support::{
        FixedClock, InMemorySnapshotRepository, RecordingEventPublisher,
    };

    use super::*;

    fn invite_command(actor: Uuid, project_id: Uuid) -> InviteParticipant {
        InviteParticipant {
            actor,
            project_id,
            email: "foreman@example.com".to_owned(),
            role: ParticipantRole::Foreman,
        }
    }

    #[tokio::test]
    async fn test_invite_creates_the_pair_and_publishes_both_events() {
        // Arrange
        let actor = Uuid::new_v4();
        let project = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 8, 0, 0).unwrap();
        let clock = FixedClock(now);
        let participants = InMemorySnapshotRepository::new();
        let invitations = InMemorySnapshotRepository::new();
        let publisher = RecordingEventPublisher::new();
        let callbacks = LifecycleCallbacks::new();

        // Act
        let issued = handle_invite_participant(
            &invite_command(actor, project),
            &clock,
            &participants,
            &invitations,
            &publisher,
            &callbacks,
        )
        .await
        .expect("command succeeds");

        // Assert
        assert_eq!(issued.participant.version, 0);
        assert_eq!(issued.participant.status, ParticipantStatus::Invited);
        assert_eq!(issued.invitation.participant_id, issued.participant.identifier);
        assert!(participants.get(issued.participant.identifier).is_some());
        assert!(invitations.get(issued.invitation.identifier).is_some());
        let published = publisher.published();
        assert_eq!(published.len(), 2);
        assert!(published[0].payload.as_ref().is_some_and(|p| p.as_participant().is_some()));
        assert!(published[1].payload.as_ref().is_some_and(|p| p.as_invitation().is_some()));
        assert_eq!(callbacks.pending(), 0);
    }

    #[tokio::test]
    async fn test_invite_rejects_invalid_email_and_publishes_nothing() {
        // Arrange
        let clock = FixedClock(Utc::now());
        let participants = InMemorySnapshotRepository::new();
        let invitations = InMemorySnapshotRepository::new();
        let publisher = RecordingEventPublisher::new();
        let callbacks = LifecycleCallbacks::new();
        let mut command = invite_command(Uuid::new_v4(), Uuid::new_v4());
        command.email = "not-an-address".to_owned();

        // Act
        let result = handle_invite_participant(
            &command,
            &clock,
            &participants,
            &invitations,
            &publisher,
            &callbacks,
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::PreconditionFailed(_))));
        assert!(participants.is_empty());
        assert!(invitations.is_empty());
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_resend_refreshes_last_sent_and_bumps_version() {
        // Arrange
        let actor = Uuid::new_v4();
        let created_at = Utc.with_ymd_and_hms(2026, 2, 10, 8, 0, 0).unwrap();
        let participants = InMemorySnapshotRepository::new();
        let invitations = InMemorySnapshotRepository::new();
        let publisher = RecordingEventPublisher::new();
        let callbacks = LifecycleCallbacks::new();
        let issued = handle_invite_participant(
            &invite_command(actor, Uuid::new_v4()),
            &FixedClock(created_at),
            &participants,
            &invitations,
            &publisher,
            &callbacks,
        )
        .await
        .expect("invite succeeds");
        let resent_at = Utc.with_ymd_and_hms(2026, 2, 12, 9, 30, 0).unwrap();

        // Act
        let resent = handle_resend_invitation(
            &ResendInvitation {
                actor,
                invitation_id: issued.invitation.identifier,
                expected_version: 0,
            },
            &FixedClock(resent_at),
            &invitations,
            &publisher,
            &callbacks,
        )
        .await
        .expect("resend succeeds");

        // Assert
        assert_eq!(resent.version, 1);
        assert_eq!(resent.last_sent, resent_at);
        let stored = invitations.get(issued.invitation.identifier).expect("row exists");
        assert_eq!(stored.version, 1);
        let published = publisher.published();
        assert_eq!(published.len(), 3);
        let event = published[2].payload.as_ref().and_then(Payload::as_invitation);
        assert_eq!(event.map(|e| e.kind), Some(InvitationEventKind::Resent));
    }

    #[tokio::test]
    async fn test_resend_with_stale_version_is_a_conflict() {
        // Arrange
        let actor = Uuid::new_v4();
        let clock = FixedClock(Utc::now());
        let participants = InMemorySnapshotRepository::new();
        let invitations = InMemorySnapshotRepository::new();
        let publisher = RecordingEventPublisher::new();
        let callbacks = LifecycleCallbacks::new();
        let issued = handle_invite_participant(
            &invite_command(actor, Uuid::new_v4()),
            &clock,
            &participants,
            &invitations,
            &publisher,
            &callbacks,
        )
        .await
        .expect("invite succeeds");

        // Act
        let result = handle_resend_invitation(
            &ResendInvitation {
                actor,
                invitation_id: issued.invitation.identifier,
                expected_version: 4,
            },
            &clock,
            &invitations,
            &publisher,
            &callbacks,
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::ConcurrencyConflict { .. })));
        assert_eq!(publisher.published().len(), 2, "only the invite went out");
        assert_eq!(callbacks.pending(), 0, "failed unit of work discards callbacks");
    }

    #[tokio::test]
    async fn test_cancel_publishes_cancellation_then_tombstone() {
        // Arrange
        let actor = Uuid::new_v4();
        let clock = FixedClock(Utc::now());
        let participants = InMemorySnapshotRepository::new();
        let invitations = InMemorySnapshotRepository::new();
        let publisher = RecordingEventPublisher::new();
        let callbacks = LifecycleCallbacks::new();
        let issued = handle_invite_participant(
            &invite_command(actor, Uuid::new_v4()),
            &clock,
            &participants,
            &invitations,
            &publisher,
            &callbacks,
        )
        .await
        .expect("invite succeeds");

        // Act
        handle_cancel_participant(
            &CancelParticipant {
                actor,
                participant_id: issued.participant.identifier,
                expected_version: 0,
            },
            &clock,
            &participants,
            &publisher,
            &callbacks,
        )
        .await
        .expect("cancel succeeds");

        // Assert
        assert!(participants.is_empty());
        let published = publisher.published();
        assert_eq!(published.len(), 4);
        let cancelled = published[2].payload.as_ref().and_then(Payload::as_participant);
        assert_eq!(cancelled.map(|e| e.kind), Some(ParticipantEventKind::Cancelled));
        assert!(published[3].is_tombstone());
        let tombstone_key = published[3].key.aggregate().expect("aggregate event");
        assert_eq!(tombstone_key.id, issued.participant.identifier);
        assert_eq!(tombstone_key.version, 2);
    }

    #[tokio::test]
    async fn test_cancel_unknown_participant_is_not_found() {
        // Arrange
        let clock = FixedClock(Utc::now());
        let participants = InMemorySnapshotRepository::<ParticipantSnapshot>::new();
        let publisher = RecordingEventPublisher::new();
        let callbacks = LifecycleCallbacks::new();
        let unknown = Uuid::new_v4();

        // Act
        let result = handle_cancel_participant(
            &CancelParticipant {
                actor: Uuid::new_v4(),
                participant_id: unknown,
                expected_version: 0,
            },
            &clock,
            &participants,
            &publisher,
            &callbacks,
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::AggregateNotFound(id)) if id == unknown));
        assert!(publisher.published().is_empty());
    }
}
