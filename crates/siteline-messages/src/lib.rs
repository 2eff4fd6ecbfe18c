//! Siteline Messages — the event model of the project-management stream.
//!
//! One closed union over every payload the replicated topic carries.
//! Consumers match on [`Payload`] exhaustively, so adding an event kind is
//! a compile-visible change for every snapshot store.
//!
//! Events are state-carried: each payload holds the full aggregate state
//! after the event, plus the audit trail. The stream position itself lives
//! in the envelope key, not in the payload.

use serde::{Deserialize, Serialize};
use siteline_core::consumer::StreamPayload;

pub mod invitation;
pub mod participant;
pub mod project;
pub mod task;
pub mod transaction;

pub use invitation::{InvitationData, InvitationEvent, InvitationEventKind};
pub use participant::{
    ParticipantData, ParticipantEvent, ParticipantEventKind, ParticipantRole, ParticipantStatus,
};
pub use project::{ProjectData, ProjectEvent, ProjectEventKind};
pub use task::{TaskData, TaskEvent, TaskEventKind, TaskStatus};
pub use transaction::{TransactionFinishedPayload, TransactionKind, TransactionStartedPayload};

/// Aggregate type discriminators used in envelope keys.
pub mod aggregate_types {
    /// Project aggregates.
    pub const PROJECT: &str = "PROJECT";
    /// Task aggregates.
    pub const TASK: &str = "TASK";
    /// Participant aggregates.
    pub const PARTICIPANT: &str = "PARTICIPANT";
    /// Invitation aggregates.
    pub const INVITATION: &str = "INVITATION";
}

/// Every payload the project-management stream carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// A project event.
    Project(ProjectEvent),
    /// A task event.
    Task(TaskEvent),
    /// A participant event.
    Participant(ParticipantEvent),
    /// An invitation event.
    Invitation(InvitationEvent),
    /// A business transaction opened.
    TransactionStarted(TransactionStartedPayload),
    /// A business transaction closed.
    TransactionFinished(TransactionFinishedPayload),
}

impl Payload {
    /// The project event, if this is one.
    #[must_use]
    pub fn as_project(&self) -> Option<&ProjectEvent> {
        match self {
            Self::Project(event) => Some(event),
            _ => None,
        }
    }

    /// The task event, if this is one.
    #[must_use]
    pub fn as_task(&self) -> Option<&TaskEvent> {
        match self {
            Self::Task(event) => Some(event),
            _ => None,
        }
    }

    /// The participant event, if this is one.
    #[must_use]
    pub fn as_participant(&self) -> Option<&ParticipantEvent> {
        match self {
            Self::Participant(event) => Some(event),
            _ => None,
        }
    }

    /// The invitation event, if this is one.
    #[must_use]
    pub fn as_invitation(&self) -> Option<&InvitationEvent> {
        match self {
            Self::Invitation(event) => Some(event),
            _ => None,
        }
    }

    /// The started marker payload, if this is one.
    #[must_use]
    pub fn as_transaction_started(&self) -> Option<&TransactionStartedPayload> {
        match self {
            Self::TransactionStarted(payload) => Some(payload),
            _ => None,
        }
    }
}

impl StreamPayload for Payload {
    fn is_data_only_transaction(&self) -> bool {
        matches!(self, Self::TransactionStarted(payload) if payload.kind.is_data_only())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use siteline_core::audit::AuditInfo;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_payload_survives_json_round_trip() {
        // Arrange
        let payload = Payload::Participant(ParticipantEvent::new(
            ParticipantEventKind::Created,
            ParticipantData {
                audit: AuditInfo::created(Uuid::new_v4(), Utc::now()),
                project_id: Uuid::new_v4(),
                user: Some(Uuid::new_v4()),
                email: Some("foreman@example.com".to_owned()),
                role: ParticipantRole::Foreman,
                status: ParticipantStatus::Active,
            },
        ));

        // Act
        let json = serde_json::to_string(&payload).expect("serializes");
        let back: Payload = serde_json::from_str(&json).expect("deserializes");

        // Assert
        assert_eq!(back, payload);
    }

    #[test]
    fn test_import_and_copy_are_data_only() {
        // Arrange
        let import = Payload::TransactionStarted(TransactionStartedPayload {
            kind: TransactionKind::ProjectImport,
        });
        let copy = Payload::TransactionStarted(TransactionStartedPayload {
            kind: TransactionKind::ProjectCopy,
        });
        let reschedule = Payload::TransactionStarted(TransactionStartedPayload {
            kind: TransactionKind::Reschedule,
        });
        let finished = Payload::TransactionFinished(TransactionFinishedPayload {
            kind: TransactionKind::ProjectImport,
        });

        // Assert
        assert!(import.is_data_only_transaction());
        assert!(copy.is_data_only_transaction());
        assert!(!reschedule.is_data_only_transaction());
        assert!(!finished.is_data_only_transaction());
    }

    #[test]
    fn test_accessors_only_match_their_variant() {
        // Arrange
        let payload = Payload::TransactionStarted(TransactionStartedPayload {
            kind: TransactionKind::Reschedule,
        });

        // Assert
        assert!(payload.as_project().is_none());
        assert!(payload.as_task().is_none());
        assert!(payload.as_transaction_started().is_some());
    }
}
