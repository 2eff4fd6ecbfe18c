//! Participant aggregate events.
//!
//! A participant ties a platform user to a project in a role. Cancellation
//! is the logical deletion of the stream; deactivation merely suspends
//! access and can be reverted.

use serde::{Deserialize, Serialize};
use siteline_core::audit::AuditInfo;
use uuid::Uuid;

/// Event kinds a participant stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantEventKind {
    /// The participant joined the project.
    Created,
    /// Role or master data changed.
    Updated,
    /// Access was suspended.
    Deactivated,
    /// Access was restored.
    Reactivated,
    /// The participation was cancelled; this deletes the snapshot.
    Cancelled,
}

/// Role of a participant within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantRole {
    /// Runs the project.
    Manager,
    /// Leads a crew.
    Foreman,
    /// Crew member.
    Worker,
}

impl ParticipantRole {
    /// Column value used by the snapshot store.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manager => "MANAGER",
            Self::Foreman => "FOREMAN",
            Self::Worker => "WORKER",
        }
    }

    /// Parses a column value back into a role.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "MANAGER" => Some(Self::Manager),
            "FOREMAN" => Some(Self::Foreman),
            "WORKER" => Some(Self::Worker),
            _ => None,
        }
    }
}

/// Membership status of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantStatus {
    /// Invited but not yet signed up. Placeholder rows stay here.
    Invited,
    /// Signed up, awaiting validation.
    Validation,
    /// Active member.
    Active,
    /// Suspended.
    Inactive,
}

impl ParticipantStatus {
    /// Column value used by the snapshot store.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invited => "INVITED",
            Self::Validation => "VALIDATION",
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }

    /// Parses a column value back into a status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INVITED" => Some(Self::Invited),
            "VALIDATION" => Some(Self::Validation),
            "ACTIVE" => Some(Self::Active),
            "INACTIVE" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// Full participant state as carried by every participant event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantData {
    /// Audit trail after the event.
    pub audit: AuditInfo,
    /// Project the participant belongs to.
    pub project_id: Uuid,
    /// Platform user, unknown while the participant is only invited.
    pub user: Option<Uuid>,
    /// Invitation email, if the participant came in through one.
    pub email: Option<String>,
    /// Role within the project.
    pub role: ParticipantRole,
    /// Membership status.
    pub status: ParticipantStatus,
}

/// One event of a participant stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantEvent {
    /// What happened.
    pub kind: ParticipantEventKind,
    /// Participant state after the event.
    pub data: ParticipantData,
}

impl ParticipantEvent {
    /// Pairs a kind with the state it produced.
    #[must_use]
    pub fn new(kind: ParticipantEventKind, data: ParticipantData) -> Self {
        Self { kind, data }
    }
}
