//! Commands of the Participant and Invitation contexts.

use siteline_messages::ParticipantRole;
use uuid::Uuid;

/// Command to invite someone into a project by email.
///
/// Creates both aggregates of the pair: the participant (status
/// `Invited`) and the invitation pointing at it.
#[derive(Debug, Clone)]
pub struct InviteParticipant {
    /// User issuing the command.
    pub actor: Uuid,
    /// Project the invitation is for.
    pub project_id: Uuid,
    /// Address to send the invitation to.
    pub email: String,
    /// Role the invitee will hold.
    pub role: ParticipantRole,
}

/// Command to send an existing invitation's email again.
#[derive(Debug, Clone)]
pub struct ResendInvitation {
    /// User issuing the command.
    pub actor: Uuid,
    /// Invitation to resend.
    pub invitation_id: Uuid,
    /// Snapshot version the caller read before issuing the command.
    pub expected_version: i64,
}

/// Command to cancel a participation.
#[derive(Debug, Clone)]
pub struct CancelParticipant {
    /// User issuing the command.
    pub actor: Uuid,
    /// Participant to cancel.
    pub participant_id: Uuid,
    /// Snapshot version the caller read before issuing the command.
    pub expected_version: i64,
}
