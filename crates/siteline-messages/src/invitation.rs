//! Invitation aggregate events.
//!
//! An invitation belongs to a participant that may not have its own events
//! yet. The snapshot store materializes a placeholder participant row in
//! that case so the invitation always has a parent to hang off.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siteline_core::audit::AuditInfo;
use uuid::Uuid;

/// Event kinds an invitation stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvitationEventKind {
    /// The invitation was issued.
    Created,
    /// The invitation email was sent again.
    Resent,
}

/// Full invitation state as carried by every invitation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitationData {
    /// Audit trail after the event.
    pub audit: AuditInfo,
    /// Project the invitation belongs to.
    pub project_id: Uuid,
    /// Participant the invitation is for.
    pub participant_id: Uuid,
    /// Address the invitation was sent to.
    pub email: String,
    /// When the invitation email last went out.
    pub last_sent: DateTime<Utc>,
}

/// One event of an invitation stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitationEvent {
    /// What happened.
    pub kind: InvitationEventKind,
    /// Invitation state after the event.
    pub data: InvitationData,
}

impl InvitationEvent {
    /// Pairs a kind with the state it produced.
    #[must_use]
    pub fn new(kind: InvitationEventKind, data: InvitationData) -> Self {
        Self { kind, data }
    }
}
