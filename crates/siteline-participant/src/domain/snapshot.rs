//! Participant and invitation snapshot rows.

use chrono::{DateTime, Utc};
use siteline_core::audit::AuditInfo;
use siteline_core::snapshot::{PLACEHOLDER_VERSION, VersionedSnapshot};
use siteline_messages::{InvitationData, ParticipantData, ParticipantRole, ParticipantStatus};
use uuid::Uuid;

/// Materialized current state of one participant.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantSnapshot {
    /// Participant identifier.
    pub identifier: Uuid,
    /// Version of the last applied event, or [`PLACEHOLDER_VERSION`] for a
    /// row the invitation store materialized ahead of the stream.
    pub version: i64,
    /// Audit trail.
    pub audit: AuditInfo,
    /// Project the participation is scoped to.
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

impl ParticipantSnapshot {
    /// Builds the snapshot an event at `version` describes.
    #[must_use]
    pub fn from_event(identifier: Uuid, version: i64, data: &ParticipantData) -> Self {
        Self {
            identifier,
            version,
            audit: data.audit,
            project_id: data.project_id,
            user: data.user,
            email: data.email.clone(),
            role: data.role,
            status: data.status,
        }
    }

    /// Minimal row standing in for a participant whose own events have not
    /// arrived yet, built from the invitation that references it.
    ///
    /// Sits at [`PLACEHOLDER_VERSION`] so the participant's creation event
    /// (version 0) reconciles it as an ordinary update.
    #[must_use]
    pub fn placeholder(identifier: Uuid, project_id: Uuid, email: &str, audit: AuditInfo) -> Self {
        Self {
            identifier,
            version: PLACEHOLDER_VERSION,
            audit,
            project_id,
            user: None,
            email: Some(email.to_owned()),
            role: ParticipantRole::Worker,
            status: ParticipantStatus::Invited,
        }
    }

    /// Whether this row is still the placeholder the invitation store made.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.version == PLACEHOLDER_VERSION
    }

    /// Replaces the domain fields with the state an update event carries.
    ///
    /// An event without an email keeps the stored one: the invitation that
    /// placeholdered this row knew the address even if the participant
    /// stream never carries it.
    pub fn apply_data(&mut self, data: &ParticipantData) {
        self.audit = data.audit;
        self.project_id = data.project_id;
        self.user = data.user;
        if data.email.is_some() {
            self.email = data.email.clone();
        }
        self.role = data.role;
        self.status = data.status;
    }

    /// The full state of this snapshot as an event payload carries it.
    #[must_use]
    pub fn to_data(&self) -> ParticipantData {
        ParticipantData {
            audit: self.audit,
            project_id: self.project_id,
            user: self.user,
            email: self.email.clone(),
            role: self.role,
            status: self.status,
        }
    }
}

impl VersionedSnapshot for ParticipantSnapshot {
    fn identifier(&self) -> Uuid {
        self.identifier
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn root_context(&self) -> Uuid {
        self.project_id
    }

    fn audit(&self) -> &AuditInfo {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut AuditInfo {
        &mut self.audit
    }
}

/// Materialized current state of one invitation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvitationSnapshot {
    /// Invitation identifier.
    pub identifier: Uuid,
    /// Version of the last applied event.
    pub version: i64,
    /// Audit trail.
    pub audit: AuditInfo,
    /// Project the invitation is scoped to.
    pub project_id: Uuid,
    /// Participant the invitation is for.
    pub participant_id: Uuid,
    /// Address the invitation was sent to.
    pub email: String,
    /// When the invitation email last went out.
    pub last_sent: DateTime<Utc>,
}

impl InvitationSnapshot {
    /// Builds the snapshot an event at `version` describes.
    #[must_use]
    pub fn from_event(identifier: Uuid, version: i64, data: &InvitationData) -> Self {
        Self {
            identifier,
            version,
            audit: data.audit,
            project_id: data.project_id,
            participant_id: data.participant_id,
            email: data.email.clone(),
            last_sent: data.last_sent,
        }
    }

    /// Replaces the domain fields with the state an update event carries.
    pub fn apply_data(&mut self, data: &InvitationData) {
        self.audit = data.audit;
        self.project_id = data.project_id;
        self.participant_id = data.participant_id;
        self.email = data.email.clone();
        self.last_sent = data.last_sent;
    }

    /// The full state of this snapshot as an event payload carries it.
    #[must_use]
    pub fn to_data(&self) -> InvitationData {
        InvitationData {
            audit: self.audit,
            project_id: self.project_id,
            participant_id: self.participant_id,
            email: self.email.clone(),
            last_sent: self.last_sent,
        }
    }
}

impl VersionedSnapshot for InvitationSnapshot {
    fn identifier(&self) -> Uuid {
        self.identifier
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn root_context(&self) -> Uuid {
        self.project_id
    }

    fn audit(&self) -> &AuditInfo {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut AuditInfo {
        &mut self.audit
    }
}
