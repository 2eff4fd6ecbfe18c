//! Task snapshot row.

use siteline_core::audit::AuditInfo;
use siteline_core::snapshot::VersionedSnapshot;
use siteline_messages::{TaskData, TaskStatus};
use uuid::Uuid;

/// Materialized current state of one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    /// Task identifier.
    pub identifier: Uuid,
    /// Version of the last applied event.
    pub version: i64,
    /// Audit trail.
    pub audit: AuditInfo,
    /// Project the task is scoped to.
    pub project_id: Uuid,
    /// Task name.
    pub name: String,
    /// Workflow status.
    pub status: TaskStatus,
    /// Assigned participant, if any.
    pub assignee: Option<Uuid>,
}

impl TaskSnapshot {
    /// Builds the snapshot an event at `version` describes.
    #[must_use]
    pub fn from_event(identifier: Uuid, version: i64, data: &TaskData) -> Self {
        Self {
            identifier,
            version,
            audit: data.audit,
            project_id: data.project_id,
            name: data.name.clone(),
            status: data.status,
            assignee: data.assignee,
        }
    }

    /// Replaces the domain fields with the state an update event carries.
    pub fn apply_data(&mut self, data: &TaskData) {
        self.audit = data.audit;
        self.project_id = data.project_id;
        self.name = data.name.clone();
        self.status = data.status;
        self.assignee = data.assignee;
    }

    /// The full state of this snapshot as an event payload carries it.
    #[must_use]
    pub fn to_data(&self) -> TaskData {
        TaskData {
            audit: self.audit,
            project_id: self.project_id,
            name: self.name.clone(),
            status: self.status,
            assignee: self.assignee,
        }
    }
}

impl VersionedSnapshot for TaskSnapshot {
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
