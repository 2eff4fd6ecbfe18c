//! Task aggregate events.

use serde::{Deserialize, Serialize};
use siteline_core::audit::AuditInfo;
use uuid::Uuid;

/// Event kinds a task stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskEventKind {
    /// The task was created.
    Created,
    /// Task master data changed.
    Updated,
    /// A participant was assigned.
    Assigned,
    /// The assignee was removed.
    Unassigned,
    /// Work on the task finished.
    Closed,
    /// The task was deleted.
    Deleted,
}

/// Workflow status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not yet released to the crew.
    Draft,
    /// Released and workable.
    Open,
    /// Work has begun.
    Started,
    /// Work finished.
    Closed,
}

impl TaskStatus {
    /// Column value used by the snapshot store.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Open => "OPEN",
            Self::Started => "STARTED",
            Self::Closed => "CLOSED",
        }
    }

    /// Parses a column value back into a status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DRAFT" => Some(Self::Draft),
            "OPEN" => Some(Self::Open),
            "STARTED" => Some(Self::Started),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Full task state as carried by every task event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskData {
    /// Audit trail after the event.
    pub audit: AuditInfo,
    /// Project the task belongs to.
    pub project_id: Uuid,
    /// Task name.
    pub name: String,
    /// Workflow status.
    pub status: TaskStatus,
    /// Assigned participant, if any.
    pub assignee: Option<Uuid>,
}

/// One event of a task stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    /// What happened.
    pub kind: TaskEventKind,
    /// Task state after the event.
    pub data: TaskData,
}

impl TaskEvent {
    /// Pairs a kind with the state it produced.
    #[must_use]
    pub fn new(kind: TaskEventKind, data: TaskData) -> Self {
        Self { kind, data }
    }
}
