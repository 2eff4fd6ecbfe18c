//! Commands of the Task context.

use uuid::Uuid;

/// Command to create a task within a project.
#[derive(Debug, Clone)]
pub struct CreateTask {
    /// User issuing the command.
    pub actor: Uuid,
    /// Project the task belongs to.
    pub project_id: Uuid,
    /// Task name.
    pub name: String,
}

/// Command to assign a participant to a task.
#[derive(Debug, Clone)]
pub struct AssignTask {
    /// User issuing the command.
    pub actor: Uuid,
    /// Task to assign.
    pub task_id: Uuid,
    /// Snapshot version the caller read before issuing the command.
    pub expected_version: i64,
    /// Participant to put on the task.
    pub assignee: Uuid,
}

/// Command to remove the current assignee from a task.
#[derive(Debug, Clone)]
pub struct UnassignTask {
    /// User issuing the command.
    pub actor: Uuid,
    /// Task to unassign.
    pub task_id: Uuid,
    /// Snapshot version the caller read before issuing the command.
    pub expected_version: i64,
}

/// Command to close a task.
#[derive(Debug, Clone)]
pub struct CloseTask {
    /// User issuing the command.
    pub actor: Uuid,
    /// Task to close.
    pub task_id: Uuid,
    /// Snapshot version the caller read before issuing the command.
    pub expected_version: i64,
}

/// Command to delete a task.
#[derive(Debug, Clone)]
pub struct DeleteTask {
    /// User issuing the command.
    pub actor: Uuid,
    /// Task to delete.
    pub task_id: Uuid,
    /// Snapshot version the caller read before issuing the command.
    pub expected_version: i64,
}
