//! Commands of the Project context.

use chrono::NaiveDate;
use uuid::Uuid;

/// Command to create a project.
#[derive(Debug, Clone)]
pub struct CreateProject {
    /// User issuing the command.
    pub actor: Uuid,
    /// Project title.
    pub title: String,
    /// Planned construction start.
    pub start_date: NaiveDate,
    /// Planned construction end.
    pub end_date: NaiveDate,
}

/// Command to rename a project.
#[derive(Debug, Clone)]
pub struct RenameProject {
    /// User issuing the command.
    pub actor: Uuid,
    /// Project to rename.
    pub project_id: Uuid,
    /// Snapshot version the caller read before issuing the command.
    pub expected_version: i64,
    /// New title.
    pub title: String,
}

/// Command to delete a project and everything scoped to it.
#[derive(Debug, Clone)]
pub struct DeleteProject {
    /// User issuing the command.
    pub actor: Uuid,
    /// Project to delete.
    pub project_id: Uuid,
    /// Snapshot version the caller read before issuing the command.
    pub expected_version: i64,
}
