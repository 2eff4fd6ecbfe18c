//! Project aggregate events.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use siteline_core::audit::AuditInfo;

/// Event kinds a project stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectEventKind {
    /// The project was created.
    Created,
    /// Project master data changed.
    Updated,
    /// The project was deleted; everything scoped to it goes with it.
    Deleted,
}

/// Full project state as carried by every project event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectData {
    /// Audit trail after the event.
    pub audit: AuditInfo,
    /// Project title.
    pub title: String,
    /// Planned construction start.
    pub start_date: NaiveDate,
    /// Planned construction end.
    pub end_date: NaiveDate,
}

/// One event of a project stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectEvent {
    /// What happened.
    pub kind: ProjectEventKind,
    /// Project state after the event.
    pub data: ProjectData,
}

impl ProjectEvent {
    /// Pairs a kind with the state it produced.
    #[must_use]
    pub fn new(kind: ProjectEventKind, data: ProjectData) -> Self {
        Self { kind, data }
    }
}
