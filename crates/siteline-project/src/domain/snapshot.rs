//! Project snapshot row.

use chrono::NaiveDate;
use siteline_core::audit::AuditInfo;
use siteline_core::snapshot::VersionedSnapshot;
use siteline_messages::ProjectData;
use uuid::Uuid;

/// Materialized current state of one project.
///
/// The project is its own root context: its identifier is the routing key
/// value of the whole partition.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSnapshot {
    /// Project identifier.
    pub identifier: Uuid,
    /// Version of the last applied event.
    pub version: i64,
    /// Audit trail.
    pub audit: AuditInfo,
    /// Project title.
    pub title: String,
    /// Planned construction start.
    pub start_date: NaiveDate,
    /// Planned construction end.
    pub end_date: NaiveDate,
}

impl ProjectSnapshot {
    /// Builds the snapshot an event at `version` describes.
    #[must_use]
    pub fn from_event(identifier: Uuid, version: i64, data: &ProjectData) -> Self {
        Self {
            identifier,
            version,
            audit: data.audit,
            title: data.title.clone(),
            start_date: data.start_date,
            end_date: data.end_date,
        }
    }

    /// Replaces the domain fields with the state an update event carries.
    pub fn apply_data(&mut self, data: &ProjectData) {
        self.audit = data.audit;
        self.title = data.title.clone();
        self.start_date = data.start_date;
        self.end_date = data.end_date;
    }

    /// The full state of this snapshot as an event payload carries it.
    #[must_use]
    pub fn to_data(&self) -> ProjectData {
        ProjectData {
            audit: self.audit,
            title: self.title.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

impl VersionedSnapshot for ProjectSnapshot {
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
        self.identifier
    }

    fn audit(&self) -> &AuditInfo {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut AuditInfo {
        &mut self.audit
    }
}
