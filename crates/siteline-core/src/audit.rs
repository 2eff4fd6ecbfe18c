//! Audit trail value embedded in snapshots and event payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who created and last modified an aggregate, and when.
///
/// Embedded as a plain value in every snapshot row and event payload rather
/// than inherited from an auditable base entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    /// User that created the aggregate.
    pub created_by: Uuid,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// User of the most recent modification.
    pub last_modified_by: Uuid,
    /// Time of the most recent modification.
    pub last_modified_at: DateTime<Utc>,
}

impl AuditInfo {
    /// Audit value for a freshly created aggregate: creation and
    /// modification fields coincide.
    #[must_use]
    pub fn created(actor: Uuid, at: DateTime<Utc>) -> Self {
        Self {
            created_by: actor,
            created_at: at,
            last_modified_by: actor,
            last_modified_at: at,
        }
    }

    /// Records a modification, leaving the creation fields untouched.
    pub fn touch(&mut self, actor: Uuid, at: DateTime<Utc>) {
        self.last_modified_by = actor;
        self.last_modified_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_keeps_creation_fields() {
        // Arrange
        let creator = Uuid::new_v4();
        let editor = Uuid::new_v4();
        let created_at = Utc::now();
        let mut audit = AuditInfo::created(creator, created_at);

        // Act
        audit.touch(editor, created_at + chrono::Duration::seconds(30));

        // Assert
        assert_eq!(audit.created_by, creator);
        assert_eq!(audit.created_at, created_at);
        assert_eq!(audit.last_modified_by, editor);
        assert!(audit.last_modified_at > audit.created_at);
    }
}
