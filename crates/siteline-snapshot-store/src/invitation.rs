//! PostgreSQL repository for invitation snapshots.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use sqlx::postgres::PgRow;
use uuid::Uuid;

use siteline_core::audit::AuditInfo;
use siteline_core::error::DomainError;
use siteline_core::snapshot::SnapshotRepository;
use siteline_participant::InvitationSnapshot;

use crate::project::lost_update;
use crate::storage_error;

/// PostgreSQL-backed invitation snapshot repository.
#[derive(Debug, Clone)]
pub struct PgInvitationRepository {
    pool: PgPool,
}

impl PgInvitationRepository {
    /// Creates a repository over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str = "identifier, version, created_by, created_at, last_modified_by, \
                       last_modified_at, project_id, participant_id, email, last_sent";

fn row_to_snapshot(row: &PgRow) -> Result<InvitationSnapshot, DomainError> {
    let read = |error: sqlx::Error| storage_error(&error);
    Ok(InvitationSnapshot {
        identifier: row.try_get("identifier").map_err(read)?,
        version: row.try_get("version").map_err(read)?,
        audit: AuditInfo {
            created_by: row.try_get("created_by").map_err(read)?,
            created_at: row.try_get("created_at").map_err(read)?,
            last_modified_by: row.try_get("last_modified_by").map_err(read)?,
            last_modified_at: row.try_get("last_modified_at").map_err(read)?,
        },
        project_id: row.try_get("project_id").map_err(read)?,
        participant_id: row.try_get("participant_id").map_err(read)?,
        email: row.try_get("email").map_err(read)?,
        last_sent: row.try_get("last_sent").map_err(read)?,
    })
}

#[async_trait]
impl SnapshotRepository<InvitationSnapshot> for PgInvitationRepository {
    async fn find(&self, id: Uuid) -> Result<Option<InvitationSnapshot>, DomainError> {
        let query = format!("SELECT {COLUMNS} FROM invitation_snapshot WHERE identifier = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| storage_error(&error))?;
        row.as_ref().map(row_to_snapshot).transpose()
    }

    async fn insert(&self, snapshot: &InvitationSnapshot) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO invitation_snapshot \
             (identifier, version, created_by, created_at, last_modified_by, \
              last_modified_at, project_id, participant_id, email, last_sent) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(snapshot.identifier)
        .bind(snapshot.version)
        .bind(snapshot.audit.created_by)
        .bind(snapshot.audit.created_at)
        .bind(snapshot.audit.last_modified_by)
        .bind(snapshot.audit.last_modified_at)
        .bind(snapshot.project_id)
        .bind(snapshot.participant_id)
        .bind(&snapshot.email)
        .bind(snapshot.last_sent)
        .execute(&self.pool)
        .await
        .map_err(|error| storage_error(&error))?;
        Ok(())
    }

    async fn update(
        &self,
        snapshot: &InvitationSnapshot,
        expected_version: i64,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE invitation_snapshot SET version = $2, last_modified_by = $3, \
             last_modified_at = $4, project_id = $5, participant_id = $6, \
             email = $7, last_sent = $8 WHERE identifier = $1 AND version = $9",
        )
        .bind(snapshot.identifier)
        .bind(snapshot.version)
        .bind(snapshot.audit.last_modified_by)
        .bind(snapshot.audit.last_modified_at)
        .bind(snapshot.project_id)
        .bind(snapshot.participant_id)
        .bind(&snapshot.email)
        .bind(snapshot.last_sent)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(|error| storage_error(&error))?;
        if result.rows_affected() == 0 {
            return Err(lost_update(&self.pool, "invitation_snapshot", snapshot.identifier, expected_version).await);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM invitation_snapshot WHERE identifier = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|error| storage_error(&error))?;
        Ok(())
    }

    async fn delete_by_root_context(&self, root_context: Uuid) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM invitation_snapshot WHERE project_id = $1")
            .bind(root_context)
            .execute(&self.pool)
            .await
            .map_err(|error| storage_error(&error))?;
        Ok(result.rows_affected())
    }

    async fn find_by_root_context(
        &self,
        root_context: Uuid,
    ) -> Result<Vec<InvitationSnapshot>, DomainError> {
        let query = format!(
            "SELECT {COLUMNS} FROM invitation_snapshot WHERE project_id = $1 ORDER BY identifier"
        );
        let rows = sqlx::query(&query)
            .bind(root_context)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| storage_error(&error))?;
        rows.iter().map(row_to_snapshot).collect()
    }
}
