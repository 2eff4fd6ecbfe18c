//! PostgreSQL repository for participant snapshots.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use sqlx::postgres::PgRow;
use uuid::Uuid;

use siteline_core::audit::AuditInfo;
use siteline_core::error::DomainError;
use siteline_core::snapshot::SnapshotRepository;
use siteline_messages::{ParticipantRole, ParticipantStatus};
use siteline_participant::ParticipantSnapshot;

use crate::project::lost_update;
use crate::storage_error;

/// PostgreSQL-backed participant snapshot repository.
///
/// Placeholder rows live in the same table at the sentinel version; no
/// separate marker column is needed.
#[derive(Debug, Clone)]
pub struct PgParticipantRepository {
    pool: PgPool,
}

impl PgParticipantRepository {
    /// Creates a repository over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str = "identifier, version, created_by, created_at, last_modified_by, \
                       last_modified_at, project_id, user_id, email, role, status";

fn row_to_snapshot(row: &PgRow) -> Result<ParticipantSnapshot, DomainError> {
    let read = |error: sqlx::Error| storage_error(&error);
    let role: String = row.try_get("role").map_err(read)?;
    let role = ParticipantRole::parse(&role).ok_or_else(|| {
        DomainError::Storage(format!("unknown participant role column value {role}"))
    })?;
    let status: String = row.try_get("status").map_err(read)?;
    let status = ParticipantStatus::parse(&status).ok_or_else(|| {
        DomainError::Storage(format!("unknown participant status column value {status}"))
    })?;
    Ok(ParticipantSnapshot {
        identifier: row.try_get("identifier").map_err(read)?,
        version: row.try_get("version").map_err(read)?,
        audit: AuditInfo {
            created_by: row.try_get("created_by").map_err(read)?,
            created_at: row.try_get("created_at").map_err(read)?,
            last_modified_by: row.try_get("last_modified_by").map_err(read)?,
            last_modified_at: row.try_get("last_modified_at").map_err(read)?,
        },
        project_id: row.try_get("project_id").map_err(read)?,
        user: row.try_get("user_id").map_err(read)?,
        email: row.try_get("email").map_err(read)?,
        role,
        status,
    })
}

#[async_trait]
impl SnapshotRepository<ParticipantSnapshot> for PgParticipantRepository {
    async fn find(&self, id: Uuid) -> Result<Option<ParticipantSnapshot>, DomainError> {
        let query = format!("SELECT {COLUMNS} FROM participant_snapshot WHERE identifier = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| storage_error(&error))?;
        row.as_ref().map(row_to_snapshot).transpose()
    }

    async fn insert(&self, snapshot: &ParticipantSnapshot) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO participant_snapshot \
             (identifier, version, created_by, created_at, last_modified_by, \
              last_modified_at, project_id, user_id, email, role, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(snapshot.identifier)
        .bind(snapshot.version)
        .bind(snapshot.audit.created_by)
        .bind(snapshot.audit.created_at)
        .bind(snapshot.audit.last_modified_by)
        .bind(snapshot.audit.last_modified_at)
        .bind(snapshot.project_id)
        .bind(snapshot.user)
        .bind(snapshot.email.as_deref())
        .bind(snapshot.role.as_str())
        .bind(snapshot.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| storage_error(&error))?;
        Ok(())
    }

    async fn update(
        &self,
        snapshot: &ParticipantSnapshot,
        expected_version: i64,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE participant_snapshot SET version = $2, last_modified_by = $3, \
             last_modified_at = $4, project_id = $5, user_id = $6, email = $7, \
             role = $8, status = $9 WHERE identifier = $1 AND version = $10",
        )
        .bind(snapshot.identifier)
        .bind(snapshot.version)
        .bind(snapshot.audit.last_modified_by)
        .bind(snapshot.audit.last_modified_at)
        .bind(snapshot.project_id)
        .bind(snapshot.user)
        .bind(snapshot.email.as_deref())
        .bind(snapshot.role.as_str())
        .bind(snapshot.status.as_str())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(|error| storage_error(&error))?;
        if result.rows_affected() == 0 {
            return Err(lost_update(&self.pool, "participant_snapshot", snapshot.identifier, expected_version).await);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM participant_snapshot WHERE identifier = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|error| storage_error(&error))?;
        Ok(())
    }

    async fn delete_by_root_context(&self, root_context: Uuid) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM participant_snapshot WHERE project_id = $1")
            .bind(root_context)
            .execute(&self.pool)
            .await
            .map_err(|error| storage_error(&error))?;
        Ok(result.rows_affected())
    }

    async fn find_by_root_context(
        &self,
        root_context: Uuid,
    ) -> Result<Vec<ParticipantSnapshot>, DomainError> {
        let query = format!(
            "SELECT {COLUMNS} FROM participant_snapshot WHERE project_id = $1 ORDER BY identifier"
        );
        let rows = sqlx::query(&query)
            .bind(root_context)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| storage_error(&error))?;
        rows.iter().map(row_to_snapshot).collect()
    }
}
