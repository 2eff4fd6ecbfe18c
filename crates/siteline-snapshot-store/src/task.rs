//! PostgreSQL repository for task snapshots.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use sqlx::postgres::PgRow;
use uuid::Uuid;

use siteline_core::audit::AuditInfo;
use siteline_core::error::DomainError;
use siteline_core::snapshot::SnapshotRepository;
use siteline_messages::TaskStatus;
use siteline_task::TaskSnapshot;

use crate::project::lost_update;
use crate::storage_error;

/// PostgreSQL-backed task snapshot repository.
#[derive(Debug, Clone)]
pub struct PgTaskRepository {
    pool: PgPool,
}

impl PgTaskRepository {
    /// Creates a repository over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str = "identifier, version, created_by, created_at, last_modified_by, \
                       last_modified_at, project_id, name, status, assignee";

fn row_to_snapshot(row: &PgRow) -> Result<TaskSnapshot, DomainError> {
    let read = |error: sqlx::Error| storage_error(&error);
    let status: String = row.try_get("status").map_err(read)?;
    let status = TaskStatus::parse(&status)
        .ok_or_else(|| DomainError::Storage(format!("unknown task status column value {status}")))?;
    Ok(TaskSnapshot {
        identifier: row.try_get("identifier").map_err(read)?,
        version: row.try_get("version").map_err(read)?,
        audit: AuditInfo {
            created_by: row.try_get("created_by").map_err(read)?,
            created_at: row.try_get("created_at").map_err(read)?,
            last_modified_by: row.try_get("last_modified_by").map_err(read)?,
            last_modified_at: row.try_get("last_modified_at").map_err(read)?,
        },
        project_id: row.try_get("project_id").map_err(read)?,
        name: row.try_get("name").map_err(read)?,
        status,
        assignee: row.try_get("assignee").map_err(read)?,
    })
}

#[async_trait]
impl SnapshotRepository<TaskSnapshot> for PgTaskRepository {
    async fn find(&self, id: Uuid) -> Result<Option<TaskSnapshot>, DomainError> {
        let query = format!("SELECT {COLUMNS} FROM task_snapshot WHERE identifier = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| storage_error(&error))?;
        row.as_ref().map(row_to_snapshot).transpose()
    }

    async fn insert(&self, snapshot: &TaskSnapshot) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO task_snapshot \
             (identifier, version, created_by, created_at, last_modified_by, \
              last_modified_at, project_id, name, status, assignee) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(snapshot.identifier)
        .bind(snapshot.version)
        .bind(snapshot.audit.created_by)
        .bind(snapshot.audit.created_at)
        .bind(snapshot.audit.last_modified_by)
        .bind(snapshot.audit.last_modified_at)
        .bind(snapshot.project_id)
        .bind(&snapshot.name)
        .bind(snapshot.status.as_str())
        .bind(snapshot.assignee)
        .execute(&self.pool)
        .await
        .map_err(|error| storage_error(&error))?;
        Ok(())
    }

    async fn update(
        &self,
        snapshot: &TaskSnapshot,
        expected_version: i64,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE task_snapshot SET version = $2, last_modified_by = $3, \
             last_modified_at = $4, project_id = $5, name = $6, status = $7, \
             assignee = $8 WHERE identifier = $1 AND version = $9",
        )
        .bind(snapshot.identifier)
        .bind(snapshot.version)
        .bind(snapshot.audit.last_modified_by)
        .bind(snapshot.audit.last_modified_at)
        .bind(snapshot.project_id)
        .bind(&snapshot.name)
        .bind(snapshot.status.as_str())
        .bind(snapshot.assignee)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(|error| storage_error(&error))?;
        if result.rows_affected() == 0 {
            return Err(lost_update(&self.pool, "task_snapshot", snapshot.identifier, expected_version).await);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM task_snapshot WHERE identifier = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|error| storage_error(&error))?;
        Ok(())
    }

    async fn delete_by_root_context(&self, root_context: Uuid) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM task_snapshot WHERE project_id = $1")
            .bind(root_context)
            .execute(&self.pool)
            .await
            .map_err(|error| storage_error(&error))?;
        Ok(result.rows_affected())
    }

    async fn find_by_root_context(
        &self,
        root_context: Uuid,
    ) -> Result<Vec<TaskSnapshot>, DomainError> {
        let query =
            format!("SELECT {COLUMNS} FROM task_snapshot WHERE project_id = $1 ORDER BY identifier");
        let rows = sqlx::query(&query)
            .bind(root_context)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| storage_error(&error))?;
        rows.iter().map(row_to_snapshot).collect()
    }
}
