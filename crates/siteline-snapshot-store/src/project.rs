//! PostgreSQL repository for project snapshots.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use sqlx::postgres::PgRow;
use uuid::Uuid;

use siteline_core::audit::AuditInfo;
use siteline_core::error::DomainError;
use siteline_core::snapshot::SnapshotRepository;
use siteline_project::ProjectSnapshot;

use crate::storage_error;

/// PostgreSQL-backed project snapshot repository.
#[derive(Debug, Clone)]
pub struct PgProjectRepository {
    pool: PgPool,
}

impl PgProjectRepository {
    /// Creates a repository over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_snapshot(row: &PgRow) -> Result<ProjectSnapshot, DomainError> {
    let read = |error: sqlx::Error| storage_error(&error);
    Ok(ProjectSnapshot {
        identifier: row.try_get("identifier").map_err(read)?,
        version: row.try_get("version").map_err(read)?,
        audit: AuditInfo {
            created_by: row.try_get("created_by").map_err(read)?,
            created_at: row.try_get("created_at").map_err(read)?,
            last_modified_by: row.try_get("last_modified_by").map_err(read)?,
            last_modified_at: row.try_get("last_modified_at").map_err(read)?,
        },
        title: row.try_get("title").map_err(read)?,
        start_date: row.try_get("start_date").map_err(read)?,
        end_date: row.try_get("end_date").map_err(read)?,
    })
}

#[async_trait]
impl SnapshotRepository<ProjectSnapshot> for PgProjectRepository {
    async fn find(&self, id: Uuid) -> Result<Option<ProjectSnapshot>, DomainError> {
        let row = sqlx::query(
            "SELECT identifier, version, created_by, created_at, last_modified_by, \
             last_modified_at, title, start_date, end_date \
             FROM project_snapshot WHERE identifier = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| storage_error(&error))?;
        row.as_ref().map(row_to_snapshot).transpose()
    }

    async fn insert(&self, snapshot: &ProjectSnapshot) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO project_snapshot \
             (identifier, version, created_by, created_at, last_modified_by, \
              last_modified_at, title, start_date, end_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(snapshot.identifier)
        .bind(snapshot.version)
        .bind(snapshot.audit.created_by)
        .bind(snapshot.audit.created_at)
        .bind(snapshot.audit.last_modified_by)
        .bind(snapshot.audit.last_modified_at)
        .bind(&snapshot.title)
        .bind(snapshot.start_date)
        .bind(snapshot.end_date)
        .execute(&self.pool)
        .await
        .map_err(|error| storage_error(&error))?;
        Ok(())
    }

    async fn update(
        &self,
        snapshot: &ProjectSnapshot,
        expected_version: i64,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE project_snapshot SET version = $2, last_modified_by = $3, \
             last_modified_at = $4, title = $5, start_date = $6, end_date = $7 \
             WHERE identifier = $1 AND version = $8",
        )
        .bind(snapshot.identifier)
        .bind(snapshot.version)
        .bind(snapshot.audit.last_modified_by)
        .bind(snapshot.audit.last_modified_at)
        .bind(&snapshot.title)
        .bind(snapshot.start_date)
        .bind(snapshot.end_date)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(|error| storage_error(&error))?;
        if result.rows_affected() == 0 {
            return Err(lost_update(&self.pool, "project_snapshot", snapshot.identifier, expected_version).await);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM project_snapshot WHERE identifier = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|error| storage_error(&error))?;
        Ok(())
    }

    async fn delete_by_root_context(&self, root_context: Uuid) -> Result<u64, DomainError> {
        // The project is its own root context; at most one row matches.
        let result = sqlx::query("DELETE FROM project_snapshot WHERE identifier = $1")
            .bind(root_context)
            .execute(&self.pool)
            .await
            .map_err(|error| storage_error(&error))?;
        Ok(result.rows_affected())
    }

    async fn find_by_root_context(
        &self,
        root_context: Uuid,
    ) -> Result<Vec<ProjectSnapshot>, DomainError> {
        let rows = sqlx::query(
            "SELECT identifier, version, created_by, created_at, last_modified_by, \
             last_modified_at, title, start_date, end_date \
             FROM project_snapshot WHERE identifier = $1 ORDER BY identifier",
        )
        .bind(root_context)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_error(&error))?;
        rows.iter().map(row_to_snapshot).collect()
    }
}

/// Decides what a zero-row versioned UPDATE means: a vanished row or a
/// lost update against a newer version.
pub(crate) async fn lost_update(
    pool: &PgPool,
    table: &str,
    id: Uuid,
    expected_version: i64,
) -> DomainError {
    let query = format!("SELECT version FROM {table} WHERE identifier = $1");
    match sqlx::query(&query).bind(id).fetch_optional(pool).await {
        Ok(Some(row)) => match row.try_get::<i64, _>("version") {
            Ok(encountered) => DomainError::ConcurrencyConflict {
                aggregate_id: id,
                required: expected_version,
                encountered,
            },
            Err(error) => storage_error(&error),
        },
        Ok(None) => DomainError::AggregateNotFound(id),
        Err(error) => storage_error(&error),
    }
}
