//! Store configuration read from the environment.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use siteline_core::error::DomainError;

use crate::storage_error;

/// Connection settings of the snapshot database.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Upper bound of the connection pool.
    pub max_connections: u32,
}

impl StoreConfig {
    /// Reads the configuration from `DATABASE_URL` and
    /// `DATABASE_MAX_CONNECTIONS` (default 10).
    ///
    /// # Errors
    ///
    /// Returns `Storage` when `DATABASE_URL` is unset or the connection
    /// bound does not parse.
    pub fn from_env() -> Result<Self, DomainError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            DomainError::Storage("DATABASE_URL environment variable must be set".to_owned())
        })?;
        let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(value) => value.parse().map_err(|error| {
                DomainError::Storage(format!(
                    "DATABASE_MAX_CONNECTIONS must be a number: {error}"
                ))
            })?,
            Err(_) => 10,
        };
        Ok(Self {
            database_url,
            max_connections,
        })
    }

    /// Opens the connection pool.
    ///
    /// # Errors
    ///
    /// Returns `Storage` when the database is unreachable.
    pub async fn connect(&self) -> Result<PgPool, DomainError> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await
            .map_err(|error| storage_error(&error))
    }
}
