//! Siteline Snapshot Store — PostgreSQL repositories behind the snapshot
//! and transaction-buffer ports.
//!
//! Every repository maps `rows_affected() == 0` on a versioned UPDATE to
//! a concurrency conflict, so a lost update surfaces instead of silently
//! overwriting newer state.

pub mod buffer;
pub mod config;
pub mod invitation;
pub mod participant;
pub mod project;
pub mod schema;
pub mod task;

pub use buffer::PgTransactionBufferRepository;
pub use config::StoreConfig;
pub use invitation::PgInvitationRepository;
pub use participant::PgParticipantRepository;
pub use project::PgProjectRepository;
pub use task::PgTaskRepository;

use siteline_core::error::DomainError;

pub(crate) fn storage_error(error: &sqlx::Error) -> DomainError {
    DomainError::Storage(error.to_string())
}
