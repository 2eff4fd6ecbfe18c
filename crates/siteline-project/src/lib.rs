//! Siteline Project — the Project bounded context.
//!
//! Projects are the root context of the platform: every task, participant
//! and invitation is scoped to one, and the project's routing key orders
//! the whole partition. Deleting a project therefore cascades across every
//! context that keeps rows for it.

pub mod application;
pub mod domain;

pub use application::snapshot_store::ProjectSnapshotStore;
pub use domain::snapshot::ProjectSnapshot;
