//! Siteline Task — the Task bounded context.
//!
//! Tasks are scoped to a project and carry an assignment and workflow
//! status. The snapshot store refuses events for tasks whose project has
//! not been replicated yet; cross-partition ordering makes that a
//! temporary condition the transport resolves by redelivery.

pub mod application;
pub mod domain;

pub use application::snapshot_store::TaskSnapshotStore;
pub use domain::snapshot::TaskSnapshot;
