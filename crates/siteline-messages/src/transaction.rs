//! Business transaction marker payloads.
//!
//! Multi-aggregate operations frame their events between a started and a
//! finished marker on the same routing key. Consumers buffer everything in
//! between and replay the run as one unit once the finished marker arrives.

use serde::{Deserialize, Serialize};

/// What kind of business operation a transaction frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// A project imported from an external file.
    ProjectImport,
    /// A project duplicated from an existing one.
    ProjectCopy,
    /// A bulk shift of task dates within a project.
    Reschedule,
}

impl TransactionKind {
    /// Whether consumers should replay the run without side effects.
    ///
    /// Imports and copies move data that already exists somewhere else;
    /// notifying listeners about every copied row would spam downstream
    /// systems with events nobody acted on.
    #[must_use]
    pub fn is_data_only(self) -> bool {
        matches!(self, Self::ProjectImport | Self::ProjectCopy)
    }
}

/// Payload of a transaction started marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStartedPayload {
    /// Operation the transaction frames.
    pub kind: TransactionKind,
}

/// Payload of a transaction finished marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFinishedPayload {
    /// Operation the transaction frames.
    pub kind: TransactionKind,
}
