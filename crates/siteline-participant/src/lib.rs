//! Siteline Participant — the Participant and Invitation bounded contexts.
//!
//! Participant and invitation streams are ordered independently of each
//! other, so an invitation can arrive before the participant it belongs
//! to. The invitation store bridges the gap with a placeholder participant
//! row at the sentinel version, reconciled by the participant's first
//! genuine event.

pub mod application;
pub mod domain;

pub use application::snapshot_store::{InvitationSnapshotStore, ParticipantSnapshotStore};
pub use domain::snapshot::{InvitationSnapshot, ParticipantSnapshot};
