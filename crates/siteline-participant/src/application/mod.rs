//! Application layer of the Participant and Invitation contexts.

pub mod command_handlers;
pub mod snapshot_store;
