//! Application layer of the Task context.

pub mod command_handlers;
pub mod snapshot_store;
