//! Application layer of the Project context.

pub mod command_handlers;
pub mod snapshot_store;
