//! Domain model of the Project context.

pub mod commands;
pub mod snapshot;
