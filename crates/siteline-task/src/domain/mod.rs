//! Domain model of the Task context.

pub mod commands;
pub mod snapshot;
