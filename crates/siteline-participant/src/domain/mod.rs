//! Domain model of the Participant and Invitation contexts.

pub mod commands;
pub mod snapshot;
