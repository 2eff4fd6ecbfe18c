//! Siteline Core — shared replication abstractions.
//!
//! This crate defines the envelope and identity model of the replicated
//! event stream, the snapshot-store abstraction every consuming service
//! builds on, the fluent command machinery of the write side, and the
//! lifecycle callback dispatcher. It contains no infrastructure code.

pub mod audit;
pub mod callback;
pub mod clock;
pub mod command;
pub mod consumer;
pub mod error;
pub mod identity;
pub mod snapshot;
