//! Siteline Event Consumer — the record path of a consuming service.
//!
//! [`ReplicationPipeline`] drives records delivered by the transport
//! through the business transaction manager into the registered snapshot
//! stores and change listeners, committing transport offsets only after
//! durable success.

pub mod manager;
pub mod pipeline;

pub use manager::{ConsumerTransactionManager, Disposition};
pub use pipeline::ReplicationPipeline;
