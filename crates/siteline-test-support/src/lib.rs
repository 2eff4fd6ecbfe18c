//! Shared test mocks and stream builders for the Siteline replication
//! engine.

mod clock;
mod consumer;
mod logging;
mod repository;
mod stream;

pub use clock::FixedClock;
pub use consumer::{
    InMemoryTransactionBuffer, RecordingChangeListener, RecordingEventPublisher,
    RecordingOffsetCommit,
};
pub use logging::init_tracing;
pub use repository::{FailingSnapshotRepository, InMemorySnapshotRepository};
pub use stream::EventStreamBuilder;
