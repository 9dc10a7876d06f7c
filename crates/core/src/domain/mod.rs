// Domain Layer - Pure business logic and entities

pub mod entry;
pub mod error;
pub mod queue;

// Re-exports
pub use entry::{CourseId, EntryId, EntryStatus, QueueEntry, UserId};
pub use error::QueueError;
pub use queue::{
    CourseQueueState, QueueConfig, QueuePosition, QueueSummary, DEFAULT_AVG_SERVICE_MS,
};
