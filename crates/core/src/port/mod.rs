// Port Layer - Interfaces for external dependencies

pub mod queue_store;
pub mod staff_directory;
pub mod time_provider;

// Re-exports
pub use queue_store::{normalize_range, FieldGuard, QueueStore, Record, Score, WriteBatch, WriteOp};
pub use staff_directory::{StaffDirectory, StaticStaffDirectory};
pub use time_provider::{ManualTimeProvider, SystemTimeProvider, TimeProvider};
