// OHQ Infrastructure - In-Memory Adapter
// Implements: QueueStore

mod sorted_set;
mod store;

pub use store::MemoryQueueStore;
