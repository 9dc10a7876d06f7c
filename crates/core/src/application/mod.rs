// Application Layer - Use Cases and Business Logic

pub mod queue;
pub mod reconcile;

// Re-exports
pub use queue::QueueEngine;
pub use reconcile::{IndexReconciler, ReconcileReport};
